//! sitegen — a dispatch-driven static site builder.
//!
//! Walks a source tree, converts each file through a chain of content
//! handlers, and writes results into a mirrored output tree with paths
//! rewritten by a mapper chain. Directories can declare their own
//! processing strategy through sidecar metadata, which is how a post
//! collection assembles an ordered index across many files before any one
//! of them is rendered.
//!
//! # Pipeline
//!
//! ```text
//! build_site()
//!     └── dispatch_directory(source root)
//!             └── TypeHandler chain ──► DirectoryProcessor.process()
//!                     ├── resolve(file) ──► ContentHandler chain ──► Document
//!                     ├── Document.write_to(output_path(file))
//!                     └── dispatch_directory(subdir)      (recursion)
//! ```
//!
//! Everything dispatch-related is an ordered first-match registry: content
//! handlers, path mappers, and directory type handlers are consulted in
//! registration order and the first match wins. Templates can re-enter the
//! dispatch machinery mid-render through the `grab` function, which is how
//! one document pulls in another as data.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`env`] | `Builder` + `BuildEnvironment`: the registries and dispatch core |
//! | [`handlers`] | Content handler chain and the `Document` abstraction |
//! | [`mappers`] | Source-to-output path rewriting |
//! | [`dirtype`] | Directory type handlers: default fan-out and collections |
//! | [`meta`] | `_index.yml` sidecar metadata |
//! | [`build`] | Orchestration: clean, dispatch, failure report |
//! | [`watch`] | Rebuild-on-change event loop |
//! | [`config`] | `sitegen.toml` + CLI overrides |
//! | [`cli`] | Command-line surface |
//! | [`logger`] | Injected colored log sink |
//! | [`error`] | `BuildError` taxonomy |

pub mod build;
pub mod cli;
pub mod config;
pub mod dirtype;
pub mod env;
pub mod error;
pub mod handlers;
pub mod logger;
pub mod mappers;
pub mod meta;
pub mod utils;
pub mod watch;
