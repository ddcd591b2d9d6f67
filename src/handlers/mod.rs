//! Content handlers and the Document abstraction.
//!
//! A content handler claims source files (typically by extension) and loads
//! them into [`Document`]s — in-memory representations that can render to
//! bytes and write themselves to an output path. The chain is consulted in
//! registration order; the first match wins, and the verbatim
//! [`CopyHandler`] registered last makes resolution effectively total.
//!
//! | Handler | Claims | Produces |
//! |---------|--------|----------|
//! | [`TemplateHandler`] | `*.tmpl` | rendered template output |
//! | [`MarkdownHandler`] | `*.md` | converted HTML, auto-templated |
//! | [`StylesheetHandler`] | `*.less` | externally compiled CSS |
//! | [`CopyHandler`] | everything | byte-for-byte copy |

pub mod copy;
pub mod markdown;
pub mod stylesheet;
pub mod template;

pub use copy::CopyHandler;
pub use markdown::MarkdownHandler;
pub use stylesheet::StylesheetHandler;
pub use template::TemplateHandler;

use crate::env::Context;
use crate::error::BuildError;
use anyhow::Result;
use std::fs;
use std::path::Path;

/// One strategy in the content handler chain.
///
/// Handlers are stateless between files apart from shared
/// expensive-to-construct resources (a template engine instance) held once
/// per handler, never per Document.
pub trait ContentHandler: Send + Sync {
    /// Does this handler claim the given source path?
    fn matches(&self, path: &Path) -> bool;

    /// Load the file into a Document. Only called after `matches`.
    fn load(&self, path: &Path) -> Result<Box<dyn Document>>;

    /// Reset any per-build shared state. Called at the start of every
    /// build run; the default is a no-op.
    fn begin_build(&self) {}
}

/// In-memory representation of one loaded source file.
///
/// Payloads load lazily and are cached for the Document's lifetime. The
/// Document is owned by whichever call site requested it — there is no
/// global cache, so a collection strategy can hold many at once.
pub trait Document: Send + Sync {
    /// The originating source path.
    fn source(&self) -> &Path;

    /// Render to byte content. Pure: may be called repeatedly with
    /// different contexts.
    fn render(&self, ctx: &Context) -> Result<Vec<u8>>;

    /// Render embeddable content for callers that splice this document
    /// into another (the collection body pass, the `grab` template
    /// function). For markdown this is the raw conversion without the
    /// ancestor auto template; by default it is the full render.
    fn fragment(&self, ctx: &Context) -> Result<String> {
        let bytes = self.render(ctx)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Render and persist, creating parent directories as needed.
    fn write_to(&self, out: &Path, ctx: &Context) -> Result<()> {
        ensure_parent(out)?;
        let bytes = self.render(ctx)?;
        fs::write(out, bytes).map_err(|e| BuildError::io(out, e))?;
        Ok(())
    }
}

/// Create the parent directory of a path if it is missing.
///
/// Create-if-absent, so concurrent writers into the same directory are
/// safe.
pub fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| BuildError::io(parent, e))?;
    }
    Ok(())
}
