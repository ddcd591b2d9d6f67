//! Build orchestration.
//!
//! ```text
//! build_site()
//!     │
//!     ├── begin_build()          reset per-build state
//!     ├── clean_output()         clear output contents, keep the root
//!     ├── dispatch_directory()   recursive type dispatch from the source root
//!     └── failure report         external-tool failures fail the build last
//! ```
//!
//! `standard_builder` wires the canonical chains: templates, markdown,
//! stylesheets, verbatim copy; extension mappers before the identity
//! fallback; the default and collection directory types.

use crate::config::SiteConfig;
use crate::dirtype::{CollectionTypeHandler, DefaultTypeHandler};
use crate::env::{Builder, BuildEnvironment};
use crate::error::BuildError;
use crate::handlers::{
    ContentHandler, CopyHandler, MarkdownHandler, StylesheetHandler, TemplateHandler,
};
use crate::logger::Logger;
use crate::mappers::{ExtensionMapper, IdentityMapper};
use anyhow::{Result, bail};
use std::fs;
use walkdir::WalkDir;

/// A builder with the standard handler, mapper, and type chains
/// registered in their canonical order.
pub fn standard_builder(config: &SiteConfig, logger: Logger) -> Builder {
    let mut builder = Builder::new(&config.build.source, &config.build.destination, logger);

    let stylesheet_command = config.build.stylesheet.command.clone();
    builder.register(|env| Box::new(TemplateHandler::new(env)) as Box<dyn ContentHandler>);
    builder.register(|env| Box::new(MarkdownHandler::new(env)) as Box<dyn ContentHandler>);
    builder.register(move |env| {
        Box::new(StylesheetHandler::new(env, stylesheet_command)) as Box<dyn ContentHandler>
    });
    // The catch-all goes last so every file resolves to something.
    builder.register(|_| Box::new(CopyHandler) as Box<dyn ContentHandler>);

    builder.register_map(Box::new(ExtensionMapper::new("tmpl", "html")));
    builder.register_map(Box::new(ExtensionMapper::new("md", "html")));
    builder.register_map(Box::new(IdentityMapper));

    builder.register_type(Box::new(DefaultTypeHandler));
    builder.register_type(Box::new(CollectionTypeHandler));

    builder
}

/// Run one full build: clean the output tree, dispatch the source root,
/// then fail if any external tool failed along the way.
pub fn build_site(env: &'static BuildEnvironment) -> Result<()> {
    let source = env.source_root();
    if !source.is_dir() {
        bail!("source directory `{}` does not exist", source.display());
    }

    env.begin_build();
    clean_output(env)?;
    env.dispatch_directory(source)?;

    let failures = env.take_failures();
    if !failures.is_empty() {
        bail!("{} file(s) failed external conversion", failures.len());
    }

    log_build_result(env);
    Ok(())
}

/// Clear the output directory's contents, entry by entry, without removing
/// the directory itself — a watcher holding the root keeps a stable handle
/// across rebuilds.
pub fn clean_output(env: &BuildEnvironment) -> Result<()> {
    let output = env.output_root();
    fs::create_dir_all(output).map_err(|e| BuildError::io(output, e))?;

    for entry in fs::read_dir(output).map_err(|e| BuildError::io(output, e))? {
        let entry = entry.map_err(|e| BuildError::io(output, e))?;
        let path = entry.path();
        let result = if path.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        result.map_err(|e| BuildError::io(&path, e))?;
    }

    Ok(())
}

/// Log the build result based on output directory contents.
fn log_build_result(env: &BuildEnvironment) {
    let file_count = WalkDir::new(env.output_root())
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .count();

    if file_count == 0 {
        env.logger()
            .log("warn", "output is empty, check the source directory");
    } else {
        env.logger()
            .log("build", format!("done, {file_count} file(s) written"));
    }
}

// ============================================================================
// Tests
// ============================================================================
