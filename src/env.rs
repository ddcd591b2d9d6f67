//! The build environment and its ordered registries.
//!
//! # Architecture
//!
//! ```text
//! Builder ──register/register_map/register_type──► ordered registries
//!    │
//!    └── finalize() ──► &'static BuildEnvironment (read-only from here on)
//!                            │
//!                            ├── resolve(path)        first matching ContentHandler
//!                            ├── map_path(path)       first matching PathMapper
//!                            ├── output_path(path)    output root + mapped path
//!                            └── dispatch_directory() first matching TypeHandler
//! ```
//!
//! Configuration strictly precedes dispatch: registries are appended during
//! the configuration phase and frozen by `finalize()`, so the build phase
//! reads them without locking. The environment lives for the rest of the
//! process (the watch loop reuses it across rebuilds); per-build state is
//! reset by [`BuildEnvironment::begin_build`].
//!
//! Handlers and directory processors receive the `&'static` environment,
//! which is what lets a render re-enter the dispatch machinery — the `grab`
//! template function is `resolve` called from inside another document's
//! render.

use crate::dirtype::TypeHandler;
use crate::error::{BuildError, ToolFailure};
use crate::handlers::{ContentHandler, Document};
use crate::logger::Logger;
use crate::mappers::PathMapper;
use crate::meta::DirectoryMetadata;
use anyhow::{Context as _, Result};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

/// Render-context currency passed between documents and templates.
pub type Context = minijinja::Value;

/// The context for a render with no caller-supplied variables.
pub fn empty_context() -> Context {
    minijinja::context! {}
}

/// A relative path as a forward-slash url string.
pub fn rel_url(rel: &Path) -> String {
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

type HandlerFactory = Box<dyn FnOnce(&'static BuildEnvironment) -> Box<dyn ContentHandler>>;

/// Collects the build configuration: roots, logger, and the three ordered
/// registries. Registration order is significant — first match wins.
pub struct Builder {
    source: PathBuf,
    output: PathBuf,
    logger: Logger,
    handlers: Vec<HandlerFactory>,
    mappers: Vec<Box<dyn PathMapper>>,
    types: Vec<Box<dyn TypeHandler>>,
}

impl Builder {
    pub fn new(source: &Path, output: &Path, logger: Logger) -> Self {
        Self {
            source: normalize_path(source),
            output: normalize_path(output),
            logger,
            handlers: Vec::new(),
            mappers: Vec::new(),
            types: Vec::new(),
        }
    }

    /// Append a content handler factory. Factories run at `finalize` time
    /// with the frozen environment, so a handler can hold it for
    /// re-entrant resolution.
    pub fn register<F>(&mut self, factory: F)
    where
        F: FnOnce(&'static BuildEnvironment) -> Box<dyn ContentHandler> + 'static,
    {
        self.handlers.push(Box::new(factory));
    }

    /// Append a path mapper.
    pub fn register_map(&mut self, mapper: Box<dyn PathMapper>) {
        self.mappers.push(mapper);
    }

    /// Append a directory type handler.
    pub fn register_type(&mut self, handler: Box<dyn TypeHandler>) {
        self.types.push(handler);
    }

    /// Freeze the registries and hand out the process-lifetime environment.
    pub fn finalize(self) -> &'static BuildEnvironment {
        let env: &'static BuildEnvironment = Box::leak(Box::new(BuildEnvironment {
            source: self.source,
            output: self.output,
            logger: self.logger,
            handlers: OnceLock::new(),
            mappers: self.mappers,
            types: self.types,
            failures: Mutex::new(Vec::new()),
        }));

        let built: Vec<Box<dyn ContentHandler>> =
            self.handlers.into_iter().map(|factory| factory(env)).collect();
        if env.handlers.set(built).is_err() {
            unreachable!("handlers are set exactly once in finalize");
        }

        env
    }
}

/// Owns the registries and roots; every dispatch decision goes through here.
pub struct BuildEnvironment {
    source: PathBuf,
    output: PathBuf,
    logger: Logger,
    /// Set once in `Builder::finalize`.
    handlers: OnceLock<Vec<Box<dyn ContentHandler>>>,
    mappers: Vec<Box<dyn PathMapper>>,
    types: Vec<Box<dyn TypeHandler>>,
    /// Per-build external-tool failure report.
    failures: Mutex<Vec<ToolFailure>>,
}

impl BuildEnvironment {
    pub fn source_root(&self) -> &Path {
        &self.source
    }

    pub fn output_root(&self) -> &Path {
        &self.output
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    fn handlers(&self) -> &[Box<dyn ContentHandler>] {
        self.handlers.get().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Absolute form of a possibly source-relative path.
    pub fn absolute_source(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.source.join(path)
        }
    }

    /// Source-root-relative form of a path.
    pub fn source_rel(&self, path: &Path) -> Result<PathBuf> {
        if path.is_absolute() {
            Ok(path
                .strip_prefix(&self.source)
                .with_context(|| {
                    format!("`{}` is outside the source root", path.display())
                })?
                .to_path_buf())
        } else {
            Ok(path.to_path_buf())
        }
    }

    /// Load a source file through the first matching content handler.
    pub fn resolve(&self, path: &Path) -> Result<Box<dyn Document>> {
        let abs = self.absolute_source(path);
        for handler in self.handlers() {
            if handler.matches(&abs) {
                return handler.load(&abs);
            }
        }
        Err(BuildError::NoHandlerFound(abs).into())
    }

    /// Rewrite a source path into an output-root-relative path through the
    /// first matching mapper.
    pub fn map_path(&self, path: &Path) -> Result<PathBuf> {
        let rel = self.source_rel(&self.absolute_source(path))?;
        for mapper in &self.mappers {
            if mapper.matches(&rel) {
                return Ok(mapper.map(&rel));
            }
        }
        Err(BuildError::NoMapperFound(rel).into())
    }

    /// Absolute output path for a source path.
    pub fn output_path(&self, path: &Path) -> Result<PathBuf> {
        Ok(self.output.join(self.map_path(path)?))
    }

    /// Load a directory's metadata and run the first matching type
    /// handler's processor. Recursion into children is the processor's
    /// decision, not ours.
    pub fn dispatch_directory(&'static self, dir: &Path) -> Result<()> {
        let abs = self.absolute_source(dir);
        let meta = DirectoryMetadata::load(&abs)?;
        self.logger.debug(
            "dispatch",
            format!(
                "{} (type: {})",
                abs.display(),
                meta.kind.as_deref().unwrap_or("default")
            ),
        );

        for handler in &self.types {
            if handler.matches(&abs, &meta) {
                return handler.load(self, &abs, meta)?.process();
            }
        }

        match meta.kind {
            // A declared type nothing claims is a configuration error.
            Some(declared) => {
                Err(BuildError::DirectoryTypeMismatch { path: abs, declared }.into())
            }
            // An untyped directory nothing claims falls through unprocessed.
            None => Ok(()),
        }
    }

    /// Reset per-build state. Runs at the start of every build.
    pub fn begin_build(&self) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.clear();
        }
        for handler in self.handlers() {
            handler.begin_build();
        }
    }

    /// Record an external-tool failure for the end-of-build report.
    pub fn report_tool_failure(&self, failure: ToolFailure) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.push(failure);
        }
    }

    /// Take the accumulated failures, leaving the report empty.
    pub fn take_failures(&self) -> Vec<ToolFailure> {
        self.failures
            .lock()
            .map(|mut failures| std::mem::take(&mut *failures))
            .unwrap_or_default()
    }
}

/// Normalize a path to absolute, canonicalizing when it exists.
fn normalize_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(path))
                .unwrap_or_else(|_| path.to_path_buf())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mappers::{ExtensionMapper, IdentityMapper};
    use tempfile::TempDir;

    /// Stub handler that claims a fixed extension and renders a fixed tag,
    /// for registry-order assertions.
    struct TagHandler {
        ext: &'static str,
        tag: &'static str,
    }

    struct TagDocument {
        tag: &'static str,
        source: PathBuf,
    }

    impl ContentHandler for TagHandler {
        fn matches(&self, path: &Path) -> bool {
            self.ext == "*" || path.extension().is_some_and(|e| e == self.ext)
        }

        fn load(&self, path: &Path) -> Result<Box<dyn Document>> {
            Ok(Box::new(TagDocument {
                tag: self.tag,
                source: path.to_path_buf(),
            }))
        }
    }

    impl Document for TagDocument {
        fn source(&self) -> &Path {
            &self.source
        }

        fn render(&self, _ctx: &Context) -> Result<Vec<u8>> {
            Ok(self.tag.as_bytes().to_vec())
        }
    }

    fn bare_builder(tmp: &TempDir) -> Builder {
        Builder::new(
            &tmp.path().join("source"),
            &tmp.path().join("output"),
            Logger::new(false),
        )
    }

    #[test]
    fn test_first_matching_handler_wins() {
        let tmp = TempDir::new().unwrap();
        let mut builder = bare_builder(&tmp);
        builder.register(|_| Box::new(TagHandler { ext: "txt", tag: "first" }));
        builder.register(|_| Box::new(TagHandler { ext: "txt", tag: "second" }));
        let env = builder.finalize();

        let doc = env.resolve(Path::new("note.txt")).unwrap();
        assert_eq!(doc.render(&empty_context()).unwrap(), b"first");
    }

    #[test]
    fn test_later_handler_claims_what_earlier_skips() {
        let tmp = TempDir::new().unwrap();
        let mut builder = bare_builder(&tmp);
        builder.register(|_| Box::new(TagHandler { ext: "md", tag: "markdown" }));
        builder.register(|_| Box::new(TagHandler { ext: "*", tag: "fallback" }));
        let env = builder.finalize();

        let doc = env.resolve(Path::new("style.less")).unwrap();
        assert_eq!(doc.render(&empty_context()).unwrap(), b"fallback");
    }

    #[test]
    fn test_resolve_without_match_is_no_handler_found() {
        let tmp = TempDir::new().unwrap();
        let mut builder = bare_builder(&tmp);
        builder.register(|_| Box::new(TagHandler { ext: "md", tag: "markdown" }));
        let env = builder.finalize();

        let err = env.resolve(Path::new("data.bin")).err().unwrap();
        assert!(matches!(
            err.downcast_ref::<BuildError>(),
            Some(BuildError::NoHandlerFound(_))
        ));
    }

    #[test]
    fn test_map_path_without_match_is_no_mapper_found() {
        let tmp = TempDir::new().unwrap();
        let mut builder = bare_builder(&tmp);
        builder.register_map(Box::new(ExtensionMapper::new("md", "html")));
        let env = builder.finalize();

        let err = env.map_path(Path::new("logo.png")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BuildError>(),
            Some(BuildError::NoMapperFound(_))
        ));
    }

    #[test]
    fn test_first_matching_mapper_wins_over_identity() {
        let tmp = TempDir::new().unwrap();
        let mut builder = bare_builder(&tmp);
        builder.register_map(Box::new(ExtensionMapper::new("tmpl", "html")));
        builder.register_map(Box::new(IdentityMapper));
        let env = builder.finalize();

        assert_eq!(
            env.map_path(Path::new("page.tmpl")).unwrap(),
            PathBuf::from("page.html")
        );
        assert_eq!(
            env.map_path(Path::new("logo.png")).unwrap(),
            PathBuf::from("logo.png")
        );
    }

    #[test]
    fn test_output_path_joins_output_root() {
        let tmp = TempDir::new().unwrap();
        let mut builder = bare_builder(&tmp);
        builder.register_map(Box::new(IdentityMapper));
        let env = builder.finalize();

        let out = env.output_path(Path::new("a/b.txt")).unwrap();
        assert_eq!(out, env.output_root().join("a/b.txt"));
    }

    #[test]
    fn test_resolve_accepts_relative_and_absolute() {
        let tmp = TempDir::new().unwrap();
        let mut builder = bare_builder(&tmp);
        builder.register(|_| Box::new(TagHandler { ext: "*", tag: "any" }));
        let env = builder.finalize();

        let by_rel = env.resolve(Path::new("sub/file.txt")).unwrap();
        let abs = env.source_root().join("sub/file.txt");
        let by_abs = env.resolve(&abs).unwrap();
        assert_eq!(by_rel.source(), by_abs.source());
    }

    #[test]
    fn test_failure_report_accumulates_and_drains() {
        let tmp = TempDir::new().unwrap();
        let env = bare_builder(&tmp).finalize();

        env.report_tool_failure(ToolFailure {
            tool: "lessc".into(),
            path: PathBuf::from("a.less"),
            reason: "exit status 1".into(),
        });
        env.report_tool_failure(ToolFailure {
            tool: "lessc".into(),
            path: PathBuf::from("b.less"),
            reason: "exit status 1".into(),
        });

        let failures = env.take_failures();
        assert_eq!(failures.len(), 2);
        assert!(env.take_failures().is_empty());
    }

    #[test]
    fn test_begin_build_clears_failures() {
        let tmp = TempDir::new().unwrap();
        let env = bare_builder(&tmp).finalize();
        env.report_tool_failure(ToolFailure {
            tool: "lessc".into(),
            path: PathBuf::from("a.less"),
            reason: "exit status 1".into(),
        });
        env.begin_build();
        assert!(env.take_failures().is_empty());
    }

    #[test]
    fn test_rel_url_joins_with_forward_slashes() {
        assert_eq!(rel_url(Path::new("a/b/c.html")), "a/b/c.html");
        assert_eq!(rel_url(Path::new("index.html")), "index.html");
    }
}
