//! Build error taxonomy.
//!
//! Domain errors are typed here; orchestration code carries them inside
//! `anyhow::Result` and downcasts where a specific kind matters.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the dispatch engine and the standard handlers.
#[derive(Debug, Error)]
pub enum BuildError {
    /// No content handler matched a requested file. With the verbatim copy
    /// handler registered last this only fires on a misconfigured chain.
    #[error("no content handler matched `{0}`")]
    NoHandlerFound(PathBuf),

    /// No path mapper matched. Mitigated by registering the identity
    /// mapper last.
    #[error("no path mapper matched `{0}`")]
    NoMapperFound(PathBuf),

    /// A directory declared a `type` that no registered type handler
    /// claims.
    #[error("directory `{path}` declares type `{declared}`, which no type handler claims")]
    DirectoryTypeMismatch { path: PathBuf, declared: String },

    /// A shelled-out tool exited non-zero or could not be run.
    #[error("`{tool}` failed for `{path}`: {reason}")]
    ExternalToolFailure {
        tool: String,
        path: PathBuf,
        reason: String,
    },

    /// A directory sidecar descriptor exists but cannot be parsed.
    #[error("malformed directory metadata `{path}`")]
    Metadata {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// A type handler claimed a directory but a key it needs is absent.
    #[error("directory `{path}` is missing metadata key `{key}`")]
    MissingMetadataKey { path: PathBuf, key: &'static str },

    /// The re-entrant grab depth guard tripped.
    #[error("render recursion limit ({depth}) exceeded while grabbing `{path}`")]
    RecursionLimit { path: PathBuf, depth: usize },

    /// Template compilation or rendering failed.
    #[error("template error in `{path}`")]
    Template {
        path: PathBuf,
        #[source]
        source: Box<minijinja::Error>,
    },

    /// Filesystem operation failed.
    #[error("IO error on `{path}`")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl BuildError {
    /// Wrap a minijinja error with the source path it belongs to.
    pub fn template(path: impl Into<PathBuf>, source: minijinja::Error) -> Self {
        Self::Template {
            path: path.into(),
            source: Box::new(source),
        }
    }

    /// Wrap an IO error with the path it belongs to.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// One recorded external-tool failure.
///
/// Collected per build and reported at the end; the build keeps going past
/// individual tool failures instead of aborting on the first one.
#[derive(Debug, Clone)]
pub struct ToolFailure {
    pub tool: String,
    pub path: PathBuf,
    pub reason: String,
}
