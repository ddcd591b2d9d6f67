//! Directory type handlers and processors.
//!
//! A directory's sidecar metadata decides how its contents are processed as
//! a unit: the default per-file fan-out, or an aggregating strategy such as
//! the chronological collection. The chain is consulted in registration
//! order and the first match wins.
//!
//! Recursion into subdirectories is a processor's own responsibility — the
//! environment never descends on its own — so an aggregating strategy can
//! order recursion relative to its aggregation step, or skip it entirely.

pub mod collection;
pub mod default;

pub use collection::CollectionTypeHandler;
pub use default::DefaultTypeHandler;

use crate::env::BuildEnvironment;
use crate::error::BuildError;
use crate::meta::DirectoryMetadata;
use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};

/// One strategy in the directory type chain.
pub trait TypeHandler: Send + Sync {
    /// Does this handler claim the directory, given its metadata?
    fn matches(&self, dir: &Path, meta: &DirectoryMetadata) -> bool;

    /// Instantiate the directory processor. Only called after `matches`.
    fn load(
        &self,
        env: &'static BuildEnvironment,
        dir: &Path,
        meta: DirectoryMetadata,
    ) -> Result<Box<dyn DirectoryProcessor>>;
}

/// Processes one directory: writes files, recurses, or both.
pub trait DirectoryProcessor {
    fn process(&self) -> Result<()>;
}

/// Reserved-name convention: `_`-prefixed entries are never auto-dispatched
/// as ordinary content, but stay resolvable when asked for by path.
pub fn is_reserved(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('_'))
}

/// Non-reserved files and subdirectories directly in a directory, each
/// sorted by name for deterministic processing order.
pub(crate) fn visible_entries(dir: &Path) -> Result<(Vec<PathBuf>, Vec<PathBuf>)> {
    let mut files = Vec::new();
    let mut dirs = Vec::new();

    for entry in fs::read_dir(dir).map_err(|e| BuildError::io(dir, e))? {
        let entry = entry.map_err(|e| BuildError::io(dir, e))?;
        let path = entry.path();
        if is_reserved(&path) {
            continue;
        }
        if path.is_dir() {
            dirs.push(path);
        } else {
            files.push(path);
        }
    }

    files.sort();
    dirs.sort();
    Ok((files, dirs))
}

/// Dispatch each subdirectory through the type chain, in order.
pub(crate) fn dispatch_subdirectories(
    env: &'static BuildEnvironment,
    dirs: &[PathBuf],
) -> Result<()> {
    for dir in dirs {
        env.dispatch_directory(dir)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_is_reserved_checks_final_component_only() {
        assert!(is_reserved(Path::new("source/_index.yml")));
        assert!(is_reserved(Path::new("_private")));
        assert!(!is_reserved(Path::new("source/_private/inner.txt")));
        assert!(!is_reserved(Path::new("source/plain.md")));
    }

    #[test]
    fn test_visible_entries_skips_reserved_and_sorts() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("b.txt"), "").unwrap();
        fs::write(tmp.path().join("a.txt"), "").unwrap();
        fs::write(tmp.path().join("_hidden.txt"), "").unwrap();
        fs::create_dir(tmp.path().join("sub")).unwrap();
        fs::create_dir(tmp.path().join("_private")).unwrap();

        let (files, dirs) = visible_entries(tmp.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, ["a.txt", "b.txt"]);
        assert_eq!(dirs.len(), 1);
        assert!(dirs[0].ends_with("sub"));
    }
}
