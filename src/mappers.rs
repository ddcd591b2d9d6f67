//! Source-to-output path mapping.
//!
//! Mappers rewrite a source-root-relative path into an output-root-relative
//! path. The chain is consulted in registration order and the first match
//! wins; extension-rewriting mappers go first, the identity fallback last.
//! Mapping is pure: the same input always yields the same output.

use std::path::{Path, PathBuf};

/// One strategy in the path mapping chain.
pub trait PathMapper: Send + Sync {
    /// Does this mapper own the given source-relative path?
    fn matches(&self, rel: &Path) -> bool;

    /// Rewrite the source-relative path into an output-relative path.
    fn map(&self, rel: &Path) -> PathBuf;
}

/// Rewrites one extension into another (`tmpl` → `html`, `md` → `html`).
pub struct ExtensionMapper {
    from: &'static str,
    to: &'static str,
}

impl ExtensionMapper {
    pub const fn new(from: &'static str, to: &'static str) -> Self {
        Self { from, to }
    }
}

impl PathMapper for ExtensionMapper {
    fn matches(&self, rel: &Path) -> bool {
        rel.extension().is_some_and(|ext| ext == self.from)
    }

    fn map(&self, rel: &Path) -> PathBuf {
        rel.with_extension(self.to)
    }
}

/// Maps every path straight across. Must be registered last.
pub struct IdentityMapper;

impl PathMapper for IdentityMapper {
    fn matches(&self, _rel: &Path) -> bool {
        true
    }

    fn map(&self, rel: &Path) -> PathBuf {
        rel.to_path_buf()
    }
}
