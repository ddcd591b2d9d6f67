//! Directory sidecar metadata.
//!
//! Each directory may carry an optional `_index.yml` describing how the
//! directory is processed: a `type` key selecting a directory type handler,
//! plus handler-specific keys kept in an open side-mapping and validated
//! lazily by whichever handler claims the directory.

use crate::error::BuildError;
use anyhow::Result;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Sidecar descriptor file name, one per directory, optional.
pub const SIDECAR: &str = "_index.yml";

/// Parsed sidecar metadata for one directory.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DirectoryMetadata {
    /// The declared directory type. Absent or `default` routes to the
    /// default per-file processor.
    #[serde(rename = "type")]
    pub kind: Option<String>,

    /// Handler-specific keys (`post_renderer`, `copy_others`, …).
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl DirectoryMetadata {
    /// Load metadata for a directory, returning the empty mapping when no
    /// sidecar is present. A sidecar that exists but fails to parse is a
    /// configuration error: a descriptor on disk was written on purpose.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(SIDECAR);
        if !path.exists() {
            return Ok(Self::default());
        }

        let text = fs::read_to_string(&path).map_err(|e| BuildError::io(&path, e))?;
        let value: serde_yaml::Value =
            serde_yaml::from_str(&text).map_err(|source| BuildError::Metadata {
                path: path.clone(),
                source,
            })?;

        // An empty file parses as null; treat it like an absent sidecar.
        if value.is_null() {
            return Ok(Self::default());
        }

        serde_yaml::from_value(value).map_err(|source| {
            BuildError::Metadata {
                path: path.clone(),
                source,
            }
            .into()
        })
    }

    /// Look up a string-valued key in the side-mapping.
    pub fn str_key(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(serde_yaml::Value::as_str)
    }

    /// Look up a boolean key; absent counts as false.
    pub fn bool_key(&self, key: &str) -> bool {
        self.extra
            .get(key)
            .and_then(serde_yaml::Value::as_bool)
            .unwrap_or(false)
    }

    /// Fetch a key a claiming handler requires, as a source-relative path.
    pub fn require_path(&self, dir: &Path, key: &'static str) -> Result<PathBuf> {
        self.str_key(key).map(PathBuf::from).ok_or_else(|| {
            BuildError::MissingMetadataKey {
                path: dir.to_path_buf(),
                key,
            }
            .into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_sidecar(dir: &Path, content: &str) {
        fs::write(dir.join(SIDECAR), content).unwrap();
    }

    #[test]
    fn test_load_absent_sidecar_is_empty() {
        let tmp = TempDir::new().unwrap();
        let meta = DirectoryMetadata::load(tmp.path()).unwrap();
        assert!(meta.kind.is_none());
        assert!(meta.extra.is_empty());
    }

    #[test]
    fn test_load_empty_sidecar_is_empty() {
        let tmp = TempDir::new().unwrap();
        write_sidecar(tmp.path(), "");
        let meta = DirectoryMetadata::load(tmp.path()).unwrap();
        assert!(meta.kind.is_none());
    }

    #[test]
    fn test_load_type_and_extra_keys() {
        let tmp = TempDir::new().unwrap();
        write_sidecar(
            tmp.path(),
            "type: collection\npost_renderer: blog/_post.tmpl\ncopy_others: true\n",
        );
        let meta = DirectoryMetadata::load(tmp.path()).unwrap();
        assert_eq!(meta.kind.as_deref(), Some("collection"));
        assert_eq!(meta.str_key("post_renderer"), Some("blog/_post.tmpl"));
        assert!(meta.bool_key("copy_others"));
    }

    #[test]
    fn test_bool_key_defaults_false() {
        let tmp = TempDir::new().unwrap();
        write_sidecar(tmp.path(), "type: collection\n");
        let meta = DirectoryMetadata::load(tmp.path()).unwrap();
        assert!(!meta.bool_key("copy_others"));
    }

    #[test]
    fn test_malformed_sidecar_is_an_error() {
        let tmp = TempDir::new().unwrap();
        write_sidecar(tmp.path(), "type: [unclosed\n");
        let err = DirectoryMetadata::load(tmp.path()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BuildError>(),
            Some(BuildError::Metadata { .. })
        ));
    }

    #[test]
    fn test_require_path_missing_key() {
        let tmp = TempDir::new().unwrap();
        write_sidecar(tmp.path(), "type: collection\n");
        let meta = DirectoryMetadata::load(tmp.path()).unwrap();
        let err = meta
            .require_path(tmp.path(), "post_renderer")
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BuildError>(),
            Some(BuildError::MissingMetadataKey { key: "post_renderer", .. })
        ));
    }
}
