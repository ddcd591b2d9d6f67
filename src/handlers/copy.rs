//! Verbatim copy handler.
//!
//! Claims any file at all and copies it through unchanged. Must be the last
//! registered content handler.

use super::{ContentHandler, Document, ensure_parent};
use crate::env::Context;
use crate::error::BuildError;
use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};

pub struct CopyHandler;

impl ContentHandler for CopyHandler {
    fn matches(&self, _path: &Path) -> bool {
        true
    }

    fn load(&self, path: &Path) -> Result<Box<dyn Document>> {
        Ok(Box::new(CopyDocument {
            source: path.to_path_buf(),
        }))
    }
}

/// Holds only the source path; bytes are read on demand.
pub struct CopyDocument {
    source: PathBuf,
}

impl Document for CopyDocument {
    fn source(&self) -> &Path {
        &self.source
    }

    fn render(&self, _ctx: &Context) -> Result<Vec<u8>> {
        fs::read(&self.source).map_err(|e| BuildError::io(&self.source, e).into())
    }

    fn write_to(&self, out: &Path, _ctx: &Context) -> Result<()> {
        ensure_parent(out)?;
        fs::copy(&self.source, out).map_err(|e| BuildError::io(out, e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::empty_context;
    use tempfile::TempDir;

    #[test]
    fn test_copy_handler_matches_anything() {
        let handler = CopyHandler;
        assert!(handler.matches(Path::new("a.bin")));
        assert!(handler.matches(Path::new("no_extension")));
        assert!(handler.matches(Path::new("deep/nested/file.tar.gz")));
    }

    #[test]
    fn test_write_to_copies_bytes_and_creates_parents() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("input.bin");
        fs::write(&src, b"\x00\x01binary\xff").unwrap();

        let doc = CopyHandler.load(&src).unwrap();
        let out = tmp.path().join("out/nested/input.bin");
        doc.write_to(&out, &empty_context()).unwrap();

        assert_eq!(fs::read(&out).unwrap(), b"\x00\x01binary\xff");
    }

    #[test]
    fn test_render_reads_source_bytes() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("data.txt");
        fs::write(&src, "payload").unwrap();

        let doc = CopyHandler.load(&src).unwrap();
        assert_eq!(doc.render(&empty_context()).unwrap(), b"payload");
    }
}
