//! Default directory processor.
//!
//! Converts every non-reserved file through the content handler chain and
//! writes it to its mapped output path, then recurses into subdirectories.
//! Sibling files have no ordering dependency and disjoint output paths, so
//! the per-file conversions fan out on the rayon pool; recursion stays
//! sequential because subdirectory strategies may aggregate.

use super::{DirectoryProcessor, TypeHandler, dispatch_subdirectories, visible_entries};
use crate::env::{BuildEnvironment, empty_context};
use crate::meta::DirectoryMetadata;
use anyhow::Result;
use rayon::prelude::*;
use std::path::{Path, PathBuf};

pub struct DefaultTypeHandler;

impl TypeHandler for DefaultTypeHandler {
    fn matches(&self, _dir: &Path, meta: &DirectoryMetadata) -> bool {
        matches!(meta.kind.as_deref(), None | Some("default"))
    }

    fn load(
        &self,
        env: &'static BuildEnvironment,
        dir: &Path,
        _meta: DirectoryMetadata,
    ) -> Result<Box<dyn DirectoryProcessor>> {
        Ok(Box::new(DefaultProcessor {
            env,
            dir: dir.to_path_buf(),
        }))
    }
}

pub struct DefaultProcessor {
    env: &'static BuildEnvironment,
    dir: PathBuf,
}

impl DirectoryProcessor for DefaultProcessor {
    fn process(&self) -> Result<()> {
        let (files, dirs) = visible_entries(&self.dir)?;

        files.par_iter().try_for_each(|file| {
            let doc = self.env.resolve(file)?;
            let out = self.env.output_path(file)?;
            self.env
                .logger()
                .debug("build", format!("{} -> {}", file.display(), out.display()));
            doc.write_to(&out, &empty_context())
        })?;

        dispatch_subdirectories(self.env, &dirs)
    }
}
