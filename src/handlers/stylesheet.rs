//! Stylesheet compilation handler.
//!
//! Claims `*.less` files and shells out to the configured compiler with
//! source and destination paths as arguments, rewriting the destination
//! extension to `.css`. A failing compile is recorded in the build's
//! failure report and the build continues; the partial destination file is
//! removed so failures never leave corrupt output behind.

use super::{ContentHandler, Document, ensure_parent};
use crate::env::{BuildEnvironment, Context};
use crate::error::{BuildError, ToolFailure};
use crate::utils::command;
use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};

pub const STYLESHEET_EXT: &str = "less";
pub const OUTPUT_EXT: &str = "css";

pub struct StylesheetHandler {
    env: &'static BuildEnvironment,
    command: Vec<String>,
}

impl StylesheetHandler {
    pub fn new(env: &'static BuildEnvironment, command: Vec<String>) -> Self {
        Self { env, command }
    }
}

impl ContentHandler for StylesheetHandler {
    fn matches(&self, path: &Path) -> bool {
        path.extension().is_some_and(|ext| ext == STYLESHEET_EXT)
    }

    fn load(&self, path: &Path) -> Result<Box<dyn Document>> {
        Ok(Box::new(StylesheetDocument {
            env: self.env,
            command: self.command.clone(),
            source: path.to_path_buf(),
        }))
    }
}

pub struct StylesheetDocument {
    env: &'static BuildEnvironment,
    command: Vec<String>,
    source: PathBuf,
}

impl StylesheetDocument {
    fn tool(&self) -> String {
        self.command.first().cloned().unwrap_or_default()
    }

    /// Record a failed compile and clear any partial output.
    fn report(&self, dest: &Path, reason: String) {
        let _ = fs::remove_file(dest);
        self.env.logger().log(
            "error",
            format!("{}: `{}` failed: {}", self.source.display(), self.tool(), reason),
        );
        self.env.report_tool_failure(ToolFailure {
            tool: self.tool(),
            path: self.source.clone(),
            reason,
        });
    }
}

impl Document for StylesheetDocument {
    fn source(&self) -> &Path {
        &self.source
    }

    /// Compile to stdout. Unlike `write_to`, a failure here is fatal to the
    /// caller: there is no byte content to hand back.
    fn render(&self, _ctx: &Context) -> Result<Vec<u8>> {
        let output = command::run(&self.command, &[command::path_arg(&self.source)])?;
        if !output.status.success() {
            return Err(BuildError::ExternalToolFailure {
                tool: self.tool(),
                path: self.source.clone(),
                reason: command::stderr_excerpt(&output),
            }
            .into());
        }
        Ok(output.stdout)
    }

    fn write_to(&self, out: &Path, _ctx: &Context) -> Result<()> {
        ensure_parent(out)?;
        let dest = out.with_extension(OUTPUT_EXT);

        let args = [command::path_arg(&self.source), command::path_arg(&dest)];
        match command::run(&self.command, &args) {
            Ok(output) if output.status.success() => Ok(()),
            Ok(output) => {
                self.report(&dest, command::stderr_excerpt(&output));
                Ok(())
            }
            Err(err) => {
                self.report(&dest, format!("{err:#}"));
                Ok(())
            }
        }
    }
}
