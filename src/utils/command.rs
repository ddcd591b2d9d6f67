//! External command execution.
//!
//! The only tool this system shells out to is the stylesheet compiler, so
//! this stays small: build a `Command` from a configured argv prefix plus
//! per-call arguments, run it, and surface a readable error on failure.

use anyhow::{Context, Result, bail};
use std::ffi::OsStr;
use std::path::Path;
use std::process::{Command, Output};

/// Run `cmd` (a non-empty argv prefix, e.g. `["lessc"]`) with extra
/// arguments appended, capturing output.
///
/// # Errors
/// Returns an error if the argv prefix is empty or the process cannot be
/// spawned. A non-zero exit is NOT an error here; callers inspect
/// `Output::status` and decide their own failure policy.
pub fn run(cmd: &[String], args: &[&OsStr]) -> Result<Output> {
    let program = cmd.first().context("empty command")?;

    let mut command = Command::new(program);
    command.args(&cmd[1..]).args(args);

    command
        .output()
        .with_context(|| format!("failed to execute `{program}`"))
}

/// Run a command and require a zero exit, with a stderr excerpt on failure.
pub fn run_checked(cmd: &[String], args: &[&OsStr]) -> Result<Output> {
    let output = run(cmd, args)?;
    if !output.status.success() {
        let program = cmd.first().map(String::as_str).unwrap_or_default();
        bail!(
            "`{program}` failed with {}: {}",
            output.status,
            stderr_excerpt(&output)
        );
    }
    Ok(output)
}

/// First non-empty stderr line, for compact error reporting.
pub fn stderr_excerpt(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr)
        .lines()
        .find(|line| !line.trim().is_empty())
        .unwrap_or("(no stderr)")
        .to_owned()
}

/// Render a path as an `OsStr` argument.
#[inline]
pub fn path_arg(path: &Path) -> &OsStr {
    path.as_os_str()
}
