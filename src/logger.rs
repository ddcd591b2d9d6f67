//! Logging with colored module prefixes.
//!
//! Messages are printed as `[module] message` with the prefix colored by
//! module kind, as in `log("build", "done")` or `log("error", …)`. The
//! logger is constructed once per invocation and injected through the
//! `BuildEnvironment`; there is no module-level state.

use colored::{ColoredString, Colorize};

/// Log sink for one build invocation.
///
/// `debug` lines are only emitted when verbose mode is on; everything else
/// is unconditional. The `error` and `warn` module names route to stderr.
#[derive(Debug, Clone, Copy)]
pub struct Logger {
    verbose: bool,
}

impl Logger {
    pub const fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    pub const fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Emit a line with a colored `[module]` prefix.
    pub fn log(&self, module: &str, message: impl AsRef<str>) {
        let line = format!("{} {}", colorize_prefix(module), message.as_ref());
        if matches!(module, "error" | "warn") {
            eprintln!("{line}");
        } else {
            println!("{line}");
        }
    }

    /// Emit a debug line. Dropped unless verbose mode is on.
    pub fn debug(&self, module: &str, message: impl AsRef<str>) {
        if self.verbose {
            self.log(module, message);
        }
    }
}

/// Apply color to a module prefix based on module kind.
fn colorize_prefix(module: &str) -> ColoredString {
    let prefix = format!("[{module}]");
    match module {
        "watch" => prefix.bright_green().bold(),
        "warn" => prefix.bright_magenta().bold(),
        "error" => prefix.bright_red().bold(),
        _ => prefix.bright_yellow().bold(),
    }
}
