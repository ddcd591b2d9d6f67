//! Command-line interface definitions.
//!
//! Defines all CLI arguments using clap.

use clap::Parser;
use std::path::PathBuf;

/// sitegen static site builder CLI
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Print debugging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Watch the source directory and rebuild whenever changes are detected
    #[arg(short, long)]
    pub watch: bool,

    /// Source directory (overrides the config file)
    #[arg(short, long)]
    pub source: Option<PathBuf>,

    /// Destination directory (overrides the config file)
    #[arg(short, long)]
    pub destination: Option<PathBuf>,

    /// Config file path (optional; defaults apply when absent)
    #[arg(short = 'C', long, default_value = "sitegen.toml")]
    pub config: PathBuf,
}
