//! Build configuration from `sitegen.toml`.
//!
//! The config file is optional; every field has a default and the CLI
//! overrides the file.
//!
//! # Example
//!
//! ```toml
//! [build]
//! source = "source"
//! destination = "output"
//!
//! [build.stylesheet]
//! command = ["lessc"]
//!
//! [watch]
//! debounce_ms = 300
//! ```

use crate::cli::Cli;
use crate::logger::Logger;
use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error when reading `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("config file parsing error")]
    Toml(#[from] toml::de::Error),

    #[error("config validation error: {0}")]
    Validation(String),
}

/// Root configuration structure representing sitegen.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SiteConfig {
    /// Build paths and tool settings
    pub build: BuildSection,

    /// Watch mode settings
    pub watch: WatchSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct BuildSection {
    /// Source directory walked by the build
    pub source: PathBuf,

    /// Destination directory for generated output
    pub destination: PathBuf,

    /// Stylesheet compiler settings
    pub stylesheet: StylesheetSection,
}

impl Default for BuildSection {
    fn default() -> Self {
        Self {
            source: PathBuf::from("source"),
            destination: PathBuf::from("output"),
            stylesheet: StylesheetSection::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct StylesheetSection {
    /// Compiler argv prefix; source and destination paths are appended.
    pub command: Vec<String>,
}

impl Default for StylesheetSection {
    fn default() -> Self {
        Self {
            command: vec!["lessc".to_owned()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct WatchSection {
    /// Quiet period after a change event before a rebuild fires.
    pub debounce_ms: u64,
}

impl Default for WatchSection {
    fn default() -> Self {
        Self { debounce_ms: 300 }
    }
}

impl SiteConfig {
    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self> {
        let config: SiteConfig = toml::from_str(content).map_err(ConfigError::Toml)?;
        Ok(config)
    }

    /// Load configuration from file path
    pub fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        Self::from_str(&content)
    }

    /// Load the config file when present, defaults otherwise.
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::from_path(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Apply CLI overrides on top of the file values.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(source) = &cli.source {
            self.build.source = source.clone();
        }
        if let Some(destination) = &cli.destination {
            self.build.destination = destination.clone();
        }
    }

    /// Validate the configuration before any build runs.
    ///
    /// A missing stylesheet compiler is a warning, not an error: sources
    /// without stylesheets build fine without one.
    pub fn validate(&self, logger: &Logger) -> Result<()> {
        if self.build.stylesheet.command.is_empty() {
            bail!(ConfigError::Validation(
                "[build.stylesheet.command] must have at least one element".into()
            ));
        }

        if self.build.source == self.build.destination {
            bail!(ConfigError::Validation(
                "[build.source] and [build.destination] must differ".into()
            ));
        }

        let compiler = &self.build.stylesheet.command[0];
        if which::which(compiler).is_err() {
            logger.log(
                "warn",
                format!("`{compiler}` not found; stylesheet files will fail to compile"),
            );
        }

        Ok(())
    }
}
