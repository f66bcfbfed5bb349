//! Configuration management for the CLI

use crate::output::OutputFormat;
use anyhow::{anyhow, Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// CLI configuration, read from `~/.config/tbx/config.json` when present
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Default output format (`table` or `json`)
    pub default_format: Option<String>,
    /// Default connectivity timeout in seconds
    pub timeout_secs: Option<i64>,
    /// Default cgroup mount root
    pub cgroup_root: Option<PathBuf>,
    /// Default procfs root
    pub proc_root: Option<PathBuf>,
    /// Default OS family (`linux` or `darwin`)
    pub os_family: Option<String>,
}

impl Config {
    /// Load configuration from file, or defaults if there is none
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// The configured default format, or table
    pub fn output_format(&self) -> Result<OutputFormat> {
        match self.default_format.as_deref() {
            Some(name) => OutputFormat::from_str(name, true)
                .map_err(|e| anyhow!("invalid default_format in config file: {e}")),
            None => Ok(OutputFormat::Table),
        }
    }

    /// Get the configuration file path
    fn config_path() -> Option<PathBuf> {
        dirs_next::home_dir().map(|home| home.join(".config").join("tbx").join("config.json"))
    }
}
