use anyhow::{Context, Result};
use dirs::config_dir;
use path_clean::PathClean;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::github::DEFAULT_API_URL;
use crate::models::FileFormat;

/// Main configuration structure for issue-archiver
///
/// Every value here is a default; command-line flags override it.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    /// GitHub endpoint settings
    #[serde(default)]
    pub github: GitHubConfig,

    /// Where and how issues are written
    #[serde(default)]
    pub output: OutputConfig,

    /// Which repositories and issues are included
    #[serde(default)]
    pub filters: FilterConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// GitHub configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GitHubConfig {
    /// API base URL, change for GitHub Enterprise Server
    #[serde(default = "default_api_url")]
    pub api_url: String,
}

/// Output configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct OutputConfig {
    /// Root directory for archived issues
    #[serde(default = "default_save_dir")]
    pub save_dir: String,

    /// Formats written for every issue
    #[serde(default = "default_formats")]
    pub formats: Vec<FileFormat>,

    /// Set file modification times to the issue's last update
    #[serde(default = "default_true")]
    pub preserve_timestamps: bool,
}

/// Repository and issue filters
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FilterConfig {
    /// Include archived repositories
    #[serde(default = "default_true")]
    pub include_archived: bool,

    /// Include closed issues
    #[serde(default = "default_true")]
    pub include_closed: bool,
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String, // "info"
}

// Default value functions
fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}
fn default_save_dir() -> String {
    ".".to_string()
}
fn default_formats() -> Vec<FileFormat> {
    FileFormat::all()
}
fn default_true() -> bool {
    true
}
fn default_log_level() -> String {
    "info".to_string()
}

// Default implementations
impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            save_dir: default_save_dir(),
            formats: default_formats(),
            preserve_timestamps: default_true(),
        }
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            include_archived: default_true(),
            include_closed: default_true(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, falling back to defaults
    pub fn load_or_default() -> Result<Self> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let mut config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        // Expand environment variables in paths
        config.expand_paths()?;

        Ok(config)
    }

    /// Get the default configuration file path (XDG compliant)
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = config_dir().context("Failed to get user config directory")?;

        Ok(config_dir.join("issue-archiver").join("config.yml"))
    }

    /// Expand environment variables in configuration paths
    pub fn expand_paths(&mut self) -> Result<()> {
        self.output.save_dir = expand_dir(&self.output.save_dir)?
            .to_string_lossy()
            .into_owned();

        Ok(())
    }
}

/// Expand `~` and environment variables in a directory and normalize it
pub fn expand_dir(raw: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(raw)
        .with_context(|| format!("Failed to expand path: {}", raw))?;

    Ok(PathBuf::from(expanded.as_ref()).clean())
}
