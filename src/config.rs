use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use scan_debugger_core::ingest::{IngestOptions, DEFAULT_ENTRY_SUFFIX};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub archive: ArchiveConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ArchiveConfig {
    #[serde(default = "default_entry_suffix")]
    pub entry_suffix: String,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default = "default_exclude_globs")]
    pub exclude_globs: Vec<String>,
    #[serde(default = "default_max_entry_bytes")]
    pub max_entry_bytes: u64,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            entry_suffix: default_entry_suffix(),
            include_globs: default_include_globs(),
            exclude_globs: default_exclude_globs(),
            max_entry_bytes: default_max_entry_bytes(),
        }
    }
}

impl ArchiveConfig {
    pub fn ingest_options(&self) -> IngestOptions {
        IngestOptions {
            entry_suffix: self.entry_suffix.clone(),
        }
    }
}

fn default_entry_suffix() -> String {
    DEFAULT_ENTRY_SUFFIX.to_string()
}
fn default_include_globs() -> Vec<String> {
    vec!["**/*".to_string()]
}
fn default_exclude_globs() -> Vec<String> {
    vec!["__MACOSX/**".to_string()]
}
fn default_max_entry_bytes() -> u64 {
    64 * 1024 * 1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct DisplayConfig {
    #[serde(default = "default_max_endpoint_len")]
    pub max_endpoint_len: usize,
    #[serde(default = "default_truncated_endpoint_len")]
    pub truncated_endpoint_len: usize,
    #[serde(default = "default_show_bodies")]
    pub show_bodies: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            max_endpoint_len: default_max_endpoint_len(),
            truncated_endpoint_len: default_truncated_endpoint_len(),
            show_bodies: default_show_bodies(),
        }
    }
}

fn default_max_endpoint_len() -> usize {
    50
}
fn default_truncated_endpoint_len() -> usize {
    47
}
fn default_show_bodies() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub format: LogFormat,
}

impl Config {
    /// Built-in defaults, used when no config file exists.
    pub fn minimal() -> Self {
        Self::default()
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).with_context(|| "Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.archive.entry_suffix.is_empty() {
            anyhow::bail!("archive.entry_suffix must not be empty");
        }
        if self.archive.max_entry_bytes == 0 {
            anyhow::bail!("archive.max_entry_bytes must be > 0");
        }
        if self.archive.include_globs.is_empty() {
            anyhow::bail!("archive.include_globs must list at least one pattern");
        }
        if self.display.truncated_endpoint_len >= self.display.max_endpoint_len {
            anyhow::bail!(
                "display.truncated_endpoint_len ({}) must be < display.max_endpoint_len ({})",
                self.display.truncated_endpoint_len,
                self.display.max_endpoint_len
            );
        }
        Ok(())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    Config::from_toml_str(&content)
}
