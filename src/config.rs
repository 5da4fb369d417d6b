use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::retry::{
    ConfigSource, KEY_BACKOFF_MULTIPLIER, KEY_JITTER_PERCENTAGE, KEY_MAX_RETRIES,
    KEY_RETRY_INTERVAL, KEY_TIMEOUT,
};

/// Retry parameters (optional `[retry]` section in config.toml). Every field
/// is optional; missing fields fall through to environment values and then
/// built-in defaults during policy resolution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrySection {
    /// Retry attempts after the initial try.
    #[serde(default)]
    pub max_retries: Option<u32>,
    /// Base wait in milliseconds before the first retry.
    #[serde(default)]
    pub retry_interval_ms: Option<u64>,
    /// Exponential growth factor per attempt.
    #[serde(default)]
    pub backoff_multiplier: Option<f64>,
    /// Symmetric randomization fraction in [0, 1].
    #[serde(default)]
    pub jitter_fraction: Option<f64>,
    /// Per-attempt deadline in seconds.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Global configuration loaded from `~/.config/flowd-client/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlowdConfig {
    /// Base URL of the flowd API (e.g. "https://flowd.example.com/api/v1/").
    #[serde(default)]
    pub base_url: Option<String>,
    /// Optional retry policy values; missing fields use env/defaults.
    #[serde(default)]
    pub retry: Option<RetrySection>,
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("flowd-client")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<FlowdConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = FlowdConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from(&path)
}

/// Load configuration from an explicit path (used by tests and embedders).
pub fn load_from(path: &Path) -> Result<FlowdConfig> {
    let data = fs::read_to_string(path)?;
    let cfg: FlowdConfig = toml::from_str(&data)?;
    Ok(cfg)
}

/// Exposes the `[retry]` table of a loaded config through the named-value
/// lookup used by policy resolution, so file-sourced values sit in the same
/// precedence tier as environment variables.
#[derive(Debug, Clone, Default)]
pub struct FileSource {
    retry: RetrySection,
}

impl FileSource {
    pub fn new(cfg: &FlowdConfig) -> Self {
        Self { retry: cfg.retry.clone().unwrap_or_default() }
    }
}

impl ConfigSource for FileSource {
    fn get(&self, key: &str) -> Option<String> {
        match key {
            KEY_MAX_RETRIES => self.retry.max_retries.map(|v| v.to_string()),
            KEY_RETRY_INTERVAL => self.retry.retry_interval_ms.map(|v| v.to_string()),
            KEY_BACKOFF_MULTIPLIER => self.retry.backoff_multiplier.map(|v| v.to_string()),
            KEY_JITTER_PERCENTAGE => self.retry.jitter_fraction.map(|v| v.to_string()),
            KEY_TIMEOUT => self.retry.timeout_secs.map(|v| v.to_string()),
            _ => None,
        }
    }
}
