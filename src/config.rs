//! Configuration management with XDG paths
//!
//! ~/.config/pyeonan/config.json - API key, model, retry tuning (0600)
//! ~/.local/state/pyeonan/       - Log file

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::client::GEMINI_API_BASE;
use crate::history::{HistoryWindow, DEFAULT_WINDOW};
use crate::models::SupportedModel;
use crate::retry::{RetryPolicy, DEFAULT_INITIAL_DELAY_SECS, DEFAULT_MAX_RETRIES};

const APP_NAME: &str = "pyeonan";

/// Environment variable that overrides the configured key
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Get config directory (~/.config/pyeonan/)
pub fn config_dir() -> Result<PathBuf> {
    let base = dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
        .context("Could not determine config directory")?;
    Ok(base.join(APP_NAME))
}

/// Get state directory (~/.local/state/pyeonan/)
pub fn state_dir() -> Result<PathBuf> {
    let base = dirs::state_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".local/state")))
        .context("Could not determine state directory")?;
    Ok(base.join(APP_NAME))
}

/// Get config file path
pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.json"))
}

/// Ensure all directories exist
pub fn ensure_dirs() -> Result<()> {
    fs::create_dir_all(config_dir()?)?;
    fs::create_dir_all(state_dir()?)?;
    Ok(())
}

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Gemini API key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model used at startup
    #[serde(default)]
    pub default_model: SupportedModel,

    /// Attempts per completion call
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// First backoff delay after a rate limit
    #[serde(default = "default_initial_delay")]
    pub initial_delay_secs: f64,

    /// Prior turns sent as context
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    /// API root, overridable for proxies
    #[serde(default = "default_api_base")]
    pub api_base_url: String,
}

fn default_max_retries() -> u32 { DEFAULT_MAX_RETRIES }
fn default_initial_delay() -> f64 { DEFAULT_INITIAL_DELAY_SECS }
fn default_history_window() -> usize { DEFAULT_WINDOW }
fn default_api_base() -> String { GEMINI_API_BASE.to_string() }

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            default_model: SupportedModel::default(),
            max_retries: default_max_retries(),
            initial_delay_secs: default_initial_delay(),
            history_window: default_history_window(),
            api_base_url: default_api_base(),
        }
    }
}

impl Config {
    /// Load config from disk, or return defaults
    pub fn load() -> Result<Self> {
        ensure_dirs()?;
        Self::load_from(&config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Save config to disk with secure permissions
    pub fn save(&self) -> Result<()> {
        ensure_dirs()?;
        self.save_to(&config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, &content)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        // Owner read/write only, the file holds the API key
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(path)?.permissions();
            perms.set_mode(0o600);
            fs::set_permissions(path, perms)?;
        }

        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from_secs(self.max_retries, self.initial_delay_secs)
    }

    pub fn history(&self) -> HistoryWindow {
        HistoryWindow::new(self.history_window)
    }

    /// Apply a `config set <key> <value>` pair
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "key" | "api_key" | "gemini.key" => {
                let value = value.trim();
                anyhow::ensure!(!value.is_empty(), "API key must not be empty");
                self.api_key = Some(value.to_string());
            }
            "model" => {
                self.default_model = value.parse()?;
            }
            "retries" | "max_retries" => {
                self.max_retries = value
                    .parse()
                    .with_context(|| format!("Invalid retry count: {}", value))?;
            }
            "delay" | "initial_delay_secs" => {
                let secs: f64 = value
                    .parse()
                    .with_context(|| format!("Invalid delay: {}", value))?;
                anyhow::ensure!(secs.is_finite() && secs >= 0.0, "Delay must be a non-negative number");
                self.initial_delay_secs = secs;
            }
            "window" | "history_window" => {
                self.history_window = value
                    .parse()
                    .with_context(|| format!("Invalid window size: {}", value))?;
            }
            "base_url" | "api_base_url" => {
                self.api_base_url = value.trim().to_string();
            }
            _ => {
                anyhow::bail!(
                    "Unknown config key: {}. Valid keys: key, model, retries, delay, window, base_url",
                    key
                );
            }
        }
        Ok(())
    }
}

/// Pick the environment key if set, else the configured one
pub fn resolve_api_key(env_value: Option<String>, cfg: &Config) -> Option<String> {
    env_value
        .filter(|k| !k.trim().is_empty())
        .or_else(|| cfg.api_key.clone().filter(|k| !k.trim().is_empty()))
}
