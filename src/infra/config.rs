// src/infra/config.rs — Configuration loading (TOML)

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::infra::errors::XeerError;
use crate::infra::paths;

/// Env var that overrides `[server] base_url`.
pub const SERVER_ENV: &str = "XEERCHAT_SERVER";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub chat: ChatConfig,

    #[serde(default)]
    pub usage: UsageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub base_url: String,
    /// Hard timeout for the non-streaming request path.
    pub legacy_timeout_seconds: u64,
    pub legacy_max_retries: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".into(),
            legacy_timeout_seconds: 30,
            legacy_max_retries: 3,
        }
    }
}

impl ServerConfig {
    pub fn legacy_timeout(&self) -> Duration {
        Duration::from_secs(self.legacy_timeout_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub default_model: String,
    /// Pastes with at least this many lines become attachments.
    pub paste_line_threshold: usize,
    pub max_message_chars: usize,
    pub history_limit: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            default_model: "gemini-1.5-flash".into(),
            paste_line_threshold: 150,
            max_message_chars: 1000,
            history_limit: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageConfig {
    pub poll_interval_seconds: u64,
}

impl Default for UsageConfig {
    fn default() -> Self {
        Self {
            poll_interval_seconds: 30,
        }
    }
}

impl UsageConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds.max(1))
    }
}

impl Config {
    /// Load config from file, falling back to defaults.
    pub fn load() -> anyhow::Result<Self> {
        let path = paths::config_file_path();
        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            Self::default()
        };
        config.apply_env();
        Ok(config)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| XeerError::Config(format!("{}: {}", path.display(), e)))?;
        Ok(config)
    }

    /// Apply environment overrides (`XEERCHAT_SERVER`).
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(SERVER_ENV) {
            if !url.trim().is_empty() {
                self.server.base_url = url.trim().to_string();
            }
        }
    }
}
