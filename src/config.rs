use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub telegram: TelegramConfig,

    #[serde(default)]
    pub registry: RegistryConfig,

    #[serde(default)]
    pub wizard: WizardConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot token. Usually supplied via TELEGRAM_BOT_TOKEN rather than the
    /// config file.
    #[serde(default)]
    pub bot_token: Option<String>,

    /// Long-poll timeout passed to getUpdates, in seconds.
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            poll_timeout: default_poll_timeout(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Path to the SQLite channel registry. Usually supplied via CHANNELS_DB.
    #[serde(default)]
    pub db_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WizardConfig {
    /// Abandoned /connect sessions are evicted after this many seconds.
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            session_ttl_secs: default_session_ttl_secs(),
        }
    }
}

fn default_poll_timeout() -> u64 {
    30
}
fn default_session_ttl_secs() -> u64 {
    900
}

impl Config {
    /// Load from an optional TOML file, then overlay the environment.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut config = match path {
            Some(p) => {
                let raw = fs::read_to_string(p)
                    .with_context(|| format!("failed to read config file {}", p))?;
                toml::from_str(&raw)
                    .with_context(|| format!("failed to parse config file {}", p))?
            }
            None => Config::default(),
        };
        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(token) = std::env::var("TELEGRAM_BOT_TOKEN") {
            if !token.is_empty() {
                self.telegram.bot_token = Some(token);
            }
        }
        if let Ok(path) = std::env::var("CHANNELS_DB") {
            if !path.is_empty() {
                self.registry.db_path = Some(path);
            }
        }
    }

    /// Startup validation. `open_gate` relaxes the registry requirement
    /// (the stateless variant has no store).
    pub fn validate(&self, open_gate: bool) -> Result<()> {
        if self.telegram.bot_token.as_deref().unwrap_or("").is_empty() {
            anyhow::bail!("missing bot token: set TELEGRAM_BOT_TOKEN or telegram.bot_token");
        }
        if !open_gate && self.registry.db_path.as_deref().unwrap_or("").is_empty() {
            anyhow::bail!(
                "missing channel registry path: set CHANNELS_DB or registry.db_path \
                 (or run with --open-gate to approve without a registry)"
            );
        }
        Ok(())
    }
}
