use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::telemetry::PollerConfig;

const DEFAULT_CONFIG_DIR: &str = "/etc/wireguard/configs";
const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8765";

fn default_config_dir() -> String {
    DEFAULT_CONFIG_DIR.to_string()
}

fn default_status_command() -> Vec<String> {
    ["wg", "show", "all", "dump"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_poll_interval() -> u64 {
    5
}

fn default_command_timeout() -> u64 {
    4
}

fn default_store_timeout() -> u64 {
    2
}

fn default_store_retries() -> u32 {
    1
}

fn default_listen_addr() -> String {
    DEFAULT_LISTEN_ADDR.to_string()
}

fn default_database_path() -> String {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("vpnpulse")
        .join("dashboard.db")
        .to_string_lossy()
        .to_string()
}

fn default_subscriber_buffer() -> usize {
    8
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding one `<client>.conf` per peer
    #[serde(default = "default_config_dir")]
    pub config_dir: String,
    /// Program and arguments that print the peer table
    #[serde(default = "default_status_command")]
    pub status_command: Vec<String>,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
    #[serde(default = "default_store_timeout")]
    pub store_timeout_secs: u64,
    #[serde(default = "default_store_retries")]
    pub store_retries: u32,
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    #[serde(default = "default_database_path")]
    pub database_path: String,
    #[serde(default = "default_subscriber_buffer")]
    pub subscriber_buffer: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_dir: default_config_dir(),
            status_command: default_status_command(),
            poll_interval_secs: default_poll_interval(),
            command_timeout_secs: default_command_timeout(),
            store_timeout_secs: default_store_timeout(),
            store_retries: default_store_retries(),
            listen_addr: default_listen_addr(),
            database_path: default_database_path(),
            subscriber_buffer: default_subscriber_buffer(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;
        Self::load_from(&config_path)
    }

    /// Load from an explicit path, falling back to defaults when the file is
    /// missing, empty or unreadable as JSON.
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Config::default());
        }

        let data = fs::read(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        if data.iter().all(|b| b.is_ascii_whitespace()) {
            return Ok(Config::default());
        }

        let config = serde_json::from_slice(&data).unwrap_or_else(|e| {
            log::warn!(
                "Ignoring unreadable config file {:?} ({}), using defaults",
                config_path,
                e
            );
            Config::default()
        });

        Ok(config)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let data =
            serde_json::to_vec_pretty(self).with_context(|| "Failed to serialize config")?;

        fs::write(config_path, data)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        Ok(())
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir =
            dirs::config_dir().with_context(|| "Could not determine config directory")?;

        Ok(config_dir.join("vpnpulse").join("config.json"))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    /// Never longer than one poll interval
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs.max(1)).min(self.poll_interval())
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs.max(1))
    }

    /// Settings consumed by the poll loop
    pub fn poller_config(&self) -> PollerConfig {
        PollerConfig {
            interval: self.poll_interval(),
            config_dir: PathBuf::from(&self.config_dir),
            store_timeout: self.store_timeout(),
            store_retries: self.store_retries,
        }
    }
}
