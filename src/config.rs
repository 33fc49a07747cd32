//! Configuration loading and persistence.
//!
//! Handles reading and writing the gameroom configuration file. Values come
//! from `config.json` in the platform config directory, with `GAMEROOM_*`
//! environment variables taking precedence over the file.

// Rust guideline compliant 2026-02

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::time::Duration;
use std::{fs, path::PathBuf};

use crate::constants::{DEFAULT_BIND, DEFAULT_PORT, RESPONSE_TIMEOUT_MS};

/// Configuration for the gameroom server binary.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Config {
    /// Address the listener binds to.
    pub bind: String,
    /// TCP port the listener uses.
    pub port: u16,
    /// Milliseconds a client call waits for its reply before giving up.
    pub response_timeout_ms: u64,
    /// Log filter applied when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            port: DEFAULT_PORT,
            response_timeout_ms: RESPONSE_TIMEOUT_MS,
            log_filter: "info".to_string(),
        }
    }
}

impl Config {
    /// Returns the configuration directory path, creating it if necessary.
    ///
    /// Directory selection priority:
    /// 1. `#[cfg(test)]` (unit tests): `tmp/gameroom-test`
    /// 2. `GAMEROOM_CONFIG_DIR` env var: explicit override
    /// 3. Default: platform config dir (macOS: ~/Library/Application Support/gameroom)
    pub fn config_dir() -> Result<PathBuf> {
        let dir = {
            #[cfg(test)]
            {
                // Unit tests: use the repo's tmp/ directory
                PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tmp/gameroom-test")
            }

            #[cfg(not(test))]
            {
                if let Ok(test_dir) = std::env::var("GAMEROOM_CONFIG_DIR") {
                    // Explicit override via env var
                    PathBuf::from(test_dir)
                } else {
                    // Production: use platform-standard config directory
                    dirs::config_dir()
                        .context("Could not determine config directory")?
                        .join("gameroom")
                }
            }
        };
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Loads configuration from file, with environment variable overrides.
    ///
    /// A missing or unreadable file falls back to defaults; the overrides
    /// are applied either way.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from_file().unwrap_or_else(|_| Self::default());
        config.apply_env_overrides();
        Ok(config)
    }

    fn load_from_file() -> Result<Self> {
        let config_path = Self::config_dir()?.join("config.json");
        if config_path.exists() {
            let content = fs::read_to_string(&config_path)?;
            Ok(serde_json::from_str(&content)?)
        } else {
            anyhow::bail!("Config file not found")
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(bind) = std::env::var("GAMEROOM_BIND") {
            self.bind = bind;
        }

        if let Ok(port) = std::env::var("GAMEROOM_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.port = port;
            }
        }

        if let Ok(timeout) = std::env::var("GAMEROOM_RESPONSE_TIMEOUT_MS") {
            if let Ok(ms) = timeout.parse::<u64>() {
                self.response_timeout_ms = ms;
            }
        }

        if let Ok(filter) = std::env::var("GAMEROOM_LOG") {
            self.log_filter = filter;
        }
    }

    /// Persists the current configuration to disk.
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_dir()?.join("config.json");
        fs::write(&config_path, serde_json::to_string_pretty(self)?)?;

        // Set restrictive permissions (owner read/write only)
        #[cfg(unix)]
        fs::set_permissions(&config_path, fs::Permissions::from_mode(0o600))?;

        Ok(())
    }

    /// The `host:port` string the server listener binds to.
    #[must_use]
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    /// The response deadline as a [`Duration`].
    #[must_use]
    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }
}
