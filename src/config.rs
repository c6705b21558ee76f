//! Configuration management
//!
//! Config file is stored in a per-user config directory as `config.toml`.
//! Every field has a default, so a missing or partial file is fine; CLI
//! flags override whatever the file says. A parse error falls back to
//! defaults with a warning rather than refusing to start.

use crate::constants::{DEFAULT_BIND, DEFAULT_LOG_LEVEL, DEFAULT_PORT};
use crate::error::{KvmError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::warn;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub mjpg: MjpgConfig,
    pub logs: LogsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Control channel port
    pub port: u16,
    /// Bind address literal (IPv4 or IPv6)
    pub bind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MjpgConfig {
    /// Helper install directory; empty resolves `mjpg_streamer` via PATH
    pub root: String,
    /// Helper log file; empty inherits the server's stdout
    pub logfile: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogsConfig {
    /// Server log file; empty logs to stdout/stderr
    pub file: String,
    /// Numeric level 0..5 (FATAL ERROR WARN INFO DEBUG TRACE)
    pub level: u8,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
        }
    }
}

impl Default for MjpgConfig {
    fn default() -> Self {
        Self {
            root: String::new(),
            logfile: String::new(),
        }
    }
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            file: String::new(),
            level: DEFAULT_LOG_LEVEL,
        }
    }
}

pub fn config_dir() -> Result<PathBuf> {
    if let Some(v) = std::env::var_os("XDG_CONFIG_HOME") {
        return Ok(PathBuf::from(v).join("openkvm").join("okvm-server"));
    }
    let home = std::env::var_os("HOME").ok_or_else(|| KvmError::ConfigValidation {
        field: "HOME",
        reason: "environment variable not set".into(),
    })?;
    Ok(PathBuf::from(home)
        .join(".config")
        .join("openkvm")
        .join("okvm-server"))
}

pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Load config from file, or defaults when absent or unreadable
pub fn load() -> Config {
    let path = match config_path() {
        Ok(p) => p,
        Err(e) => {
            warn!("Failed to determine config path: {}, using defaults", e);
            return Config::default();
        }
    };
    if !path.exists() {
        return Config::default();
    }
    match std::fs::read_to_string(&path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                warn!("Config parse error in {:?}: {}, using defaults", path, e);
                Config::default()
            }
        },
        Err(e) => {
            warn!("Failed to read config {:?}: {}, using defaults", path, e);
            Config::default()
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
