//! Configuration system for Beacon.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $BEACON_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/beacon/config.toml
//!   3. ~/.config/beacon/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration. The directory daemon reads `[directory]`,
/// peer processes read `[peer]`; both sections live in one file so a
/// machine running both needs a single config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BeaconConfig {
    pub directory: DirectoryConfig,
    pub peer: PeerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    /// Port the directory HTTP API listens on.
    pub listen_port: u16,
    /// Remote key/value store endpoint. Empty = in-process map.
    /// Read once at startup; there is no runtime switch.
    pub store_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PeerConfig {
    /// Chat handle to register under. Usually given on the command line.
    pub username: String,
    /// TCP port for inbound chat connections. 0 = OS-assigned.
    pub listen_port: u16,
    /// Directory service base URL.
    pub directory_url: String,
    /// IP to advertise in the registration. Empty = auto-detect.
    pub advertise_ip: String,
}

impl DirectoryConfig {
    /// The remote store endpoint, if one is configured. Presence of this
    /// setting is what selects the remote backend.
    pub fn remote_store(&self) -> Option<&str> {
        let url = self.store_url.trim();
        if url.is_empty() {
            None
        } else {
            Some(url)
        }
    }
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for BeaconConfig {
    fn default() -> Self {
        Self {
            directory: DirectoryConfig::default(),
            peer: PeerConfig::default(),
        }
    }
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            listen_port: 5000,
            store_url: String::new(),
        }
    }
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            listen_port: 0,
            directory_url: "http://127.0.0.1:5000".to_string(),
            advertise_ip: String::new(),
        }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("beacon")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl BeaconConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            BeaconConfig::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("BEACON_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&BeaconConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text)
                .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Apply BEACON_* env var overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("BEACON_DIRECTORY__LISTEN_PORT") {
            if let Ok(p) = v.parse() {
                self.directory.listen_port = p;
            }
        }
        if let Ok(v) = std::env::var("BEACON_DIRECTORY__STORE_URL") {
            self.directory.store_url = v;
        }
        if let Ok(v) = std::env::var("BEACON_PEER__USERNAME") {
            self.peer.username = v;
        }
        if let Ok(v) = std::env::var("BEACON_PEER__LISTEN_PORT") {
            if let Ok(p) = v.parse() {
                self.peer.listen_port = p;
            }
        }
        if let Ok(v) = std::env::var("BEACON_PEER__DIRECTORY_URL") {
            self.peer.directory_url = v;
        }
        if let Ok(v) = std::env::var("BEACON_PEER__ADVERTISE_IP") {
            self.peer.advertise_ip = v;
        }
    }
}
