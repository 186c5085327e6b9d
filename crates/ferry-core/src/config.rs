//! Configuration system for Ferry.
//!
//! Resolution order: command line → environment variables → config file → defaults.
//! The command line layer lives in `ferryd`; everything else is here.
//!
//! Config file location:
//!   1. $FERRY_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/ferry/config.toml
//!   3. ~/.config/ferry/config.toml

use serde::Deserialize;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

/// Default UDP listen port.
pub const DEFAULT_PORT: u16 = 12001;

/// Default destination for the reconstructed file.
pub const DEFAULT_OUTPUT: &str = "received_file.jpg";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FerryConfig {
    pub network: NetworkConfig,
    pub output: OutputConfig,
    pub reassembly: ReassemblyConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address to bind. 0.0.0.0 = all IPv4 interfaces.
    pub bind_addr: IpAddr,
    /// UDP port for chunk datagrams.
    pub port: u16,
    /// SO_RCVBUF in bytes. 0 = kernel default.
    pub recv_buffer_bytes: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Where the reconstructed bytes are written. Overwritten on every transfer.
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReassemblyConfig {
    /// How far ahead of the expected sequence number a chunk may be
    /// buffered. Chunks beyond it are neither buffered nor acked.
    /// 0 = unbounded.
    pub reorder_window: u32,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::from([0, 0, 0, 0]),
            port: DEFAULT_PORT,
            recv_buffer_bytes: 0,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_OUTPUT),
        }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("ferry")
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
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl FerryConfig {
    /// Load from an explicit file, then apply env overrides.
    /// A missing file is not an error.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(path)
                .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
            Self::parse(&text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))?
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            FerryConfig::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Defaults with env overrides applied, for when the file can't be used.
    pub fn defaults_with_env() -> Self {
        Self::defaults_with(|key| std::env::var(key).ok())
    }

    fn defaults_with(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = FerryConfig::default();
        config.apply_overrides(lookup);
        config
    }

    /// Parse TOML text. Missing sections and keys take their defaults.
    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("FERRY_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Apply FERRY_* env var overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any key lookup. Values that fail to parse are ignored.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("FERRY_NETWORK__BIND_ADDR") {
            if let Ok(addr) = v.parse() {
                self.network.bind_addr = addr;
            }
        }
        if let Some(v) = lookup("FERRY_NETWORK__PORT") {
            if let Ok(p) = v.parse() {
                self.network.port = p;
            }
        }
        if let Some(v) = lookup("FERRY_NETWORK__RECV_BUFFER_BYTES") {
            if let Ok(n) = v.parse() {
                self.network.recv_buffer_bytes = n;
            }
        }
        if let Some(v) = lookup("FERRY_OUTPUT__PATH") {
            if !v.is_empty() {
                self.output.path = PathBuf::from(v);
            }
        }
        if let Some(v) = lookup("FERRY_REASSEMBLY__REORDER_WINDOW") {
            if let Ok(w) = v.parse() {
                self.reassembly.reorder_window = w;
            }
        }
    }
}
