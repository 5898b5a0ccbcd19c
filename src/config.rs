//! Configuration file
//!
//! TOML with one section per concern. Every field has a default, so a
//! missing file or a partial one is fine; command-line flags override what
//! is loaded here.

use std::io;
use std::path::{Path, PathBuf};

use lockbell_transport::fifo;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::audio::CueStyle;
use crate::session;

const SYSTEM_CONFIG: &str = "/etc/lockbell/config.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("Invalid config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Failed to write {}: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },
}

/// Notification channel settings shared by both sides
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// FIFO location
    pub path: PathBuf,
    /// Permission bits applied when the server creates the FIFO
    pub mode: u32,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(fifo::DEFAULT_PATH),
            mode: fifo::DEFAULT_MODE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Keyboard event node; discovered when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<PathBuf>,
    pub pid_file: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            device: None,
            pid_file: PathBuf::from(session::SERVER_PID_FILE),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Lock file; defaults to the session runtime directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid_file: Option<PathBuf>,
    pub cue: CueStyle,
    /// Tone volume, 0.0 to 1.0
    pub volume: f32,
}

fn default_volume() -> f32 {
    0.25
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            pid_file: None,
            cue: CueStyle::default(),
            volume: default_volume(),
        }
    }
}

impl ClientConfig {
    pub fn pid_file(&self) -> PathBuf {
        self.pid_file
            .clone()
            .unwrap_or_else(session::default_client_pid_file)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub channel: ChannelConfig,
    pub server: ServerConfig,
    pub client: ClientConfig,
}

impl Config {
    /// Per-user config path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lockbell")
            .join("config.toml")
    }

    /// The per-user config if it exists, else the system-wide one
    pub fn resolve_path() -> PathBuf {
        let user = Self::default_path();
        if user.exists() {
            user
        } else {
            PathBuf::from(SYSTEM_CONFIG)
        }
    }

    /// Load config from a file, or return default if not found
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Save config to a file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(write_err)
    }
}
