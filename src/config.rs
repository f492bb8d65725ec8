//! Application configuration.
//!
//! Both binaries read the same JSON file.  Every section is optional and
//! every field falls back to the compiled-in default, so `{}` is a valid
//! configuration and so is a missing file.
//!
//! # Example
//!
//! ```json
//! {
//!   "pipe": { "name": "PSClipboardPipe" },
//!   "client": {
//!     "connect_timeout_ms": 1000,
//!     "reply_timeout_ms": 1000,
//!     "retry_count": 3,
//!     "retry_delay_ms": 500
//!   },
//!   "server": {
//!     "backoff_start_ms": 1000,
//!     "backoff_max_ms": 30000,
//!     "startup_wait_ms": 500,
//!     "read_timeout_ms": 1000
//!   },
//!   "hotkey": { "combination": "ctrl+shift+KeyV" },
//!   "window": { "width": 420, "height": 560 }
//! }
//! ```

use crate::command::DEFAULT_PIPE_NAME;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub pipe: PipeConfig,

    /// Hotkey-listener side of the pipe.
    #[serde(default)]
    pub client: ClientConfig,

    /// Main-application side of the pipe.
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub hotkey: HotkeyConfig,

    /// Size of the window positioned by the show action.
    #[serde(default)]
    pub window: WindowConfig,
}

/// Transport naming.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipeConfig {
    /// Symbolic pipe name shared by both processes.
    pub name: String,
}

impl Default for PipeConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_PIPE_NAME.into(),
        }
    }
}

/// Notification retry policy.  All durations are in **milliseconds**.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Upper bound on a single connection attempt.
    pub connect_timeout_ms: u64,
    /// Upper bound on waiting for the acknowledgment line.
    pub reply_timeout_ms: u64,
    /// Total connection attempts per notification.
    pub retry_count: u32,
    /// Pause between two consecutive attempts.
    pub retry_delay_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 1000,
            reply_timeout_ms: 1000,
            retry_count: 3,
            retry_delay_ms: 500,
        }
    }
}

impl ClientConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Accept-loop failure handling.  All durations are in **milliseconds**.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// First delay after an endpoint-creation failure.
    pub backoff_start_ms: u64,
    /// Ceiling for the doubling delay.
    pub backoff_max_ms: u64,
    /// How long the main application waits for the server to report
    /// readiness before starting the hotkey listener anyway.
    pub startup_wait_ms: u64,
    /// How long an accepted client may take to send its command line.
    pub read_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            backoff_start_ms: 1000,
            backoff_max_ms: 30000,
            startup_wait_ms: 500,
            read_timeout_ms: 1000,
        }
    }
}

impl ServerConfig {
    pub fn backoff_start(&self) -> Duration {
        Duration::from_millis(self.backoff_start_ms)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }

    pub fn startup_wait(&self) -> Duration {
        Duration::from_millis(self.startup_wait_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

/// Global shortcut settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HotkeyConfig {
    /// Shortcut in `global-hotkey` syntax, e.g. `"ctrl+shift+KeyV"`.
    pub combination: String,
    /// Explicit path to the `clipwake-hotkey` executable.  When unset the
    /// binary next to the running executable is used.
    pub listener_path: Option<PathBuf>,
}

impl Default for HotkeyConfig {
    fn default() -> Self {
        Self {
            combination: "ctrl+shift+KeyV".into(),
            listener_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub width: i32,
    pub height: i32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 420,
            height: 560,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError(format!("failed to read {}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| ConfigError(format!("failed to parse {}: {}", path.display(), e)))?;
        Ok(config)
    }

    /// Load from [`default_path`], falling back to defaults when the file
    /// is missing or unreadable.
    pub fn load_or_default() -> Self {
        let path = default_path();
        match Self::load(&path) {
            Ok(cfg) => {
                log::info!("loaded config from {}", path.display());
                cfg
            }
            Err(e) => {
                log::info!("no config file ({}), using defaults", e);
                Self::default()
            }
        }
    }
}

/// Resolve the config directory (`$XDG_CONFIG_HOME/clipwake`, then
/// `%APPDATA%\clipwake`, then `$HOME/.config/clipwake`).
pub fn config_dir() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .or_else(|_| std::env::var("APPDATA"))
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
            format!("{}/.config", home)
        });
    PathBuf::from(base).join("clipwake")
}

/// `config.json` inside [`config_dir`].
pub fn default_path() -> PathBuf {
    config_dir().join("config.json")
}

/// Error from loading or parsing a configuration file.
#[derive(Debug, thiserror::Error)]
#[error("config error: {0}")]
pub struct ConfigError(String);
