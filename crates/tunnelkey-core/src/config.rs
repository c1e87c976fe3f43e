// ── Configuration ──
//
// TOML config file merged with TUNNELKEY_-prefixed environment variables.
// CLI flags are applied on top by the binary; core never parses argv.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Default daemon management socket.
pub const DEFAULT_SOCKET_PATH: &str = "/var/run/tunnelkeyd.sock";

/// Default account page for managing registered keys.
pub const DEFAULT_ACCOUNT_URL: &str = "https://tunnelkey.net/account";

// ── File config ─────────────────────────────────────────────────────

/// On-disk configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Daemon socket path override.
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,

    /// Account page shown in the "manage keys" hint.
    #[serde(default = "default_account_url")]
    pub account_url: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            account_url: default_account_url(),
            timeout: default_timeout(),
        }
    }
}

fn default_socket_path() -> PathBuf {
    PathBuf::from(DEFAULT_SOCKET_PATH)
}
fn default_account_url() -> String {
    DEFAULT_ACCOUNT_URL.into()
}
fn default_timeout() -> u64 {
    15
}

impl Config {
    /// Runtime connection settings derived from this config.
    pub fn daemon_config(&self) -> DaemonConfig {
        DaemonConfig {
            socket_path: self.socket_path.clone(),
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(self.timeout),
        }
    }
}

// ── Runtime connection config ───────────────────────────────────────

/// How to reach the daemon. Built from [`Config`] plus CLI overrides and
/// handed to [`DaemonClient`](crate::daemon::DaemonClient).
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub socket_path: PathBuf,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Config::default().daemon_config()
    }
}

// ── Loading ─────────────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("net", "tunnelkey", "tunnelkey").map_or_else(
        || PathBuf::from(".config/tunnelkey/config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Load configuration from the canonical path + environment.
pub fn load_config() -> Result<Config, CoreError> {
    load_config_from(&config_path())
}

/// Load configuration from an explicit file path + environment.
///
/// Merge order (later wins): built-in defaults, the TOML file (if any),
/// then `TUNNELKEY_`-prefixed environment variables.
pub fn load_config_from(path: &Path) -> Result<Config, CoreError> {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("TUNNELKEY_"))
        .extract()
        .map_err(|e| CoreError::Config {
            message: e.to_string(),
        })
}

/// Load config, falling back to defaults if loading fails.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}
