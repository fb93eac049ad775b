//! Configuration management for remoclip
//!
//! This module handles loading, validating, and managing configuration
//! shared by the remoclip server and client.

use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::clipboard::BackendKind;

/// Default TCP port of the server
pub const DEFAULT_PORT: u16 = 35612;

/// Environment variable that points at an alternative config file
pub const CONFIG_ENV_VAR: &str = "REMOCLIP_CONFIG";

/// Placeholder printed instead of the security token
pub const REDACTED: &str = "********";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error reading config file
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("Failed to parse TOML: {0}")]
    Toml(#[from] toml::de::Error),

    /// Validation error
    #[error("Config validation failed: {0}")]
    Validation(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Shared secret; when unset the server accepts every request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_token: Option<String>,

    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Client configuration
    #[serde(default)]
    pub client: ClientConfig,
}

/// Server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Path to the SQLite event database
    #[serde(default = "default_db")]
    pub db: PathBuf,

    /// Requested clipboard backend
    #[serde(default, deserialize_with = "deserialize_backend_kind")]
    pub clipboard_backend: BackendKind,

    /// Whether history entries may be deleted
    #[serde(default)]
    pub allow_deletions: bool,

    /// Optional Unix socket to serve on in addition to TCP
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub socket: Option<PathBuf>,
}

/// Client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the server
    #[serde(default = "default_url")]
    pub url: String,

    /// Unix socket to use instead of `url`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub socket: Option<PathBuf>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

// Default value functions
fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_db() -> PathBuf {
    PathBuf::from("~/.remoclip.sqlite")
}

fn default_url() -> String {
    format!("http://127.0.0.1:{}", DEFAULT_PORT)
}

fn default_timeout_secs() -> u64 {
    5
}

fn deserialize_backend_kind<'de, D>(deserializer: D) -> Result<BackendKind, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    raw.parse().map_err(serde::de::Error::custom)
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            db: default_db(),
            clipboard_backend: BackendKind::default(),
            allow_deletions: false,
            socket: None,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            socket: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Checks in order:
    /// 1. Path from REMOCLIP_CONFIG environment variable
    /// 2. ~/.config/remoclip/config.toml
    /// 3. Built-in defaults
    pub fn load() -> Result<Self, ConfigError> {
        match Self::find_config_path() {
            Some(path) => Self::load_from_path(&path),
            None => Self::from_toml(""),
        }
    }

    /// Load configuration with an optional explicit path
    ///
    /// A path that does not exist yields the defaults.
    pub fn load_config(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        match config_path {
            Some(path) if path.exists() => Self::load_from_path(path),
            Some(_) => Self::from_toml(""),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(expand_path(path))?;
        Self::from_toml(&contents)
    }

    /// Parse configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let mut config: Config = toml::from_str(toml_str)?;

        config.normalize();
        config.expand_paths();
        config.validate_config()?;

        Ok(config)
    }

    /// Copy of the configuration safe to print, with the token masked
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if config.security_token.is_some() {
            config.security_token = Some(REDACTED.to_string());
        }
        config
    }

    /// Default config file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("remoclip").join("config.toml"))
    }

    /// Find configuration file path
    fn find_config_path() -> Option<PathBuf> {
        // Check environment variable first
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let path = expand_path(Path::new(&path));
            if path.exists() {
                return Some(path);
            }
        }

        Self::default_path().filter(|p| p.exists())
    }

    /// Treat empty strings as unset
    fn normalize(&mut self) {
        if self.security_token.as_deref() == Some("") {
            self.security_token = None;
        }
        if self.server.socket.as_ref().is_some_and(|p| p.as_os_str().is_empty()) {
            self.server.socket = None;
        }
        if self.client.socket.as_ref().is_some_and(|p| p.as_os_str().is_empty()) {
            self.client.socket = None;
        }
    }

    /// Expand tilde in paths
    fn expand_paths(&mut self) {
        self.server.db = expand_path(&self.server.db);
        self.server.socket = self.server.socket.as_deref().map(expand_path);
        self.client.socket = self.client.socket.as_deref().map(expand_path);
    }

    /// Validate configuration values
    fn validate_config(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation(
                "server.port must be between 1 and 65535".to_string(),
            ));
        }

        if self.server.host.trim().is_empty() {
            return Err(ConfigError::Validation(
                "server.host must not be empty".to_string(),
            ));
        }

        if !(self.client.url.starts_with("http://") || self.client.url.starts_with("https://")) {
            return Err(ConfigError::Validation(
                "client.url must start with http:// or https://".to_string(),
            ));
        }

        if self.client.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "client.timeout_secs must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Write the example configuration to `path`
    pub fn write_example(path: &Path, force: bool) -> Result<(), ConfigError> {
        if !force && path.exists() {
            return Err(ConfigError::Validation(
                "Config file already exists. Use --force to overwrite.".to_string(),
            ));
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, Self::generate_example())?;
        Ok(())
    }

    /// Generate example configuration file
    pub fn generate_example() -> String {
        let server = ServerConfig::default();
        let client = ClientConfig::default();

        format!(
            r#"# remoclip configuration file
# Location: ~/.config/remoclip/config.toml

# Shared secret sent in the X-RemoClip-Token header.
# Leave unset to disable authentication.
# security_token = "change-me"

[server]
# Address and port to listen on
host = "{}"
port = {}
# Path to the event database
db = "{}"
# Clipboard backend: "system" or "private"
clipboard_backend = "{}"
# Allow DELETE /history
allow_deletions = {}
# Also listen on a Unix socket
# socket = "/tmp/remoclip.sock"

[client]
# Server base URL (http:// or https://)
url = "{}"
# Talk to the server over a Unix socket instead of the URL
# socket = "/tmp/remoclip.sock"
# Request timeout in seconds
timeout_secs = {}
"#,
            server.host,
            server.port,
            server.db.display(),
            server.clipboard_backend,
            server.allow_deletions,
            client.url,
            client.timeout_secs,
        )
    }
}

/// Expand tilde in path
fn expand_path(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();
    let expanded = shellexpand::tilde(path_str.as_ref());
    PathBuf::from(expanded.into_owned())
}
