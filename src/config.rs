//! Framework configuration.
//!
//! Read once at startup, from a TOML file and/or the environment:
//!
//! ```toml
//! [store]
//! region = "eu-west-1"
//! access_key_id = "AKIA..."
//! secret_access_key = "..."
//! endpoint = "http://localhost:8000"   # optional, e.g. DynamoDB Local
//!
//! [log]
//! level = "debug"
//! format = "json"
//!
//! [server]
//! addr = "127.0.0.1:3000"              # local development server only
//! ```
//!
//! Environment variables override file values:
//!
//! | Variable | Field |
//! |---|---|
//! | `MINDLESS_STORE_REGION` | `store.region` |
//! | `MINDLESS_STORE_ACCESS_KEY_ID` | `store.access_key_id` |
//! | `MINDLESS_STORE_SECRET_ACCESS_KEY` | `store.secret_access_key` |
//! | `MINDLESS_STORE_ENDPOINT` | `store.endpoint` |
//! | `MINDLESS_LOG_LEVEL` | `log.level` |
//! | `MINDLESS_SERVER_ADDR` | `server.addr` |

use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub log: LogConfig,
    pub server: ServerConfig,
}

/// Connection settings for the hosted table store.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub endpoint: Option<String>,
}

impl Default for StoreConfig {
    /// Placeholder credentials accepted by local store emulators.
    fn default() -> Self {
        Self {
            region: "us-east-1".to_owned(),
            access_key_id: "local".to_owned(),
            secret_access_key: "local".to_owned(),
            endpoint: None,
        }
    }
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("region", &self.region)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// An `EnvFilter` directive, e.g. `info` or `mindless=debug,info`.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { level: "info".to_owned(), format: LogFormat::Text }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { addr: "127.0.0.1:3000".to_owned() }
    }
}

impl Config {
    /// Parses and validates TOML text. The environment is not consulted.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a TOML file, then applies environment overrides.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_owned(), source })?;
        let mut config: Self = toml::from_str(&text)?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus environment overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("MINDLESS_STORE_REGION") {
            self.store.region = v;
        }
        if let Some(v) = lookup("MINDLESS_STORE_ACCESS_KEY_ID") {
            self.store.access_key_id = v;
        }
        if let Some(v) = lookup("MINDLESS_STORE_SECRET_ACCESS_KEY") {
            self.store.secret_access_key = v;
        }
        if let Some(v) = lookup("MINDLESS_STORE_ENDPOINT") {
            self.store.endpoint = Some(v).filter(|e| !e.is_empty());
        }
        if let Some(v) = lookup("MINDLESS_LOG_LEVEL") {
            self.log.level = v;
        }
        if let Some(v) = lookup("MINDLESS_SERVER_ADDR") {
            self.server.addr = v;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.region.trim().is_empty() {
            return Err(ConfigError::Invalid("store.region must not be empty".into()));
        }
        if self.store.access_key_id.is_empty() || self.store.secret_access_key.is_empty() {
            return Err(ConfigError::Invalid("store credentials must not be empty".into()));
        }
        if let Some(endpoint) = &self.store.endpoint {
            url::Url::parse(endpoint)
                .map_err(|e| ConfigError::Invalid(format!("store.endpoint `{endpoint}`: {e}")))?;
        }
        self.server_addr()?;
        Ok(())
    }

    /// The local server address, parsed.
    pub fn server_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.server
            .addr
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("server.addr `{}`: {e}", self.server.addr)))
    }
}
