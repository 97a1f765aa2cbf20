//! # Configuration Module
//!
//! Layered settings for the Circa binary.
//!
//! Precedence, lowest to highest:
//! 1. Built-in defaults
//! 2. Optional TOML file (`--config`)
//! 3. CLI flags
//!
//! Security settings (`CIRCA_API_KEY`, `CIRCA_CORS_ORIGINS`,
//! `CIRCA_RATE_LIMIT`) stay in the environment and are read by the API layer.
//!
//! ## Example
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 8080
//!
//! [storage]
//! backend = "redb"
//! database = "circa.db"
//!
//! [validation]
//! composite_weight = "strict"
//!
//! [live]
//! channel_capacity = 512
//! ```

use circa_core::{CircaError, WeightPolicy};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Maximum size of a config file (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

/// Default per-subscriber queue size of the live channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

// =============================================================================
// STORAGE BACKEND
// =============================================================================

/// Which store the session runs on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// redb database (ACID, persistent).
    #[default]
    Redb,
    /// In-memory store saved to a snapshot file after each change.
    File,
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Redb => "redb",
            Self::File => "file",
        })
    }
}

// =============================================================================
// SECTIONS
// =============================================================================

/// `[server]`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// `[storage]`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    pub backend: Backend,
    pub database: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Redb,
            database: PathBuf::from("circa.db"),
        }
    }
}

/// `[validation]`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ValidationConfig {
    pub composite_weight: WeightPolicy,
}

/// `[live]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LiveConfig {
    pub channel_capacity: usize,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

// =============================================================================
// CONFIG
// =============================================================================

/// Complete application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub validation: ValidationConfig,
    pub live: LiveConfig,
}

/// Values given on the command line. `None` keeps the lower layer.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub database: Option<PathBuf>,
    pub backend: Option<Backend>,
    pub host: Option<String>,
    pub port: Option<u16>,
}

impl Config {
    /// Parse a TOML document.
    pub fn from_toml(text: &str) -> Result<Self, CircaError> {
        let config: Self = toml::from_str(text)
            .map_err(|e| CircaError::InvalidInput(format!("Invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from an optional file. No path means defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, CircaError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let metadata = std::fs::metadata(path).map_err(|e| {
            CircaError::InvalidInput(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(CircaError::InvalidInput(format!(
                "Config file size {} bytes exceeds maximum allowed {} bytes",
                metadata.len(),
                MAX_CONFIG_FILE_SIZE
            )));
        }

        let text = std::fs::read_to_string(path).map_err(|e| {
            CircaError::InvalidInput(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        Self::from_toml(&text)
    }

    /// Apply CLI values on top of this configuration.
    #[must_use]
    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        if let Some(database) = overrides.database {
            self.storage.database = database;
        }
        if let Some(backend) = overrides.backend {
            self.storage.backend = backend;
        }
        if let Some(host) = overrides.host {
            self.server.host = host;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        self
    }

    /// `host:port` to bind the HTTP server to.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    fn validate(&self) -> Result<(), CircaError> {
        if self.live.channel_capacity == 0 {
            return Err(CircaError::InvalidInput(
                "live.channel_capacity must be at least 1".to_string(),
            ));
        }
        if self.server.host.trim().is_empty() {
            return Err(CircaError::InvalidInput(
                "server.host must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
