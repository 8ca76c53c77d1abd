//! Configuration management for Quarry

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};

/// Main configuration structure for Quarry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Result consumption configuration
    #[serde(default)]
    pub client: ClientConfig,

    /// Embedded backend configuration
    #[serde(default)]
    pub local: LocalConfig,

    /// Remote cluster configuration
    #[serde(default)]
    pub cluster: ClusterConfig,

    /// Standalone backend configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML/JSON file
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = tokio::fs::read_to_string(path.as_ref())
            .await
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        if path.as_ref().extension().map_or(false, |ext| ext == "toml") {
            Self::from_toml(&content)
        } else {
            serde_json::from_str(&content)
                .map_err(|e| Error::Config(format!("Failed to parse JSON config: {}", e)))
        }
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse TOML config: {}", e)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Upper bound on waiting for the last chunk, unbounded when unset
    pub await_timeout_ms: Option<u64>,
    /// Print each decoded batch
    pub render_results: bool,
    /// Rows printed per batch
    pub max_render_rows: usize,
}

impl ClientConfig {
    pub fn await_timeout(&self) -> Option<Duration> {
        self.await_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            await_timeout_ms: None,
            render_results: true,
            max_render_rows: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalConfig {
    /// Number of embedded backend nodes to start
    pub bits: usize,
    /// Maximum rows per result chunk
    pub batch_size: usize,
    /// Pause between chunks in milliseconds
    pub chunk_delay_ms: u64,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            bits: 1,
            batch_size: 4096,
            chunk_delay_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Discovery method
    pub discovery_method: String,
    /// Connect string handed to discovery (comma-separated `host:port`)
    pub connect: String,
    /// Explicit endpoints, preferred over `connect` when non-empty
    pub endpoints: Vec<String>,
    /// Connect timeout in milliseconds
    pub connect_timeout_ms: u64,
}

impl ClusterConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            discovery_method: "static".to_string(),
            connect: "localhost:2181".to_string(),
            endpoints: vec![],
            connect_timeout_ms: 10000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the standalone backend listens on
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:31010".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive level
    pub level: String,
    /// Output format ("pretty" or "json")
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
