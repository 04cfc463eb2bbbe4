use std::path::PathBuf;

use serde::Deserialize;

/// HTTP façade binding. The API is unauthenticated and must stay on
/// loopback.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 8000,
        }
    }
}

/// Browser-extension WebSocket listener.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub port: u16,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self { port: 8766 }
    }
}

/// Top-level daemon configuration, composed from an optional `vigil.toml`
/// and `VIGIL_*` environment overrides.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub ingest: IngestConfig,
    /// Overrides the per-OS application-data directory.
    pub data_dir: Option<PathBuf>,
    /// Default tracing filter when `RUST_LOG` is unset.
    pub log_filter: Option<String>,
}
