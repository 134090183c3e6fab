use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracelink_core::{AttributionConfig, StoreBackend, StoreConfig};
use tracelink_server::AccessConfig;

/// Configuration as stored in TOML files (with optional fields for merging)
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawTracelinkConfig {
    #[serde(default)]
    pub server: RawServerConfig,

    #[serde(default)]
    pub store: RawStoreConfig,

    /// Replaces lower layers as a whole when present
    #[serde(default)]
    pub auth: Option<AccessConfig>,

    /// Replaces lower layers as a whole when present
    #[serde(default)]
    pub attribution: Option<AttributionConfig>,
}

/// Server config as stored in TOML (optional fields for proper merging)
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawServerConfig {
    /// Host address to bind to
    pub host: Option<String>,

    /// Port for the tracelink server
    pub port: Option<u16>,
}

/// Store config as stored in TOML
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawStoreConfig {
    pub backend: Option<StoreBackend>,
    pub path: Option<PathBuf>,
}

/// Final configuration with defaults applied
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TracelinkConfig {
    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub auth: AccessConfig,

    #[serde(default)]
    pub attribution: AttributionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    /// Host address to bind to
    pub host: String,

    /// Port for the tracelink server
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

/// Default host for the tracelink server
pub const DEFAULT_HOST: &str = "127.0.0.1";
/// Default port for the tracelink server
pub const DEFAULT_PORT: u16 = 7743;
