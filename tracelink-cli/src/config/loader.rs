use super::types::{
    DEFAULT_HOST, DEFAULT_PORT, RawServerConfig, RawStoreConfig, RawTracelinkConfig, ServerSection,
    TracelinkConfig,
};
use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use tracelink_core::StoreConfig;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load merged configuration (user + project)
    pub fn load() -> Result<TracelinkConfig> {
        Self::load_layers(
            Self::user_config_path().as_deref(),
            &Self::project_config_path(),
        )
    }

    /// Load from explicit layer paths; missing files are skipped
    pub fn load_layers(user_path: Option<&Path>, project_path: &Path) -> Result<TracelinkConfig> {
        let mut raw = RawTracelinkConfig::default();

        // Layer 1: User config
        if let Some(user_path) = user_path
            && user_path.exists()
        {
            raw = Self::merge_raw(raw, Self::read_raw(user_path)?);
        }

        // Layer 2: Project config
        if project_path.exists() {
            raw = Self::merge_raw(raw, Self::read_raw(project_path)?);
        }

        Ok(Self::finalize(raw))
    }

    /// Get user config path (platform-specific)
    pub fn user_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "tracelink").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Get project config path
    /// Can be overridden with TRACELINK_PROJECT_CONFIG_DIR env var
    pub fn project_config_path() -> PathBuf {
        if let Ok(dir) = std::env::var("TRACELINK_PROJECT_CONFIG_DIR") {
            PathBuf::from(dir).join("config.toml")
        } else {
            PathBuf::from(".tracelink/config.toml")
        }
    }

    fn read_raw(path: &Path) -> Result<RawTracelinkConfig> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("Invalid config in {}", path.display()))
    }

    /// Merge two raw configs (overlay values override base only if explicitly set)
    fn merge_raw(base: RawTracelinkConfig, overlay: RawTracelinkConfig) -> RawTracelinkConfig {
        RawTracelinkConfig {
            server: RawServerConfig {
                host: overlay.server.host.or(base.server.host),
                port: overlay.server.port.or(base.server.port),
            },
            store: RawStoreConfig {
                backend: overlay.store.backend.or(base.store.backend),
                path: overlay.store.path.or(base.store.path),
            },
            auth: overlay.auth.or(base.auth),
            attribution: overlay.attribution.or(base.attribution),
        }
    }

    /// Convert raw config to final config with defaults applied
    fn finalize(raw: RawTracelinkConfig) -> TracelinkConfig {
        TracelinkConfig {
            server: ServerSection {
                host: raw.server.host.unwrap_or_else(|| DEFAULT_HOST.to_string()),
                port: raw.server.port.unwrap_or(DEFAULT_PORT),
            },
            store: StoreConfig {
                backend: raw.store.backend.unwrap_or_default(),
                path: raw.store.path,
            },
            auth: raw.auth.unwrap_or_default(),
            attribution: raw.attribution.unwrap_or_default(),
        }
    }
}
