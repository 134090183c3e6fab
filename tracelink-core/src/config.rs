//! Engine and store configuration
//!
//! Both structs deserialize from the `[attribution]` and `[store]` sections of
//! the tracelink config file. Every field has a default so partial sections
//! are valid.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TracelinkError};
use crate::scorer::ScoringConfig;

/// Configuration for candidate resolution and scoring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributionConfig {
    /// Trailing window for the IP fallback strategy (default: 24)
    pub ip_window_hours: u32,
    /// Time budget for each strategy's store queries (default: 2000)
    pub query_timeout_ms: u64,
    /// Strategy weights and recency bonuses
    #[serde(flatten)]
    pub scoring: ScoringConfig,
}

impl Default for AttributionConfig {
    fn default() -> Self {
        Self {
            ip_window_hours: 24,
            query_timeout_ms: 2_000,
            scoring: ScoringConfig::default(),
        }
    }
}

impl AttributionConfig {
    pub fn ip_window(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.ip_window_hours))
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.ip_window_hours == 0 {
            return Err(TracelinkError::Config(
                "ip_window_hours must be greater than zero".into(),
            ));
        }
        if self.query_timeout_ms == 0 {
            return Err(TracelinkError::Config(
                "query_timeout_ms must be greater than zero".into(),
            ));
        }
        self.scoring.validate()
    }
}

/// Which record store backend to open
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Cozo,
    #[serde(other)]
    Unknown,
}

/// Configuration for the record store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// RocksDB directory for the cozo backend; in-memory when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}
