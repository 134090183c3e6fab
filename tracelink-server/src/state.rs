//! Shared application state for the tracelink server

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracelink_core::{AttributionConfig, AttributionEngine, MemoryRecordStore, RecordStore};

use crate::error::ServerError;
use crate::middleware::{AccessConfig, AuthLayer};

/// Shared application state accessible by all handlers
#[derive(Clone)]
pub struct AppState {
    /// Attribution pipeline
    pub engine: Arc<AttributionEngine>,
    /// Record store shared with the engine
    pub store: Arc<dyn RecordStore>,
    /// API key authentication
    pub auth: AuthLayer,
    /// When the server started
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Create state over an existing store
    pub fn new(
        store: Arc<dyn RecordStore>,
        attribution: &AttributionConfig,
        access: AccessConfig,
    ) -> Result<Self, ServerError> {
        if !access.is_valid() {
            return Err(ServerError::Internal(
                "auth is enabled but no API keys are configured".to_string(),
            ));
        }
        let engine = AttributionEngine::new(Arc::clone(&store), attribution)
            .map_err(|e| ServerError::Internal(format!("Failed to build engine: {e}")))?;

        Ok(Self {
            engine: Arc::new(engine),
            store,
            auth: AuthLayer::new(access),
            started_at: Utc::now(),
        })
    }

    /// In-memory store, default scoring, auth disabled
    pub fn new_for_testing() -> Self {
        Self::with_access(AccessConfig::default())
    }

    /// In-memory store and default scoring with the given auth config
    pub fn with_access(access: AccessConfig) -> Self {
        let store: Arc<dyn RecordStore> = Arc::new(MemoryRecordStore::new());
        let engine = AttributionEngine::with_resolver(
            Arc::clone(&store),
            tracelink_core::CandidateResolver::new(
                Arc::clone(&store),
                &AttributionConfig::default(),
            ),
            &AttributionConfig::default(),
        );
        Self {
            engine: Arc::new(engine),
            store,
            auth: AuthLayer::new(access),
            started_at: Utc::now(),
        }
    }

    /// Returns how long the server has been running
    pub fn uptime_seconds(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }
}
