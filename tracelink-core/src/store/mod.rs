//! Record store interface and backends
//!
//! The store is shared by every request. Reads are point lookups or
//! "most recent before" queries; writes are append-only except for the
//! feedback status of an attribution result.

mod cozo;
mod memory;

use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::config::{StoreBackend, StoreConfig};
use crate::error::{Result, TracelinkError};
use crate::types::{
    AttributionId, AttributionResult, ClickEvent, ClickId, ConversionEvent, ConversionId,
    FeedbackStatus, LinkId, OwnerId, PageView, TrackerId,
};

pub use cozo::{CozoRecordStore, RECORD_SCHEMA};
pub use memory::MemoryRecordStore;

/// Storage interface for attribution records
#[async_trait]
pub trait RecordStore: Send + Sync {
    // Appends
    async fn insert_click(&self, click: &ClickEvent) -> Result<()>;
    async fn insert_page_view(&self, view: &PageView) -> Result<()>;
    async fn insert_conversion(&self, conversion: &ConversionEvent) -> Result<()>;
    async fn insert_attribution(&self, result: &AttributionResult) -> Result<()>;

    // Point lookups
    async fn get_click(&self, id: ClickId) -> Result<Option<ClickEvent>>;
    async fn get_conversion(&self, id: ConversionId) -> Result<Option<ConversionEvent>>;
    async fn get_attribution(&self, id: AttributionId) -> Result<Option<AttributionResult>>;

    // Most-recent lookups within one owner's records, bounded above by `until`
    async fn latest_page_view_for_tracker(
        &self,
        owner: &OwnerId,
        tracker_id: &TrackerId,
        until: DateTime<Utc>,
    ) -> Result<Option<PageView>>;
    async fn latest_click_for_link(
        &self,
        owner: &OwnerId,
        link_id: &LinkId,
        until: DateTime<Utc>,
    ) -> Result<Option<ClickEvent>>;
    async fn latest_click_from_ip(
        &self,
        owner: &OwnerId,
        ip_address: IpAddr,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Option<ClickEvent>>;

    /// Move the feedback status from `expected` to `status`.
    ///
    /// Returns `false` without writing when the stored status is not
    /// `expected` or the attribution does not exist.
    async fn update_feedback_status(
        &self,
        id: AttributionId,
        expected: FeedbackStatus,
        status: FeedbackStatus,
    ) -> Result<bool>;
}

/// Run blocking storage work on tokio's blocking pool
///
/// Keeps the calling future pending on a join handle, so a surrounding
/// `tokio::time::timeout` can fire while the work is still running.
pub(crate) async fn offload<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| TracelinkError::Database(format!("Storage task failed: {e}")))?
}

/// Open the backend named by the configuration
pub fn open_store(config: &StoreConfig) -> Result<Arc<dyn RecordStore>> {
    match config.backend {
        StoreBackend::Memory => Ok(Arc::new(MemoryRecordStore::new())),
        StoreBackend::Cozo => {
            let store = match &config.path {
                Some(path) => CozoRecordStore::open_rocksdb(path)?,
                None => CozoRecordStore::open_in_memory()?,
            };
            Ok(Arc::new(store))
        }
        StoreBackend::Unknown => Err(TracelinkError::Config(
            "unknown store backend, use \"memory\" or \"cozo\"".into(),
        )),
    }
}
