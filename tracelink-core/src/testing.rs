//! Store doubles for exercising degraded lookups

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{Result, TracelinkError};
use crate::store::{MemoryRecordStore, RecordStore, offload};
use crate::types::{
    AttributionId, AttributionResult, ClickEvent, ClickId, ConversionEvent, ConversionId,
    FeedbackStatus, LinkId, OwnerId, PageView, TrackerId,
};

/// Lookups fail; writes succeed and land in an inner memory store
pub struct FailingStore {
    pub inner: MemoryRecordStore,
}

impl FailingStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryRecordStore::new(),
        }
    }

    fn unavailable<T>() -> Result<T> {
        Err(TracelinkError::Database("store unavailable".into()))
    }
}

#[async_trait]
impl RecordStore for FailingStore {
    async fn insert_click(&self, click: &ClickEvent) -> Result<()> {
        self.inner.insert_click(click).await
    }

    async fn insert_page_view(&self, view: &PageView) -> Result<()> {
        self.inner.insert_page_view(view).await
    }

    async fn insert_conversion(&self, conversion: &ConversionEvent) -> Result<()> {
        self.inner.insert_conversion(conversion).await
    }

    async fn insert_attribution(&self, result: &AttributionResult) -> Result<()> {
        self.inner.insert_attribution(result).await
    }

    async fn get_click(&self, id: ClickId) -> Result<Option<ClickEvent>> {
        self.inner.get_click(id).await
    }

    async fn get_conversion(&self, id: ConversionId) -> Result<Option<ConversionEvent>> {
        self.inner.get_conversion(id).await
    }

    async fn get_attribution(&self, id: AttributionId) -> Result<Option<AttributionResult>> {
        self.inner.get_attribution(id).await
    }

    async fn latest_page_view_for_tracker(
        &self,
        _owner: &OwnerId,
        _tracker_id: &TrackerId,
        _until: DateTime<Utc>,
    ) -> Result<Option<PageView>> {
        Self::unavailable()
    }

    async fn latest_click_for_link(
        &self,
        _owner: &OwnerId,
        _link_id: &LinkId,
        _until: DateTime<Utc>,
    ) -> Result<Option<ClickEvent>> {
        Self::unavailable()
    }

    async fn latest_click_from_ip(
        &self,
        _owner: &OwnerId,
        _ip_address: IpAddr,
        _since: DateTime<Utc>,
        _until: DateTime<Utc>,
    ) -> Result<Option<ClickEvent>> {
        Self::unavailable()
    }

    async fn update_feedback_status(
        &self,
        id: AttributionId,
        expected: FeedbackStatus,
        status: FeedbackStatus,
    ) -> Result<bool> {
        self.inner.update_feedback_status(id, expected, status).await
    }
}

/// Page view lookups stall for `delay`; everything else passes through
pub struct SlowStore {
    inner: Arc<MemoryRecordStore>,
    delay: Duration,
}

impl SlowStore {
    pub fn new(inner: Arc<MemoryRecordStore>, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

#[async_trait]
impl RecordStore for SlowStore {
    async fn insert_click(&self, click: &ClickEvent) -> Result<()> {
        self.inner.insert_click(click).await
    }

    async fn insert_page_view(&self, view: &PageView) -> Result<()> {
        self.inner.insert_page_view(view).await
    }

    async fn insert_conversion(&self, conversion: &ConversionEvent) -> Result<()> {
        self.inner.insert_conversion(conversion).await
    }

    async fn insert_attribution(&self, result: &AttributionResult) -> Result<()> {
        self.inner.insert_attribution(result).await
    }

    async fn get_click(&self, id: ClickId) -> Result<Option<ClickEvent>> {
        self.inner.get_click(id).await
    }

    async fn get_conversion(&self, id: ConversionId) -> Result<Option<ConversionEvent>> {
        self.inner.get_conversion(id).await
    }

    async fn get_attribution(&self, id: AttributionId) -> Result<Option<AttributionResult>> {
        self.inner.get_attribution(id).await
    }

    async fn latest_page_view_for_tracker(
        &self,
        owner: &OwnerId,
        tracker_id: &TrackerId,
        until: DateTime<Utc>,
    ) -> Result<Option<PageView>> {
        tokio::time::sleep(self.delay).await;
        self.inner
            .latest_page_view_for_tracker(owner, tracker_id, until)
            .await
    }

    async fn latest_click_for_link(
        &self,
        owner: &OwnerId,
        link_id: &LinkId,
        until: DateTime<Utc>,
    ) -> Result<Option<ClickEvent>> {
        self.inner.latest_click_for_link(owner, link_id, until).await
    }

    async fn latest_click_from_ip(
        &self,
        owner: &OwnerId,
        ip_address: IpAddr,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Option<ClickEvent>> {
        self.inner
            .latest_click_from_ip(owner, ip_address, since, until)
            .await
    }

    async fn update_feedback_status(
        &self,
        id: AttributionId,
        expected: FeedbackStatus,
        status: FeedbackStatus,
    ) -> Result<bool> {
        self.inner.update_feedback_status(id, expected, status).await
    }
}

/// Page view lookups hold a blocking-pool thread for `delay`, the way a
/// slow embedded database call does; everything else passes through
pub struct BlockingStore {
    inner: Arc<MemoryRecordStore>,
    delay: Duration,
}

impl BlockingStore {
    pub fn new(inner: Arc<MemoryRecordStore>, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

#[async_trait]
impl RecordStore for BlockingStore {
    async fn insert_click(&self, click: &ClickEvent) -> Result<()> {
        self.inner.insert_click(click).await
    }

    async fn insert_page_view(&self, view: &PageView) -> Result<()> {
        self.inner.insert_page_view(view).await
    }

    async fn insert_conversion(&self, conversion: &ConversionEvent) -> Result<()> {
        self.inner.insert_conversion(conversion).await
    }

    async fn insert_attribution(&self, result: &AttributionResult) -> Result<()> {
        self.inner.insert_attribution(result).await
    }

    async fn get_click(&self, id: ClickId) -> Result<Option<ClickEvent>> {
        self.inner.get_click(id).await
    }

    async fn get_conversion(&self, id: ConversionId) -> Result<Option<ConversionEvent>> {
        self.inner.get_conversion(id).await
    }

    async fn get_attribution(&self, id: AttributionId) -> Result<Option<AttributionResult>> {
        self.inner.get_attribution(id).await
    }

    async fn latest_page_view_for_tracker(
        &self,
        owner: &OwnerId,
        tracker_id: &TrackerId,
        until: DateTime<Utc>,
    ) -> Result<Option<PageView>> {
        let delay = self.delay;
        offload(move || {
            std::thread::sleep(delay);
            Ok(())
        })
        .await?;
        self.inner
            .latest_page_view_for_tracker(owner, tracker_id, until)
            .await
    }

    async fn latest_click_for_link(
        &self,
        owner: &OwnerId,
        link_id: &LinkId,
        until: DateTime<Utc>,
    ) -> Result<Option<ClickEvent>> {
        self.inner.latest_click_for_link(owner, link_id, until).await
    }

    async fn latest_click_from_ip(
        &self,
        owner: &OwnerId,
        ip_address: IpAddr,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Option<ClickEvent>> {
        self.inner
            .latest_click_from_ip(owner, ip_address, since, until)
            .await
    }

    async fn update_feedback_status(
        &self,
        id: AttributionId,
        expected: FeedbackStatus,
        status: FeedbackStatus,
    ) -> Result<bool> {
        self.inner.update_feedback_status(id, expected, status).await
    }
}

/// Every write fails; used to check that recorder failures surface
pub struct ReadOnlyStore;

#[async_trait]
impl RecordStore for ReadOnlyStore {
    async fn insert_click(&self, _click: &ClickEvent) -> Result<()> {
        Err(TracelinkError::Database("read-only".into()))
    }

    async fn insert_page_view(&self, _view: &PageView) -> Result<()> {
        Err(TracelinkError::Database("read-only".into()))
    }

    async fn insert_conversion(&self, _conversion: &ConversionEvent) -> Result<()> {
        Err(TracelinkError::Database("read-only".into()))
    }

    async fn insert_attribution(&self, _result: &AttributionResult) -> Result<()> {
        Err(TracelinkError::Database("read-only".into()))
    }

    async fn get_click(&self, _id: ClickId) -> Result<Option<ClickEvent>> {
        Ok(None)
    }

    async fn get_conversion(&self, _id: ConversionId) -> Result<Option<ConversionEvent>> {
        Ok(None)
    }

    async fn get_attribution(&self, _id: AttributionId) -> Result<Option<AttributionResult>> {
        Ok(None)
    }

    async fn latest_page_view_for_tracker(
        &self,
        _owner: &OwnerId,
        _tracker_id: &TrackerId,
        _until: DateTime<Utc>,
    ) -> Result<Option<PageView>> {
        Ok(None)
    }

    async fn latest_click_for_link(
        &self,
        _owner: &OwnerId,
        _link_id: &LinkId,
        _until: DateTime<Utc>,
    ) -> Result<Option<ClickEvent>> {
        Ok(None)
    }

    async fn latest_click_from_ip(
        &self,
        _owner: &OwnerId,
        _ip_address: IpAddr,
        _since: DateTime<Utc>,
        _until: DateTime<Utc>,
    ) -> Result<Option<ClickEvent>> {
        Ok(None)
    }

    async fn update_feedback_status(
        &self,
        _id: AttributionId,
        _expected: FeedbackStatus,
        _status: FeedbackStatus,
    ) -> Result<bool> {
        Err(TracelinkError::Database("read-only".into()))
    }
}
