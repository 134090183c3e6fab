//! In-memory record store

use std::collections::HashMap;
use std::net::IpAddr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::RecordStore;
use crate::error::Result;
use crate::types::{
    AttributionId, AttributionResult, ClickEvent, ClickId, ConversionEvent, ConversionId,
    FeedbackStatus, LinkId, OwnerId, PageView, TrackerId,
};

#[derive(Debug, Default)]
struct Tables {
    clicks: Vec<ClickEvent>,
    page_views: Vec<PageView>,
    conversions: HashMap<ConversionId, ConversionEvent>,
    attributions: HashMap<AttributionId, AttributionResult>,
}

/// Record store backed by process memory
///
/// Ties on timestamp resolve to the record inserted last.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    tables: RwLock<Tables>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored attribution results
    pub async fn attribution_count(&self) -> usize {
        self.tables.read().await.attributions.len()
    }

    /// Number of stored conversions
    pub async fn conversion_count(&self) -> usize {
        self.tables.read().await.conversions.len()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn insert_click(&self, click: &ClickEvent) -> Result<()> {
        self.tables.write().await.clicks.push(click.clone());
        Ok(())
    }

    async fn insert_page_view(&self, view: &PageView) -> Result<()> {
        self.tables.write().await.page_views.push(view.clone());
        Ok(())
    }

    async fn insert_conversion(&self, conversion: &ConversionEvent) -> Result<()> {
        self.tables
            .write()
            .await
            .conversions
            .insert(conversion.id, conversion.clone());
        Ok(())
    }

    async fn insert_attribution(&self, result: &AttributionResult) -> Result<()> {
        self.tables
            .write()
            .await
            .attributions
            .insert(result.id, result.clone());
        Ok(())
    }

    async fn get_click(&self, id: ClickId) -> Result<Option<ClickEvent>> {
        let tables = self.tables.read().await;
        Ok(tables.clicks.iter().find(|c| c.id == id).cloned())
    }

    async fn get_conversion(&self, id: ConversionId) -> Result<Option<ConversionEvent>> {
        Ok(self.tables.read().await.conversions.get(&id).cloned())
    }

    async fn get_attribution(&self, id: AttributionId) -> Result<Option<AttributionResult>> {
        Ok(self.tables.read().await.attributions.get(&id).cloned())
    }

    async fn latest_page_view_for_tracker(
        &self,
        owner: &OwnerId,
        tracker_id: &TrackerId,
        until: DateTime<Utc>,
    ) -> Result<Option<PageView>> {
        let tables = self.tables.read().await;
        Ok(tables
            .page_views
            .iter()
            .filter(|v| &v.owner == owner && &v.tracker_id == tracker_id && v.viewed_at <= until)
            .max_by_key(|v| v.viewed_at)
            .cloned())
    }

    async fn latest_click_for_link(
        &self,
        owner: &OwnerId,
        link_id: &LinkId,
        until: DateTime<Utc>,
    ) -> Result<Option<ClickEvent>> {
        let tables = self.tables.read().await;
        Ok(tables
            .clicks
            .iter()
            .filter(|c| &c.owner == owner && &c.link_id == link_id && c.clicked_at <= until)
            .max_by_key(|c| c.clicked_at)
            .cloned())
    }

    async fn latest_click_from_ip(
        &self,
        owner: &OwnerId,
        ip_address: IpAddr,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Option<ClickEvent>> {
        let tables = self.tables.read().await;
        Ok(tables
            .clicks
            .iter()
            .filter(|c| {
                &c.owner == owner
                    && c.ip_address == ip_address
                    && c.clicked_at >= since
                    && c.clicked_at <= until
            })
            .max_by_key(|c| c.clicked_at)
            .cloned())
    }

    async fn update_feedback_status(
        &self,
        id: AttributionId,
        expected: FeedbackStatus,
        status: FeedbackStatus,
    ) -> Result<bool> {
        let mut tables = self.tables.write().await;
        match tables.attributions.get_mut(&id) {
            Some(result) if result.feedback_status == expected => {
                result.feedback_status = status;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::collections::BTreeSet;
    use std::net::Ipv4Addr;
    use uuid::Uuid;

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(203, 0, 113, last))
    }

    fn acct() -> OwnerId {
        OwnerId::new("acct")
    }

    #[tokio::test]
    async fn test_latest_click_for_link_picks_most_recent() {
        let store = MemoryRecordStore::new();
        let now = Utc::now();
        let older = ClickEvent::new("acct", "lnk", ip(1)).at(now - Duration::minutes(30));
        let newer = ClickEvent::new("acct", "lnk", ip(2)).at(now - Duration::minutes(5));
        let other = ClickEvent::new("acct", "other", ip(3)).at(now - Duration::minutes(1));
        for click in [&older, &newer, &other] {
            store.insert_click(click).await.unwrap();
        }

        let found = store
            .latest_click_for_link(&acct(), &LinkId::new("lnk"), now)
            .await
            .unwrap();
        assert_eq!(found.unwrap().id, newer.id);
    }

    #[tokio::test]
    async fn test_latest_click_ignores_clicks_after_cutoff() {
        let store = MemoryRecordStore::new();
        let now = Utc::now();
        let before = ClickEvent::new("acct", "lnk", ip(1)).at(now - Duration::minutes(10));
        let after = ClickEvent::new("acct", "lnk", ip(1)).at(now + Duration::minutes(10));
        store.insert_click(&before).await.unwrap();
        store.insert_click(&after).await.unwrap();

        let found = store
            .latest_click_for_link(&acct(), &LinkId::new("lnk"), now)
            .await
            .unwrap();
        assert_eq!(found.unwrap().id, before.id);
    }

    #[tokio::test]
    async fn test_latest_click_from_ip_respects_window() {
        let store = MemoryRecordStore::new();
        let now = Utc::now();
        let stale = ClickEvent::new("acct", "lnk", ip(9)).at(now - Duration::hours(30));
        store.insert_click(&stale).await.unwrap();

        let found = store
            .latest_click_from_ip(&acct(), ip(9), now - Duration::hours(24), now)
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_latest_page_view_for_tracker() {
        let store = MemoryRecordStore::new();
        let now = Utc::now();
        let first = PageView::new("acct", "trk", Some(LinkId::new("a"))).at(now - Duration::hours(2));
        let second = PageView::new("acct", "trk", Some(LinkId::new("b"))).at(now - Duration::hours(1));
        store.insert_page_view(&first).await.unwrap();
        store.insert_page_view(&second).await.unwrap();

        let found = store
            .latest_page_view_for_tracker(&acct(), &TrackerId::new("trk"), now)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.link_id, Some(LinkId::new("b")));
    }

    #[tokio::test]
    async fn test_lookups_never_cross_owners() {
        let store = MemoryRecordStore::new();
        let now = Utc::now();
        let foreign = ClickEvent::new("other-acct", "lnk", ip(4)).at(now - Duration::minutes(2));
        store.insert_click(&foreign).await.unwrap();
        store
            .insert_page_view(&PageView::new("other-acct", "trk", Some(LinkId::new("lnk"))).at(now))
            .await
            .unwrap();

        let by_link = store
            .latest_click_for_link(&acct(), &LinkId::new("lnk"), now)
            .await
            .unwrap();
        let by_ip = store
            .latest_click_from_ip(&acct(), ip(4), now - Duration::hours(24), now)
            .await
            .unwrap();
        let view = store
            .latest_page_view_for_tracker(&acct(), &TrackerId::new("trk"), now)
            .await
            .unwrap();
        assert!(by_link.is_none());
        assert!(by_ip.is_none());
        assert!(view.is_none());

        let own = store
            .latest_click_from_ip(&OwnerId::new("other-acct"), ip(4), now - Duration::hours(24), now)
            .await
            .unwrap();
        assert_eq!(own.unwrap().id, foreign.id);
    }

    #[tokio::test]
    async fn test_update_feedback_status_is_compare_and_set() {
        let store = MemoryRecordStore::new();
        let result = AttributionResult {
            id: Uuid::now_v7(),
            conversion_id: Uuid::now_v7(),
            owner: OwnerId::local(),
            click_id: None,
            link_id: None,
            confidence: 0.0,
            signals: BTreeSet::new(),
            elapsed_minutes: None,
            feedback_status: FeedbackStatus::Unset,
            created_at: Utc::now(),
        };
        store.insert_attribution(&result).await.unwrap();

        let moved = store
            .update_feedback_status(result.id, FeedbackStatus::Unset, FeedbackStatus::Rejected)
            .await
            .unwrap();
        assert!(moved);

        let moved_again = store
            .update_feedback_status(result.id, FeedbackStatus::Unset, FeedbackStatus::Confirmed)
            .await
            .unwrap();
        assert!(!moved_again);

        let stored = store.get_attribution(result.id).await.unwrap().unwrap();
        assert_eq!(stored.feedback_status, FeedbackStatus::Rejected);
    }
}
