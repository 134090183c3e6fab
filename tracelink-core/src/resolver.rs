//! Candidate resolution through an ordered chain of matching strategies
//!
//! Strategies run in priority order and the first one to return a click
//! wins; later strategies are never consulted. A strategy whose lookup
//! fails or exceeds the query timeout counts as finding nothing, so store
//! trouble lowers confidence instead of failing the request.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::AttributionConfig;
use crate::error::{Result, TracelinkError};
use crate::store::RecordStore;
use crate::types::{ClickEvent, ConversionEvent, Signal};

/// One way of finding the click that caused a conversion
#[async_trait]
pub trait MatchStrategy: Send + Sync {
    /// Signal recorded when this strategy wins
    fn signal(&self) -> Signal;

    /// Whether the conversion carries the inputs this strategy needs
    fn applies(&self, conversion: &ConversionEvent) -> bool;

    /// Look up the candidate click, if any
    async fn find_candidate(
        &self,
        conversion: &ConversionEvent,
        store: &dyn RecordStore,
    ) -> Result<Option<ClickEvent>>;
}

/// Tracker cookie → most recent page view → most recent click on its link
pub struct TrackerIdentityStrategy;

#[async_trait]
impl MatchStrategy for TrackerIdentityStrategy {
    fn signal(&self) -> Signal {
        Signal::TrackerIdentity
    }

    fn applies(&self, conversion: &ConversionEvent) -> bool {
        conversion.tracker_id.is_some()
    }

    async fn find_candidate(
        &self,
        conversion: &ConversionEvent,
        store: &dyn RecordStore,
    ) -> Result<Option<ClickEvent>> {
        let Some(tracker_id) = &conversion.tracker_id else {
            return Ok(None);
        };
        let view = store
            .latest_page_view_for_tracker(&conversion.owner, tracker_id, conversion.created_at)
            .await?;
        match view.and_then(|v| v.link_id) {
            Some(link_id) => {
                store
                    .latest_click_for_link(&conversion.owner, &link_id, conversion.created_at)
                    .await
            }
            None => Ok(None),
        }
    }
}

/// Most recent click on the link the caller named
pub struct ExplicitLinkStrategy;

#[async_trait]
impl MatchStrategy for ExplicitLinkStrategy {
    fn signal(&self) -> Signal {
        Signal::ExplicitLink
    }

    fn applies(&self, conversion: &ConversionEvent) -> bool {
        conversion.link_id.is_some()
    }

    async fn find_candidate(
        &self,
        conversion: &ConversionEvent,
        store: &dyn RecordStore,
    ) -> Result<Option<ClickEvent>> {
        match &conversion.link_id {
            Some(link_id) => {
                store
                    .latest_click_for_link(&conversion.owner, link_id, conversion.created_at)
                    .await
            }
            None => Ok(None),
        }
    }
}

/// Most recent click from the conversion's origin IP inside a trailing window
pub struct IpFallbackStrategy {
    window: chrono::Duration,
}

impl IpFallbackStrategy {
    pub fn new(window: chrono::Duration) -> Self {
        Self { window }
    }
}

impl Default for IpFallbackStrategy {
    fn default() -> Self {
        Self::new(chrono::Duration::hours(24))
    }
}

#[async_trait]
impl MatchStrategy for IpFallbackStrategy {
    fn signal(&self) -> Signal {
        Signal::IpFallback
    }

    fn applies(&self, conversion: &ConversionEvent) -> bool {
        conversion.ip_address.is_some()
    }

    async fn find_candidate(
        &self,
        conversion: &ConversionEvent,
        store: &dyn RecordStore,
    ) -> Result<Option<ClickEvent>> {
        let Some(ip_address) = conversion.ip_address else {
            return Ok(None);
        };
        let until = conversion.created_at;
        store
            .latest_click_from_ip(&conversion.owner, ip_address, until - self.window, until)
            .await
    }
}

/// The click a strategy matched, tagged with the strategy's signal
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub click: ClickEvent,
    pub signal: Signal,
}

/// Runs matching strategies in order until one finds a candidate
pub struct CandidateResolver {
    store: Arc<dyn RecordStore>,
    strategies: Vec<Box<dyn MatchStrategy>>,
    query_timeout: Duration,
}

impl CandidateResolver {
    /// Resolver with the default chain: tracker identity, explicit link, IP fallback
    pub fn new(store: Arc<dyn RecordStore>, config: &AttributionConfig) -> Self {
        let strategies: Vec<Box<dyn MatchStrategy>> = vec![
            Box::new(TrackerIdentityStrategy),
            Box::new(ExplicitLinkStrategy),
            Box::new(IpFallbackStrategy::new(config.ip_window())),
        ];
        Self::with_strategies(store, strategies, config.query_timeout())
    }

    /// Resolver with a custom strategy chain, evaluated in the given order
    pub fn with_strategies(
        store: Arc<dyn RecordStore>,
        strategies: Vec<Box<dyn MatchStrategy>>,
        query_timeout: Duration,
    ) -> Self {
        Self {
            store,
            strategies,
            query_timeout,
        }
    }

    /// Signals of the configured strategies, in evaluation order
    pub fn chain(&self) -> Vec<Signal> {
        self.strategies.iter().map(|s| s.signal()).collect()
    }

    /// Find at most one candidate click for the conversion
    pub async fn resolve(&self, conversion: &ConversionEvent) -> Option<Candidate> {
        for strategy in &self.strategies {
            let signal = strategy.signal();
            if !strategy.applies(conversion) {
                continue;
            }

            let lookup = strategy.find_candidate(conversion, self.store.as_ref());
            let outcome = tokio::time::timeout(self.query_timeout, lookup)
                .await
                .unwrap_or(Err(TracelinkError::Timeout(self.query_timeout)));
            match outcome {
                Ok(Some(click)) => {
                    debug!(
                        conversion_id = %conversion.id,
                        click_id = %click.id,
                        %signal,
                        "Strategy matched candidate"
                    );
                    return Some(Candidate { click, signal });
                }
                Ok(None) => {
                    debug!(conversion_id = %conversion.id, %signal, "Strategy found no candidate");
                }
                Err(e) => {
                    warn!(
                        conversion_id = %conversion.id,
                        %signal,
                        error = %e,
                        "Strategy lookup failed, treating as no candidate"
                    );
                }
            }
        }
        None
    }
}
