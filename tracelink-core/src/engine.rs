//! Attribution pipeline: validate, resolve, score, record

use std::sync::Arc;

use tracing::debug;

use crate::config::AttributionConfig;
use crate::error::{Result, TracelinkError};
use crate::feedback::FeedbackHandler;
use crate::recorder::AttributionRecorder;
use crate::resolver::CandidateResolver;
use crate::scorer::{ConfidenceScorer, elapsed};
use crate::store::RecordStore;
use crate::types::{AttributionId, AttributionResult, ConversionEvent, OwnerId};

/// Processes conversions end to end and applies feedback
///
/// Holds no per-request state, so one engine serves concurrent requests.
pub struct AttributionEngine {
    store: Arc<dyn RecordStore>,
    resolver: CandidateResolver,
    scorer: ConfidenceScorer,
    recorder: AttributionRecorder,
    feedback: FeedbackHandler,
}

impl AttributionEngine {
    /// Build an engine with the default strategy chain
    pub fn new(store: Arc<dyn RecordStore>, config: &AttributionConfig) -> Result<Self> {
        config.validate()?;
        let resolver = CandidateResolver::new(Arc::clone(&store), config);
        Ok(Self::with_resolver(store, resolver, config))
    }

    /// Build an engine around a custom resolver
    pub fn with_resolver(
        store: Arc<dyn RecordStore>,
        resolver: CandidateResolver,
        config: &AttributionConfig,
    ) -> Self {
        Self {
            scorer: ConfidenceScorer::with_config(config.scoring.clone()),
            recorder: AttributionRecorder::new(Arc::clone(&store)),
            feedback: FeedbackHandler::new(Arc::clone(&store)),
            resolver,
            store,
        }
    }

    pub fn store(&self) -> Arc<dyn RecordStore> {
        Arc::clone(&self.store)
    }

    /// Attribute a conversion and persist the result.
    ///
    /// Only validation and persistence failures are returned; lookup
    /// failures produce an unattributed result.
    pub async fn process(&self, conversion: ConversionEvent) -> Result<AttributionResult> {
        if conversion.page_url.trim().is_empty() {
            return Err(TracelinkError::Validation("pageUrl is required".into()));
        }

        let candidate = self.resolver.resolve(&conversion).await;
        let matched = candidate
            .as_ref()
            .map(|c| (c.signal, elapsed(c.click.clicked_at, conversion.created_at)));
        let score = self.scorer.score(matched);
        debug!(
            conversion_id = %conversion.id,
            confidence = score.confidence,
            "Scored conversion"
        );

        self.recorder
            .record(&conversion, candidate.as_ref(), score)
            .await
    }

    /// Apply a confirm/reject verdict owned by `caller`
    pub async fn submit_feedback(
        &self,
        id: AttributionId,
        confirmed: bool,
        caller: &OwnerId,
    ) -> Result<AttributionResult> {
        self.feedback.submit(id, confirmed, caller).await
    }

    /// Read an attribution owned by `caller`
    pub async fn get_attribution(
        &self,
        id: AttributionId,
        caller: &OwnerId,
    ) -> Result<AttributionResult> {
        self.feedback.owned(id, caller).await
    }
}
