//! Persists one attribution result per processed conversion
//!
//! Recording is not idempotent: resubmitting the same payload stores a second
//! conversion and a second result.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::error::Result;
use crate::resolver::Candidate;
use crate::scorer::Score;
use crate::store::RecordStore;
use crate::types::{AttributionResult, ConversionEvent, FeedbackStatus};

/// Writes the conversion and its attribution result to the store
pub struct AttributionRecorder {
    store: Arc<dyn RecordStore>,
}

impl AttributionRecorder {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Store the conversion, then its result. Any write failure is returned.
    pub async fn record(
        &self,
        conversion: &ConversionEvent,
        candidate: Option<&Candidate>,
        score: Score,
    ) -> Result<AttributionResult> {
        self.store.insert_conversion(conversion).await?;

        let result = AttributionResult {
            id: Uuid::now_v7(),
            conversion_id: conversion.id,
            owner: conversion.owner.clone(),
            click_id: candidate.map(|c| c.click.id),
            link_id: candidate.map(|c| c.click.link_id.clone()),
            confidence: score.confidence,
            signals: score.signals,
            elapsed_minutes: score.elapsed_minutes,
            feedback_status: FeedbackStatus::Unset,
            created_at: Utc::now(),
        };
        self.store.insert_attribution(&result).await?;

        info!(
            attribution_id = %result.id,
            conversion_id = %conversion.id,
            attributed = result.is_attributed(),
            confidence = result.confidence,
            "Recorded attribution"
        );
        Ok(result)
    }
}
