//! Human confirm/reject verdicts on recorded attributions
//!
//! Feedback only moves `feedback_status` out of `Unset`; scores and signals
//! are never recomputed. Attributions owned by someone else are reported as
//! not found.

use std::sync::Arc;

use tracing::info;

use crate::error::{Result, TracelinkError};
use crate::store::RecordStore;
use crate::types::{AttributionId, AttributionResult, FeedbackStatus, OwnerId};

/// Applies owner-scoped feedback to attribution results
pub struct FeedbackHandler {
    store: Arc<dyn RecordStore>,
}

impl FeedbackHandler {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Record a verdict and return the updated result.
    ///
    /// Repeating the stored verdict is accepted as-is; the opposite verdict
    /// fails with [`TracelinkError::FeedbackConflict`].
    pub async fn submit(
        &self,
        id: AttributionId,
        confirmed: bool,
        caller: &OwnerId,
    ) -> Result<AttributionResult> {
        let mut result = self.owned(id, caller).await?;
        let verdict = if confirmed {
            FeedbackStatus::Confirmed
        } else {
            FeedbackStatus::Rejected
        };

        if result.feedback_status == verdict {
            return Ok(result);
        }
        if result.feedback_status.is_terminal() {
            return Err(TracelinkError::FeedbackConflict {
                id,
                current: result.feedback_status,
            });
        }

        let moved = self
            .store
            .update_feedback_status(id, FeedbackStatus::Unset, verdict)
            .await?;
        if !moved {
            // Another verdict landed between the read and the write.
            let current = self.owned(id, caller).await?;
            if current.feedback_status == verdict {
                return Ok(current);
            }
            return Err(TracelinkError::FeedbackConflict {
                id,
                current: current.feedback_status,
            });
        }

        info!(attribution_id = %id, status = %verdict, "Recorded attribution feedback");
        result.feedback_status = verdict;
        Ok(result)
    }

    /// Fetch an attribution the caller owns
    pub async fn owned(&self, id: AttributionId, caller: &OwnerId) -> Result<AttributionResult> {
        match self.store.get_attribution(id).await? {
            Some(result) if &result.owner == caller => Ok(result),
            _ => Err(TracelinkError::NotFound(id)),
        }
    }
}
