//! Confidence scoring for matched candidates
//!
//! A match scores its strategy's base weight plus a recency bonus taken from
//! the first band whose `max_minutes` covers the elapsed time. Bands compare
//! against the exact elapsed duration; the reported minutes are floored. The
//! sum is capped at 1.0 and rounded to four decimal places so equal inputs
//! always give bit-identical scores.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TracelinkError};
use crate::types::Signal;

/// Base weight added once for the winning strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyWeights {
    pub tracker_identity: f64,
    pub explicit_link: f64,
    pub ip_fallback: f64,
}

impl Default for StrategyWeights {
    fn default() -> Self {
        Self {
            tracker_identity: 0.40,
            explicit_link: 0.35,
            ip_fallback: 0.25,
        }
    }
}

impl StrategyWeights {
    pub fn weight(&self, signal: Signal) -> f64 {
        match signal {
            Signal::TrackerIdentity => self.tracker_identity,
            Signal::ExplicitLink => self.explicit_link,
            Signal::IpFallback => self.ip_fallback,
        }
    }
}

/// Bonus granted when the click happened at most `max_minutes` before the conversion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeBonus {
    pub max_minutes: i64,
    pub bonus: f64,
}

/// Configuration for confidence scoring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub weights: StrategyWeights,
    pub time_bonus: Vec<TimeBonus>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: StrategyWeights::default(),
            time_bonus: vec![
                TimeBonus {
                    max_minutes: 30,
                    bonus: 0.20,
                },
                TimeBonus {
                    max_minutes: 120,
                    bonus: 0.10,
                },
            ],
        }
    }
}

impl ScoringConfig {
    pub fn validate(&self) -> Result<()> {
        let weights = [
            ("tracker_identity", self.weights.tracker_identity),
            ("explicit_link", self.weights.explicit_link),
            ("ip_fallback", self.weights.ip_fallback),
        ];
        for (name, weight) in weights {
            if !(0.0..=1.0).contains(&weight) {
                return Err(TracelinkError::Config(format!(
                    "weight {name} must be within [0, 1], got {weight}"
                )));
            }
        }
        for band in &self.time_bonus {
            if band.max_minutes < 0 {
                return Err(TracelinkError::Config(format!(
                    "time bonus max_minutes must not be negative, got {}",
                    band.max_minutes
                )));
            }
            if !(0.0..=1.0).contains(&band.bonus) {
                return Err(TracelinkError::Config(format!(
                    "time bonus must be within [0, 1], got {}",
                    band.bonus
                )));
            }
        }
        Ok(())
    }
}

/// Scored outcome with the signals that explain it
#[derive(Debug, Clone, PartialEq)]
pub struct Score {
    pub confidence: f64,
    pub signals: BTreeSet<Signal>,
    pub elapsed_minutes: Option<i64>,
}

impl Score {
    /// Score for a conversion with no candidate click
    pub fn unattributed() -> Self {
        Self {
            confidence: 0.0,
            signals: BTreeSet::new(),
            elapsed_minutes: None,
        }
    }
}

/// Time from click to conversion, never negative
pub fn elapsed(clicked_at: DateTime<Utc>, converted_at: DateTime<Utc>) -> Duration {
    (converted_at - clicked_at).max(Duration::zero())
}

/// Pure scorer turning a winning strategy and elapsed time into a confidence
#[derive(Debug, Clone)]
pub struct ConfidenceScorer {
    weights: StrategyWeights,
    bands: Vec<TimeBonus>,
}

impl ConfidenceScorer {
    pub fn new() -> Self {
        Self::with_config(ScoringConfig::default())
    }

    pub fn with_config(config: ScoringConfig) -> Self {
        let mut bands = config.time_bonus;
        bands.sort_by_key(|band| band.max_minutes);
        Self {
            weights: config.weights,
            bands,
        }
    }

    /// Recency bonus for the given elapsed time
    pub fn time_bonus(&self, elapsed: Duration) -> f64 {
        self.bands
            .iter()
            .find(|band| Duration::try_minutes(band.max_minutes).is_none_or(|max| elapsed <= max))
            .map_or(0.0, |band| band.bonus)
    }

    /// Score a match, or `None` for no candidate
    pub fn score(&self, matched: Option<(Signal, Duration)>) -> Score {
        let Some((signal, elapsed)) = matched else {
            return Score::unattributed();
        };

        let raw = self.weights.weight(signal) + self.time_bonus(elapsed);
        Score {
            confidence: round_confidence(raw),
            signals: BTreeSet::from([signal]),
            elapsed_minutes: Some(elapsed.num_minutes()),
        }
    }
}

impl Default for ConfidenceScorer {
    fn default() -> Self {
        Self::new()
    }
}

fn round_confidence(raw: f64) -> f64 {
    ((raw * 10_000.0).round() / 10_000.0).clamp(0.0, 1.0)
}
