//! tracelink-core - Conversion attribution engine
//!
//! Given a conversion (a form submission, a signup), the engine looks for
//! the prior click that most likely caused it and records an explainable,
//! bounded confidence score.
//!
//! ```text
//! ConversionEvent ─► CandidateResolver ─► ConfidenceScorer ─► AttributionRecorder
//!                        │ tracker identity                        │
//!                        │ explicit link                           ▼
//!                        │ ip fallback                      AttributionResult
//!                        ▼                                         ▲
//!                    RecordStore ◄──────── FeedbackHandler ────────┘
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod feedback;
pub mod recorder;
pub mod resolver;
pub mod scorer;
pub mod store;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{AttributionConfig, StoreBackend, StoreConfig};
pub use engine::AttributionEngine;
pub use error::{Result, TracelinkError};
pub use feedback::FeedbackHandler;
pub use recorder::AttributionRecorder;
pub use resolver::{
    Candidate, CandidateResolver, ExplicitLinkStrategy, IpFallbackStrategy, MatchStrategy,
    TrackerIdentityStrategy,
};
pub use scorer::{ConfidenceScorer, Score, ScoringConfig, StrategyWeights, TimeBonus};
pub use store::{CozoRecordStore, MemoryRecordStore, RecordStore, open_store};
pub use types::*;
