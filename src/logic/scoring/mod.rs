//! Scoring Module - telemetry -> bot score -> recommendation
//!
//! - `types.rs` - `Recommendation`, `ScoringOutcome`
//! - `rules.rs` - rule constants and points
//! - `calculator.rs` - `calculate`, `recommend`, `classify`

pub mod types;
pub mod rules;
pub mod calculator;

pub use types::{Recommendation, ScoringOutcome};
pub use calculator::{calculate, classify, recommend};
