//! Logic Module - Scoring, Bookkeeping & Experiments
//!
//! - `telemetry/` - input event capture into a signal snapshot
//! - `scoring/` - rule table turning a snapshot into a bot score
//! - `ledger/` - persisted attempt history, stats, export
//! - `threshold` - live challenge/block cutoffs
//! - `experiment/` - A/B trials of threshold pairs
//! - `guard` - pipeline tying the above together

// Infrastructure
pub mod clock;
pub mod storage;

// Engines
pub mod telemetry;
pub mod scoring;
pub mod threshold;
pub mod ledger;
pub mod experiment;
pub mod guard;
