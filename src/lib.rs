//! Bot Guard - sign-in bot scoring & threshold experiments
//!
//! ```text
//! input events ─► TelemetryCollector ─► SignalSnapshot ─► calculate()
//!                                                             │
//!                          ThresholdStore / ExperimentEngine ─┤
//!                                                             ▼
//!                                   BotGuard::evaluate ─► AttemptLedger
//! ```

pub mod api;
pub mod config;
pub mod constants;
pub mod error;
pub mod logic;

pub use config::GuardConfig;
pub use error::{GuardError, GuardResult, StorageError};
pub use logic::guard::{BotGuard, Evaluation};
