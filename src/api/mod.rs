//! API Module
//!
//! Operator-facing operations over a `BotGuard`, shared by the CLI and by
//! embedding hosts.
//!
//! Usage:
//! - `api::commands::evaluate_attempt(&guard, ...)` - score + record
//! - `api::commands::winner_recommendation(&guard, id)` - experiment analysis

pub mod commands;

pub use commands::*;
