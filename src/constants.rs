//! Central Configuration Constants
//!
//! Single source of truth for all configuration defaults.

/// App version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// App name
pub const APP_NAME: &str = "Bot Guard";

/// Directory under the local data dir used by `FileStorage`
pub const DATA_DIR_NAME: &str = "bot-guard";

// ============================================================================
// STORAGE KEYS
// ============================================================================

pub const THRESHOLDS_KEY: &str = "bot_detection_thresholds";
pub const ATTEMPTS_KEY: &str = "bot_detection_attempts";
pub const EXPERIMENTS_KEY: &str = "threshold_experiments";

// ============================================================================
// LEDGER
// ============================================================================

/// Maximum attempts retained by the ledger
pub const DEFAULT_LEDGER_CAPACITY: usize = 1000;

/// Attempts needed before the ledger suggests a threshold change
pub const MIN_ATTEMPTS_FOR_RECOMMENDATION: usize = 20;

// ============================================================================
// THRESHOLDS
// ============================================================================

/// Default challenge cutoff (score >= challenge -> challenge)
pub const DEFAULT_CHALLENGE_THRESHOLD: f64 = 35.0;

/// Default block cutoff (score >= block -> block)
pub const DEFAULT_BLOCK_THRESHOLD: f64 = 60.0;

/// Step used when the ledger suggests raising or lowering thresholds
pub const THRESHOLD_ADJUST_STEP: f64 = 5.0;

// ============================================================================
// EXPERIMENTS
// ============================================================================

/// Significance level for the chi-squared test
pub const SIGNIFICANCE_LEVEL: f64 = 0.05;

/// Upper bound on reported winner confidence (%)
pub const MAX_WINNER_CONFIDENCE: f64 = 95.0;

/// Variant must keep at least this share of control's block rate to win
pub const BLOCK_RATE_GUARD: f64 = 0.8;

// ============================================================================
// ENV HELPERS
// ============================================================================

/// Get data directory from environment or the platform default
pub fn get_data_dir() -> std::path::PathBuf {
    std::env::var("BOTGUARD_DATA_DIR")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::data_local_dir()
                .unwrap_or_else(|| std::path::PathBuf::from("."))
                .join(DATA_DIR_NAME)
        })
}
