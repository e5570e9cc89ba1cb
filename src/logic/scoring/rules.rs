//! Bot Scoring Rules & Thresholds
//!
//! Constants only - no scoring logic.

// ============================================================================
// CLASSIFICATION (fixed, independent of the Threshold Store)
// ============================================================================

/// At or above this score = Challenge
pub const CHALLENGE_SCORE: u32 = 35;

/// At or above this score = Block
pub const BLOCK_SCORE: u32 = 60;

// ============================================================================
// SAMPLE MINIMUMS
// ============================================================================

pub const MIN_VELOCITY_SAMPLES: usize = 4;
pub const MIN_TYPING_SAMPLES: usize = 4;
pub const MIN_GAP_SAMPLES: usize = 3;

// ============================================================================
// SIGNAL LIMITS
// ============================================================================

pub const MINIMAL_MOVEMENT: u32 = 5;
pub const LOW_MOVEMENT: u32 = 20;

/// Pointer speed spread (px/s) below which movement looks scripted
pub const ROBOTIC_VELOCITY_STD: f64 = 50.0;

pub const FAST_TYPING_MEAN_MS: f64 = 50.0;
pub const ROBOTIC_TYPING_STD_MS: f64 = 10.0;

pub const CONSISTENT_GAP_STD_MS: f64 = 100.0;
pub const FAST_GAP_MEAN_MS: f64 = 500.0;

pub const MIN_HUMAN_FILL_MS: u64 = 3000;

pub const MAX_CONFIDENCE: u32 = 100;

// ============================================================================
// RULE POINTS (score, confidence)
// ============================================================================

pub const MINIMAL_MOVEMENT_POINTS: (u32, u32) = (30, 15);
pub const LOW_MOVEMENT_POINTS: (u32, u32) = (15, 10);
pub const ROBOTIC_MOVEMENT_POINTS: (u32, u32) = (25, 20);
pub const PASTE_POINTS: (u32, u32) = (20, 15);
pub const FAST_TYPING_POINTS: (u32, u32) = (20, 15);
pub const ROBOTIC_TYPING_POINTS: (u32, u32) = (15, 10);
pub const CONSISTENT_TIMING_POINTS: (u32, u32) = (15, 10);
pub const FAST_INTERACTION_POINTS: (u32, u32) = (10, 5);
pub const QUICK_FILL_POINTS: (u32, u32) = (20, 15);
pub const NO_CLICK_POINTS: (u32, u32) = (10, 5);
