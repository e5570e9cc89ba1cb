//! Score Calculator
//!
//! Pure, deterministic scoring of a signal snapshot. Each rule adds its own
//! score and confidence points and a trigger; any number may fire.

use super::rules::*;
use super::types::{Recommendation, ScoringOutcome};
use crate::logic::telemetry::SignalSnapshot;
use crate::logic::threshold::ThresholdConfig;

/// Score a snapshot. Never fails; a snapshot with no activity scores 0.
pub fn calculate(snapshot: &SignalSnapshot) -> ScoringOutcome {
    if snapshot.has_no_activity() {
        return ScoringOutcome::empty();
    }

    let mut tally = Tally::default();

    // Pointer
    if snapshot.movement_count < MINIMAL_MOVEMENT {
        tally.fire(MINIMAL_MOVEMENT_POINTS, "Minimal mouse movement".to_string());
    } else if snapshot.movement_count < LOW_MOVEMENT {
        tally.fire(LOW_MOVEMENT_POINTS, "Low mouse activity".to_string());
    }

    if snapshot.velocities.len() >= MIN_VELOCITY_SAMPLES
        && snapshot.velocities.std_dev() < ROBOTIC_VELOCITY_STD
    {
        tally.fire(ROBOTIC_MOVEMENT_POINTS, "Robotic mouse movements".to_string());
    }

    // Clipboard
    if snapshot.paste_count > 0 {
        tally.fire(PASTE_POINTS, format!("{} paste event(s) detected", snapshot.paste_count));
    }

    // Keyboard
    if snapshot.typing_intervals.len() >= MIN_TYPING_SAMPLES {
        if snapshot.typing_intervals.mean() < FAST_TYPING_MEAN_MS {
            tally.fire(FAST_TYPING_POINTS, "Extremely fast typing".to_string());
        }
        if snapshot.typing_intervals.std_dev() < ROBOTIC_TYPING_STD_MS {
            tally.fire(ROBOTIC_TYPING_POINTS, "Robotic typing pattern".to_string());
        }
    }

    // Interaction rhythm
    if snapshot.interaction_gaps.len() >= MIN_GAP_SAMPLES {
        if snapshot.interaction_gaps.std_dev() < CONSISTENT_GAP_STD_MS {
            tally.fire(CONSISTENT_TIMING_POINTS, "Suspiciously consistent timing".to_string());
        }
        if snapshot.interaction_gaps.mean() < FAST_GAP_MEAN_MS {
            tally.fire(FAST_INTERACTION_POINTS, "Unnaturally fast interactions".to_string());
        }
    }

    if snapshot.elapsed_ms < MIN_HUMAN_FILL_MS {
        tally.fire(QUICK_FILL_POINTS, "Form filled too quickly".to_string());
    }

    if snapshot.click_count == 0 && snapshot.keystroke_count > 0 {
        tally.fire(NO_CLICK_POINTS, "No mouse clicks detected".to_string());
    }

    let confidence = tally.confidence.min(MAX_CONFIDENCE);
    ScoringOutcome {
        score: tally.score,
        confidence,
        recommendation: recommend(tally.score),
        triggers: tally.triggers,
    }
}

/// Fixed-cutoff classification used for `ScoringOutcome::recommendation`
pub fn recommend(score: u32) -> Recommendation {
    if score >= BLOCK_SCORE {
        Recommendation::Block
    } else if score >= CHALLENGE_SCORE {
        Recommendation::Challenge
    } else {
        Recommendation::Allow
    }
}

/// Classification against a configurable threshold pair
pub fn classify(score: u32, thresholds: &ThresholdConfig) -> Recommendation {
    let score = f64::from(score);
    if score >= thresholds.block {
        Recommendation::Block
    } else if score >= thresholds.challenge {
        Recommendation::Challenge
    } else {
        Recommendation::Allow
    }
}

#[derive(Default)]
struct Tally {
    score: u32,
    confidence: u32,
    triggers: Vec<String>,
}

impl Tally {
    fn fire(&mut self, (score, confidence): (u32, u32), trigger: String) {
        self.score += score;
        self.confidence += confidence;
        self.triggers.push(trigger);
    }
}
