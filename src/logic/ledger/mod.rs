//! Attempt Ledger - capped, durable log of scoring outcomes
//!
//! Attempts are kept in insertion order under a single storage key and
//! trimmed oldest-first to the capacity. When the backend reports
//! `CapacityExceeded` the ledger keeps only the newest half of its capacity
//! and retries once; if that also fails the new attempt is dropped and the
//! stored log is left as it was.
//!
//! Writes never replace a stored log that fails to parse; queries read such
//! a log as empty.
//!
//! - `types.rs` - `Attempt`, `AttemptStats`, `ThresholdRecommendation`
//! - `export.rs` - JSON / CSV export and import

pub mod types;
pub mod export;
#[cfg(test)]
mod tests;

use std::sync::Arc;

use parking_lot::Mutex;

use crate::constants::{ATTEMPTS_KEY, DEFAULT_LEDGER_CAPACITY, MIN_ATTEMPTS_FOR_RECOMMENDATION};
use crate::error::{GuardError, GuardResult, StorageError};
use crate::logic::scoring::{Recommendation, ScoringOutcome};
use crate::logic::storage::{self, Storage};
use crate::logic::threshold::ThresholdConfig;

pub use types::{AdjustDirection, Attempt, AttemptStats, ThresholdRecommendation};
pub use export::{ExportFormat, LedgerExport};

use types::round1;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Flagged-attempt FP rate (%) above which thresholds should rise
const RAISE_FP_RATE: f64 = 20.0;

/// Flagged-attempt FP rate (%) below which lowering is considered
const LOWER_FP_RATE: f64 = 5.0;

/// An allowed score above this share of the challenge cutoff is a near miss
const NEAR_MISS_FACTOR: f64 = 0.8;

/// Share of all attempts that must be near misses before lowering
const NEAR_MISS_SHARE: f64 = 0.1;

// ============================================================================
// LEDGER
// ============================================================================

pub struct AttemptLedger {
    storage: Arc<dyn Storage>,
    capacity: usize,
    write_lock: Mutex<()>,
}

impl AttemptLedger {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self::with_capacity(storage, DEFAULT_LEDGER_CAPACITY)
    }

    pub fn with_capacity(storage: Arc<dyn Storage>, capacity: usize) -> Self {
        Self {
            storage,
            capacity: capacity.max(1),
            write_lock: Mutex::new(()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append an attempt for `outcome` and return its id
    pub fn record(&self, outcome: &ScoringOutcome) -> GuardResult<String> {
        self.record_attempt(Attempt::from_outcome(outcome))
    }

    /// Append a prepared attempt and return its id
    pub fn record_attempt(&self, attempt: Attempt) -> GuardResult<String> {
        let id = attempt.id.clone();
        let score = attempt.score;

        let _guard = self.write_lock.lock();
        let mut attempts = self.load_for_write()?;
        attempts.push(attempt);
        trim_oldest(&mut attempts, self.capacity);

        match self.persist(&attempts) {
            Ok(()) => {
                log::debug!("Recorded attempt {} (score {})", id, score);
                Ok(id)
            }
            Err(e) if e.is_capacity() => {
                let keep = (self.capacity / 2).max(1);
                log::warn!("Ledger write hit storage capacity ({}). Shrinking to {} attempts.", e, keep);

                trim_oldest(&mut attempts, keep);
                match self.persist(&attempts) {
                    Ok(()) => Ok(id),
                    Err(retry) => {
                        log::error!("Ledger write dropped after shrink: {}", retry);
                        Err(GuardError::Capacity(format!(
                            "attempt {} dropped: {}",
                            id, retry
                        )))
                    }
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    /// All retained attempts, oldest first
    pub fn list(&self) -> Vec<Attempt> {
        self.load_attempts()
    }

    pub fn get(&self, id: &str) -> Option<Attempt> {
        self.load_attempts().into_iter().find(|a| a.id == id)
    }

    /// Set the reviewer flag. `Ok(false)` when the id is unknown.
    pub fn mark_false_positive(&self, id: &str, is_false_positive: bool) -> GuardResult<bool> {
        Ok(self.set_false_positive(id, is_false_positive)?.is_some())
    }

    /// Set the reviewer flag and return the attempt as it was before the
    /// change, or `None` when the id is unknown
    pub fn set_false_positive(&self, id: &str, is_false_positive: bool) -> GuardResult<Option<Attempt>> {
        let _guard = self.write_lock.lock();
        let mut attempts = self.load_for_write()?;

        let Some(attempt) = attempts.iter_mut().find(|a| a.id == id) else {
            log::debug!("mark_false_positive: unknown attempt {}", id);
            return Ok(None);
        };
        let previous = attempt.clone();
        attempt.is_false_positive = is_false_positive;

        self.persist(&attempts)?;
        log::info!("Attempt {} marked false_positive={}", id, is_false_positive);
        Ok(Some(previous))
    }

    pub fn clear(&self) -> GuardResult<()> {
        let _guard = self.write_lock.lock();
        self.storage.remove(ATTEMPTS_KEY)?;
        log::info!("Attempt ledger cleared");
        Ok(())
    }

    /// Replace the whole log (used by import). Trimmed to capacity.
    /// Refuses to overwrite an unreadable log; `clear` discards one.
    pub fn replace_all(&self, mut attempts: Vec<Attempt>) -> GuardResult<()> {
        let _guard = self.write_lock.lock();
        self.load_for_write()?;
        trim_oldest(&mut attempts, self.capacity);
        self.persist(&attempts)?;
        Ok(())
    }

    pub fn stats(&self) -> AttemptStats {
        compute_stats(&self.load_attempts())
    }

    /// Suggest a threshold change from reviewer feedback, if the data
    /// supports one
    pub fn threshold_recommendation(&self, current: &ThresholdConfig) -> Option<ThresholdRecommendation> {
        recommend_thresholds(&self.load_attempts(), current)
    }

    /// Lenient read for queries: an unreadable blob reads as empty
    fn load_attempts(&self) -> Vec<Attempt> {
        self.load_for_write().unwrap_or_else(|e| {
            log::warn!("Attempt ledger unreadable ({}), reading as empty", e);
            Vec::new()
        })
    }

    /// Strict read for writes: never overwrite a blob we could not parse
    fn load_for_write(&self) -> Result<Vec<Attempt>, StorageError> {
        Ok(storage::load::<Vec<Attempt>>(self.storage.as_ref(), ATTEMPTS_KEY)?.unwrap_or_default())
    }

    fn persist(&self, attempts: &[Attempt]) -> Result<(), StorageError> {
        storage::save(self.storage.as_ref(), ATTEMPTS_KEY, &attempts)
    }
}

impl std::fmt::Debug for AttemptLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttemptLedger")
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// ANALYSIS
// ============================================================================

fn trim_oldest(attempts: &mut Vec<Attempt>, keep: usize) {
    if attempts.len() > keep {
        let excess = attempts.len() - keep;
        attempts.drain(0..excess);
    }
}

pub fn compute_stats(attempts: &[Attempt]) -> AttemptStats {
    if attempts.is_empty() {
        return AttemptStats::default();
    }

    let mut stats = AttemptStats::default();
    let mut score_sum = 0u64;
    let mut confidence_sum = 0u64;

    for attempt in attempts {
        score_sum += u64::from(attempt.score);
        confidence_sum += u64::from(attempt.confidence);

        match attempt.recommendation {
            Recommendation::Allow => stats.allowed_count += 1,
            Recommendation::Challenge => stats.challenged_count += 1,
            Recommendation::Block => stats.blocked_count += 1,
        }
        if attempt.is_false_positive {
            stats.false_positive_count += 1;
        }
    }

    let total = attempts.len() as f64;
    stats.total = attempts.len();
    stats.avg_score = round1(score_sum as f64 / total);
    stats.avg_confidence = round1(confidence_sum as f64 / total);
    stats.false_positive_rate = round1(stats.false_positive_count as f64 / total * 100.0);
    stats
}

pub fn recommend_thresholds(
    attempts: &[Attempt],
    current: &ThresholdConfig,
) -> Option<ThresholdRecommendation> {
    if attempts.len() < MIN_ATTEMPTS_FOR_RECOMMENDATION {
        return None;
    }

    let flagged: Vec<&Attempt> = attempts.iter()
        .filter(|a| a.recommendation.is_flagged())
        .collect();
    let flagged_fps = flagged.iter().filter(|a| a.is_false_positive).count();
    let fp_rate = if flagged.is_empty() {
        0.0
    } else {
        flagged_fps as f64 / flagged.len() as f64 * 100.0
    };

    if fp_rate > RAISE_FP_RATE {
        return Some(ThresholdRecommendation {
            direction: AdjustDirection::Raise,
            current: *current,
            suggested: current.raised(),
            flagged_false_positive_rate: round1(fp_rate),
            reason: format!(
                "{:.1}% of challenged or blocked attempts were legitimate users; raise thresholds to reduce friction",
                fp_rate
            ),
        });
    }

    if fp_rate < LOWER_FP_RATE {
        let near_miss_floor = current.challenge * NEAR_MISS_FACTOR;
        let near_misses = attempts.iter()
            .filter(|a| a.recommendation == Recommendation::Allow && f64::from(a.score) > near_miss_floor)
            .count();

        if near_misses as f64 > attempts.len() as f64 * NEAR_MISS_SHARE {
            let share = near_misses as f64 / attempts.len() as f64 * 100.0;
            return Some(ThresholdRecommendation {
                direction: AdjustDirection::Lower,
                current: *current,
                suggested: current.lowered(),
                flagged_false_positive_rate: round1(fp_rate),
                reason: format!(
                    "{} allowed attempts ({:.1}%) scored just under the challenge threshold while only {:.1}% of flagged attempts were false positives; lower thresholds to catch more bots",
                    near_misses, share, fp_rate
                ),
            });
        }
    }

    None
}
