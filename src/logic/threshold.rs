//! Threshold Configuration & Store
//!
//! The live challenge/block cutoffs consumed by the sign-in decision.
//! Writes are validated up front; a rejected write leaves the stored pair
//! untouched.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_BLOCK_THRESHOLD, DEFAULT_CHALLENGE_THRESHOLD, THRESHOLDS_KEY, THRESHOLD_ADJUST_STEP,
};
use crate::error::{GuardError, GuardResult};
use crate::logic::storage::{self, Storage};

/// Score cutoffs: `score >= block` blocks, `score >= challenge` challenges
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    /// 0 <= challenge < 100
    pub challenge: f64,

    /// 0 <= block <= 100, strictly above `challenge`
    pub block: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            challenge: DEFAULT_CHALLENGE_THRESHOLD,
            block: DEFAULT_BLOCK_THRESHOLD,
        }
    }
}

impl ThresholdConfig {
    pub fn new(challenge: f64, block: f64) -> Self {
        Self { challenge, block }
    }

    pub fn validate(&self) -> GuardResult<()> {
        if !self.challenge.is_finite() || !self.block.is_finite() {
            return Err(GuardError::Validation("thresholds must be finite numbers".to_string()));
        }
        if !(0.0..100.0).contains(&self.challenge) {
            return Err(GuardError::Validation(format!(
                "challenge threshold {} must be within [0, 100)",
                self.challenge
            )));
        }
        if !(0.0..=100.0).contains(&self.block) {
            return Err(GuardError::Validation(format!(
                "block threshold {} must be within [0, 100]",
                self.block
            )));
        }
        if self.challenge >= self.block {
            return Err(GuardError::Validation(format!(
                "challenge threshold {} must be below block threshold {}",
                self.challenge, self.block
            )));
        }
        Ok(())
    }

    /// Both cutoffs moved up one step (fewer users interrupted)
    pub fn raised(&self) -> Self {
        let block = (self.block + THRESHOLD_ADJUST_STEP).min(100.0);
        let challenge = (self.challenge + THRESHOLD_ADJUST_STEP).min(block - 1.0);
        Self { challenge, block }
    }

    /// Both cutoffs moved down one step (more attempts challenged)
    pub fn lowered(&self) -> Self {
        let challenge = (self.challenge - THRESHOLD_ADJUST_STEP).max(0.0);
        let block = (self.block - THRESHOLD_ADJUST_STEP).max(challenge + 1.0);
        Self { challenge, block }
    }
}

/// Persistent holder of the live `ThresholdConfig`
pub struct ThresholdStore {
    storage: Arc<dyn Storage>,
    write_lock: Mutex<()>,
}

impl ThresholdStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            write_lock: Mutex::new(()),
        }
    }

    /// Live config, or the default pair when nothing valid is stored
    pub fn get(&self) -> ThresholdConfig {
        match storage::load::<ThresholdConfig>(self.storage.as_ref(), THRESHOLDS_KEY) {
            Ok(Some(config)) if config.validate().is_ok() => config,
            Ok(Some(config)) => {
                log::warn!("Stored thresholds {:?} are invalid, using defaults", config);
                ThresholdConfig::default()
            }
            Ok(None) => ThresholdConfig::default(),
            Err(e) => {
                log::warn!("Failed to read thresholds: {}. Using defaults.", e);
                ThresholdConfig::default()
            }
        }
    }

    pub fn set(&self, config: ThresholdConfig) -> GuardResult<()> {
        config.validate()?;

        let _guard = self.write_lock.lock();
        storage::save(self.storage.as_ref(), THRESHOLDS_KEY, &config)?;
        log::info!(
            "Thresholds updated: challenge={} block={}",
            config.challenge,
            config.block
        );
        Ok(())
    }

    /// Restore the default pair
    pub fn reset(&self) -> GuardResult<()> {
        self.set(ThresholdConfig::default())
    }
}

impl std::fmt::Debug for ThresholdStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThresholdStore").finish_non_exhaustive()
    }
}
