//! Guard Pipeline - score → ledger → experiment
//!
//! Owns the three persistent services over one shared `Storage`. The
//! calculator's own recommendation uses the fixed 35/60 cutoffs; the
//! decision handed back to the caller is re-classified against the
//! thresholds that actually apply to the session (experiment arm or live).
//! The ledger stores that decision, so its stats and threshold suggestions
//! describe what users actually saw.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::GuardConfig;
use crate::error::GuardResult;
use crate::logic::clock::RandomSource;
use crate::logic::experiment::{Arm, ExperimentEngine, SessionToken};
use crate::logic::ledger::{Attempt, AttemptLedger};
use crate::logic::scoring::{classify, Recommendation, ScoringOutcome};
use crate::logic::storage::Storage;
use crate::logic::threshold::{ThresholdConfig, ThresholdStore};

/// Which experiment arm handled the attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentRouting {
    pub experiment_id: String,
    pub arm: Arm,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    pub outcome: ScoringOutcome,
    /// `None` when the ledger write was dropped
    pub attempt_id: Option<String>,
    pub decision: Recommendation,
    pub thresholds: ThresholdConfig,
    pub experiment: Option<ExperimentRouting>,
}

pub struct BotGuard {
    ledger: AttemptLedger,
    thresholds: ThresholdStore,
    experiments: ExperimentEngine,
}

impl BotGuard {
    pub fn new(storage: Arc<dyn Storage>, random: Arc<dyn RandomSource>, config: &GuardConfig) -> Self {
        Self {
            ledger: AttemptLedger::with_capacity(storage.clone(), config.ledger_capacity),
            thresholds: ThresholdStore::new(storage.clone()),
            experiments: ExperimentEngine::new(storage, random),
        }
    }

    pub fn ledger(&self) -> &AttemptLedger {
        &self.ledger
    }

    pub fn thresholds(&self) -> &ThresholdStore {
        &self.thresholds
    }

    pub fn experiments(&self) -> &ExperimentEngine {
        &self.experiments
    }

    /// Decide on one sign-in attempt. Bookkeeping failures are logged and
    /// never change the decision.
    pub fn evaluate(&self, session: &SessionToken, outcome: ScoringOutcome) -> Evaluation {
        // 1. Effective thresholds
        let routing = self.experiments.active().and_then(|experiment| {
            let arm = self.experiments.assign(session, &experiment.id)?;
            Some((experiment, arm))
        });
        let thresholds = match &routing {
            Some((experiment, arm)) => *experiment.variants.get(*arm),
            None => self.thresholds.get(),
        };

        // 2. Decision
        let decision = classify(outcome.score, &thresholds);

        // 3. Ledger, bucketed by the applied decision
        let mut attempt = Attempt::from_outcome(&outcome).with_decision(decision);
        if let Some((experiment, arm)) = &routing {
            attempt = attempt.with_experiment(&experiment.id, *arm);
        }
        let attempt_id = match self.ledger.record_attempt(attempt) {
            Ok(id) => Some(id),
            Err(e) => {
                log::warn!("Attempt not recorded: {}", e);
                None
            }
        };

        // 4. Experiment counters
        let experiment = routing.map(|(experiment, arm)| {
            if let Err(e) = self.experiments.record_result(
                &experiment.id,
                arm,
                f64::from(outcome.score),
                f64::from(outcome.confidence),
                decision,
                false,
            ) {
                log::warn!("Experiment {} result not recorded: {}", experiment.id, e);
            }
            ExperimentRouting {
                experiment_id: experiment.id,
                arm,
            }
        });

        log::debug!(
            "Session {}: score={} decision={} thresholds={}/{}",
            session,
            outcome.score,
            decision,
            thresholds.challenge,
            thresholds.block
        );

        Evaluation {
            outcome,
            attempt_id,
            decision,
            thresholds,
            experiment,
        }
    }

    /// Set the reviewer flag on an attempt. A change also moves the
    /// false-positive counter of the experiment arm that handled it.
    pub fn mark_false_positive(&self, attempt_id: &str, is_false_positive: bool) -> GuardResult<bool> {
        let Some(previous) = self.ledger.set_false_positive(attempt_id, is_false_positive)? else {
            return Ok(false);
        };
        if previous.is_false_positive == is_false_positive {
            return Ok(true);
        }

        if let (Some(experiment_id), Some(arm)) = (previous.experiment_id.as_deref(), previous.arm) {
            let result = if is_false_positive {
                self.experiments.record_false_positive(experiment_id, arm)
            } else {
                self.experiments.retract_false_positive(experiment_id, arm)
            };
            if let Err(e) = result {
                log::warn!("Experiment {} false-positive count not updated: {}", experiment_id, e);
            }
        }
        Ok(true)
    }
}
