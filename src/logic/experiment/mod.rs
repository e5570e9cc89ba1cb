//! Experiment Engine - controlled trials of alternate threshold pairs
//!
//! Experiments are persisted as one JSON list. Sticky variant assignments
//! are session-scoped and kept in memory, keyed by `(SessionToken, id)`;
//! they last as long as the engine, so a new process draws again.
//! Only one experiment may be active at a time, so a session's arm is
//! always well defined.
//!
//! - `types.rs` - `Experiment`, `VariantStats`, `Arm`, results
//! - `significance.rs` - chi-squared test and winner selection

pub mod types;
pub mod significance;

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;

use crate::constants::EXPERIMENTS_KEY;
use crate::error::{GuardError, GuardResult};
use crate::logic::clock::RandomSource;
use crate::logic::scoring::Recommendation;
use crate::logic::storage::{self, Storage};
use crate::logic::threshold::{ThresholdConfig, ThresholdStore};

pub use types::{
    Arm, ArmPair, Experiment, ExperimentStatus, Metric, NewExperiment, SessionToken,
    Significance, VariantStats, Verdict, WinnerRecommendation,
};
pub use significance::{chi_squared_test, normal_cdf, recommend_winner};

pub struct ExperimentEngine {
    storage: Arc<dyn Storage>,
    random: Arc<dyn RandomSource>,
    write_lock: Mutex<()>,
    assignments: Mutex<HashMap<(SessionToken, String), Arm>>,
}

impl ExperimentEngine {
    pub fn new(storage: Arc<dyn Storage>, random: Arc<dyn RandomSource>) -> Self {
        Self {
            storage,
            random,
            write_lock: Mutex::new(()),
            assignments: Mutex::new(HashMap::new()),
        }
    }

    // ========================================================================
    // LIFECYCLE
    // ========================================================================

    pub fn create(&self, params: NewExperiment) -> GuardResult<Experiment> {
        params.validate()?;

        let _guard = self.write_lock.lock();
        let mut experiments = self.load()?;
        if let Some(running) = experiments.iter().find(|e| e.is_active()) {
            return Err(GuardError::Validation(format!(
                "experiment '{}' is already active; pause or complete it first",
                running.name
            )));
        }

        let experiment = Experiment {
            id: uuid::Uuid::new_v4().to_string(),
            name: params.name.trim().to_string(),
            description: params.description,
            status: ExperimentStatus::Active,
            start_date: Utc::now(),
            end_date: None,
            variants: ArmPair {
                control: params.control,
                variant: params.variant,
            },
            traffic_split: params.traffic_split,
            min_sample_size: params.min_sample_size,
            results: ArmPair::default(),
        };

        experiments.push(experiment.clone());
        self.persist(&experiments)?;
        log::info!(
            "Experiment '{}' ({}) started: control={:?} variant={:?} split={}%",
            experiment.name,
            experiment.id,
            experiment.variants.control,
            experiment.variants.variant,
            experiment.traffic_split
        );
        Ok(experiment)
    }

    /// Create an experiment whose control arm is the live production pair
    pub fn create_from_live(
        &self,
        name: &str,
        variant: ThresholdConfig,
        traffic_split: f64,
        min_sample_size: u64,
        thresholds: &ThresholdStore,
    ) -> GuardResult<Experiment> {
        self.create(NewExperiment {
            name: name.to_string(),
            description: None,
            control: thresholds.get(),
            variant,
            traffic_split,
            min_sample_size,
        })
    }

    pub fn pause(&self, id: &str) -> GuardResult<Experiment> {
        self.update(id, |experiment, _| match experiment.status {
            ExperimentStatus::Active => {
                experiment.status = ExperimentStatus::Paused;
                Ok(())
            }
            ExperimentStatus::Paused => Ok(()),
            ExperimentStatus::Completed => Err(completed_error(experiment)),
        })
    }

    pub fn resume(&self, id: &str) -> GuardResult<Experiment> {
        self.update(id, |experiment, others| match experiment.status {
            ExperimentStatus::Paused => {
                if let Some(running) = others.iter().find(|e| e.is_active()) {
                    return Err(GuardError::Validation(format!(
                        "experiment '{}' is already active",
                        running.name
                    )));
                }
                experiment.status = ExperimentStatus::Active;
                Ok(())
            }
            ExperimentStatus::Active => Ok(()),
            ExperimentStatus::Completed => Err(completed_error(experiment)),
        })
    }

    /// Terminal; stamps the end date
    pub fn complete(&self, id: &str) -> GuardResult<Experiment> {
        self.update(id, |experiment, _| match experiment.status {
            ExperimentStatus::Completed => Err(completed_error(experiment)),
            _ => {
                experiment.status = ExperimentStatus::Completed;
                experiment.end_date = Some(Utc::now());
                Ok(())
            }
        })
    }

    pub fn delete(&self, id: &str) -> GuardResult<()> {
        let _guard = self.write_lock.lock();
        let mut experiments = self.load()?;
        let before = experiments.len();
        experiments.retain(|e| e.id != id);
        if experiments.len() == before {
            return Err(GuardError::UnknownExperiment(id.to_string()));
        }

        self.persist(&experiments)?;
        self.assignments.lock().retain(|(_, exp_id), _| exp_id != id);
        log::info!("Experiment {} deleted", id);
        Ok(())
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    pub fn list(&self) -> Vec<Experiment> {
        self.load().unwrap_or_else(|e| {
            log::warn!("Experiments unreadable: {}", e);
            Vec::new()
        })
    }

    pub fn get(&self, id: &str) -> Option<Experiment> {
        self.list().into_iter().find(|e| e.id == id)
    }

    pub fn active(&self) -> Option<Experiment> {
        self.list().into_iter().find(|e| e.is_active())
    }

    // ========================================================================
    // TRAFFIC
    // ========================================================================

    /// Sticky arm for `session`. `None` when the experiment is unknown or
    /// not active; the caller then does not participate.
    pub fn assign(&self, session: &SessionToken, id: &str) -> Option<Arm> {
        let experiment = self.get(id).filter(|e| e.is_active())?;

        let mut assignments = self.assignments.lock();
        let key = (session.clone(), experiment.id.clone());
        if let Some(arm) = assignments.get(&key) {
            return Some(*arm);
        }

        let draw = self.random.next_unit() * 100.0;
        let arm = if draw < experiment.traffic_split {
            Arm::Variant
        } else {
            Arm::Control
        };
        assignments.insert(key, arm);
        log::debug!("Session {} assigned to {} in experiment {}", session, arm, id);
        Some(arm)
    }

    /// Thresholds for an arm of an experiment
    pub fn thresholds_for(&self, id: &str, arm: Arm) -> Option<ThresholdConfig> {
        self.get(id).map(|e| *e.variants.get(arm))
    }

    pub fn record_result(
        &self,
        id: &str,
        arm: Arm,
        score: f64,
        confidence: f64,
        recommendation: Recommendation,
        is_false_positive: bool,
    ) -> GuardResult<()> {
        self.update(id, |experiment, _| {
            if experiment.status == ExperimentStatus::Completed {
                return Err(completed_error(experiment));
            }
            experiment
                .results
                .get_mut(arm)
                .record(score, confidence, recommendation, is_false_positive);
            Ok(())
        })?;
        Ok(())
    }

    /// Reviewer confirmed an earlier flagged attempt was a real user
    pub fn record_false_positive(&self, id: &str, arm: Arm) -> GuardResult<()> {
        self.update(id, |experiment, _| {
            if experiment.status == ExperimentStatus::Completed {
                return Err(completed_error(experiment));
            }
            experiment.results.get_mut(arm).false_positives += 1;
            Ok(())
        })?;
        Ok(())
    }

    /// Reviewer withdrew an earlier false-positive flag
    pub fn retract_false_positive(&self, id: &str, arm: Arm) -> GuardResult<()> {
        self.update(id, |experiment, _| {
            if experiment.status == ExperimentStatus::Completed {
                return Err(completed_error(experiment));
            }
            let stats = experiment.results.get_mut(arm);
            stats.false_positives = stats.false_positives.saturating_sub(1);
            Ok(())
        })?;
        Ok(())
    }

    // ========================================================================
    // ANALYSIS
    // ========================================================================

    pub fn significance(&self, experiment: &Experiment, metric: Metric) -> Significance {
        significance::significance(experiment, metric)
    }

    pub fn winner_recommendation(&self, id: &str) -> GuardResult<WinnerRecommendation> {
        let experiment = self
            .get(id)
            .ok_or_else(|| GuardError::UnknownExperiment(id.to_string()))?;
        Ok(recommend_winner(&experiment))
    }

    /// Copy an arm's thresholds into the live store. Operator action only.
    pub fn promote(&self, id: &str, arm: Arm, thresholds: &ThresholdStore) -> GuardResult<ThresholdConfig> {
        let experiment = self
            .get(id)
            .ok_or_else(|| GuardError::UnknownExperiment(id.to_string()))?;
        let config = *experiment.variants.get(arm);

        thresholds.set(config)?;
        log::info!(
            "Promoted {} arm of experiment '{}' to production: challenge={} block={}",
            arm,
            experiment.name,
            config.challenge,
            config.block
        );
        Ok(config)
    }

    // ========================================================================
    // PERSISTENCE
    // ========================================================================

    fn load(&self) -> GuardResult<Vec<Experiment>> {
        Ok(storage::load::<Vec<Experiment>>(self.storage.as_ref(), EXPERIMENTS_KEY)?.unwrap_or_default())
    }

    fn persist(&self, experiments: &[Experiment]) -> GuardResult<()> {
        storage::save(self.storage.as_ref(), EXPERIMENTS_KEY, &experiments)?;
        Ok(())
    }

    /// Read-modify-write one experiment under the write lock. The closure
    /// also sees the other experiments; an error aborts without writing.
    fn update<F>(&self, id: &str, mutate: F) -> GuardResult<Experiment>
    where
        F: FnOnce(&mut Experiment, &[Experiment]) -> GuardResult<()>,
    {
        let _guard = self.write_lock.lock();
        let mut experiments = self.load()?;
        let index = experiments
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| GuardError::UnknownExperiment(id.to_string()))?;

        let mut target = experiments[index].clone();
        let others: Vec<Experiment> = experiments
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != index)
            .map(|(_, e)| e.clone())
            .collect();
        mutate(&mut target, &others)?;

        experiments[index] = target.clone();
        self.persist(&experiments)?;
        Ok(target)
    }
}

impl std::fmt::Debug for ExperimentEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExperimentEngine")
            .field("assignments", &self.assignments.lock().len())
            .finish_non_exhaustive()
    }
}

fn completed_error(experiment: &Experiment) -> GuardError {
    GuardError::Validation(format!("experiment '{}' is already completed", experiment.name))
}
