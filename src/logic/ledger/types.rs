//! Ledger Types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::logic::experiment::Arm;
use crate::logic::scoring::{Recommendation, ScoringOutcome};
use crate::logic::threshold::ThresholdConfig;

// ============================================================================
// ATTEMPT
// ============================================================================

/// One persisted scoring outcome. Only `is_false_positive` changes after
/// creation.
///
/// `recommendation` is the decision actually applied to the attempt. Attempts
/// routed through an experiment remember the experiment and arm so a later
/// reviewer flag reaches that arm's counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub score: u32,
    pub confidence: u32,
    pub triggers: Vec<String>,
    pub recommendation: Recommendation,
    #[serde(default)]
    pub is_false_positive: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experiment_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arm: Option<Arm>,
}

impl Attempt {
    pub fn from_outcome(outcome: &ScoringOutcome) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            score: outcome.score,
            confidence: outcome.confidence,
            triggers: outcome.triggers.clone(),
            recommendation: outcome.recommendation,
            is_false_positive: false,
            experiment_id: None,
            arm: None,
        }
    }

    /// Replace the calculator's fixed-cutoff recommendation with the
    /// decision taken under the session's thresholds
    pub fn with_decision(mut self, decision: Recommendation) -> Self {
        self.recommendation = decision;
        self
    }

    pub fn with_experiment(mut self, experiment_id: &str, arm: Arm) -> Self {
        self.experiment_id = Some(experiment_id.to_string());
        self.arm = Some(arm);
        self
    }
}

// ============================================================================
// STATS
// ============================================================================

/// Summary over all retained attempts. Averages and rate use one decimal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptStats {
    pub total: usize,
    pub avg_score: f64,
    pub avg_confidence: f64,
    pub allowed_count: usize,
    pub challenged_count: usize,
    pub blocked_count: usize,
    pub false_positive_count: usize,
    /// Percentage of all attempts marked false positive
    pub false_positive_rate: f64,
}

// ============================================================================
// THRESHOLD RECOMMENDATION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdjustDirection {
    /// Too many real users interrupted
    Raise,
    /// Bots slipping just under the challenge cutoff
    Lower,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdRecommendation {
    pub direction: AdjustDirection,
    pub current: ThresholdConfig,
    pub suggested: ThresholdConfig,
    /// False-positive rate among challenged + blocked attempts (%)
    pub flagged_false_positive_rate: f64,
    pub reason: String,
}

pub(crate) fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
