//! Experiment Types
//!
//! Data structures only - engine logic lives in `mod.rs`, statistics in
//! `significance.rs`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{GuardError, GuardResult};
use crate::logic::scoring::Recommendation;
use crate::logic::threshold::ThresholdConfig;

// ============================================================================
// STATUS & ARMS
// ============================================================================

/// `Active <-> Paused`, either -> `Completed` (terminal)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperimentStatus {
    Active,
    Paused,
    Completed,
}

impl ExperimentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExperimentStatus::Active => "active",
            ExperimentStatus::Paused => "paused",
            ExperimentStatus::Completed => "completed",
        }
    }
}

impl std::fmt::Display for ExperimentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arm {
    Control,
    Variant,
}

impl Arm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Arm::Control => "control",
            Arm::Variant => "variant",
        }
    }
}

impl std::fmt::Display for Arm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Arm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "control" => Ok(Arm::Control),
            "variant" => Ok(Arm::Variant),
            other => Err(format!("unknown arm '{}'", other)),
        }
    }
}

/// One value per arm
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ArmPair<T> {
    pub control: T,
    pub variant: T,
}

impl<T> ArmPair<T> {
    pub fn get(&self, arm: Arm) -> &T {
        match arm {
            Arm::Control => &self.control,
            Arm::Variant => &self.variant,
        }
    }

    pub fn get_mut(&mut self, arm: Arm) -> &mut T {
        match arm {
            Arm::Control => &mut self.control,
            Arm::Variant => &mut self.variant,
        }
    }
}

// ============================================================================
// SESSION TOKEN
// ============================================================================

/// Caller-supplied identity of one sign-in session; keys sticky assignment
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// VARIANT STATS
// ============================================================================

/// Outcome counter used by significance tests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Metric {
    Allowed,
    Challenged,
    Blocked,
    FalsePositives,
}

impl std::str::FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "allowed" => Ok(Metric::Allowed),
            "challenged" => Ok(Metric::Challenged),
            "blocked" => Ok(Metric::Blocked),
            "falsepositives" => Ok(Metric::FalsePositives),
            other => Err(format!("unknown metric '{}'", other)),
        }
    }
}

/// Running aggregates for one arm. Never recomputed from raw history.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantStats {
    pub attempts: u64,
    pub allowed: u64,
    pub challenged: u64,
    pub blocked: u64,
    pub false_positives: u64,
    pub avg_bot_score: f64,
    pub avg_confidence: f64,
}

impl VariantStats {
    pub fn record(&mut self, score: f64, confidence: f64, recommendation: Recommendation, is_false_positive: bool) {
        self.attempts += 1;
        match recommendation {
            Recommendation::Allow => self.allowed += 1,
            Recommendation::Challenge => self.challenged += 1,
            Recommendation::Block => self.blocked += 1,
        }
        if is_false_positive {
            self.false_positives += 1;
        }

        let n = self.attempts as f64;
        self.avg_bot_score = (self.avg_bot_score * (n - 1.0) + score) / n;
        self.avg_confidence = (self.avg_confidence * (n - 1.0) + confidence) / n;
    }

    pub fn count(&self, metric: Metric) -> u64 {
        match metric {
            Metric::Allowed => self.allowed,
            Metric::Challenged => self.challenged,
            Metric::Blocked => self.blocked,
            Metric::FalsePositives => self.false_positives,
        }
    }

    /// Share of attempts hitting `metric`, in percent (0 when empty)
    pub fn rate(&self, metric: Metric) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            self.count(metric) as f64 / self.attempts as f64 * 100.0
        }
    }
}

// ============================================================================
// EXPERIMENT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Experiment {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: ExperimentStatus,
    pub start_date: DateTime<Utc>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    pub variants: ArmPair<ThresholdConfig>,
    /// Percent of new assignments routed to the variant arm
    pub traffic_split: f64,
    pub min_sample_size: u64,
    pub results: ArmPair<VariantStats>,
}

impl Experiment {
    pub fn is_active(&self) -> bool {
        self.status == ExperimentStatus::Active
    }

    /// Both arms reached the minimum sample size
    pub fn has_enough_samples(&self) -> bool {
        self.results.control.attempts >= self.min_sample_size
            && self.results.variant.attempts >= self.min_sample_size
    }
}

/// Operator input for creating an experiment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewExperiment {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub control: ThresholdConfig,
    pub variant: ThresholdConfig,
    pub traffic_split: f64,
    pub min_sample_size: u64,
}

impl NewExperiment {
    pub fn validate(&self) -> GuardResult<()> {
        if self.name.trim().is_empty() {
            return Err(GuardError::Validation("experiment name is required".to_string()));
        }
        self.control.validate()?;
        self.variant.validate()?;
        if !(0.0..=100.0).contains(&self.traffic_split) {
            return Err(GuardError::Validation(format!(
                "traffic split {} must be within [0, 100]",
                self.traffic_split
            )));
        }
        if self.min_sample_size == 0 {
            return Err(GuardError::Validation("minimum sample size must be at least 1".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// RESULTS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Significance {
    pub p_value: f64,
    pub chi_squared: f64,
    pub significant: bool,
    /// 3 / 2 / 1 / 0 at p < 0.01 / 0.05 / 0.10
    pub stars: u8,
}

impl Significance {
    pub fn not_significant() -> Self {
        Self {
            p_value: 1.0,
            chi_squared: 0.0,
            significant: false,
            stars: 0,
        }
    }

    pub fn stars_label(&self) -> &'static str {
        match self.stars {
            3 => "***",
            2 => "**",
            1 => "*",
            _ => "",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Control,
    Variant,
    Inconclusive,
}

impl Verdict {
    pub fn winner(&self) -> Option<Arm> {
        match self {
            Verdict::Control => Some(Arm::Control),
            Verdict::Variant => Some(Arm::Variant),
            Verdict::Inconclusive => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WinnerRecommendation {
    pub winner: Option<Arm>,
    pub verdict: Verdict,
    /// min(95, (1 - p) * 100); 0 when samples are insufficient
    pub confidence: f64,
    pub reason: String,
    pub control_fp_rate: f64,
    pub variant_fp_rate: f64,
    pub p_value: f64,
}
