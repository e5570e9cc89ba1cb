//! Scoring Types
//!
//! Data structures only - no scoring logic.

use serde::{Deserialize, Serialize};

// ============================================================================
// RECOMMENDATION
// ============================================================================

/// Action recommended for a sign-in attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recommendation {
    Allow,
    Challenge,
    Block,
}

impl Recommendation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Recommendation::Allow => "allow",
            Recommendation::Challenge => "challenge",
            Recommendation::Block => "block",
        }
    }

    /// Challenge and block both interrupt the user
    pub fn is_flagged(&self) -> bool {
        !matches!(self, Recommendation::Allow)
    }
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Recommendation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "allow" => Ok(Recommendation::Allow),
            "challenge" => Ok(Recommendation::Challenge),
            "block" => Ok(Recommendation::Block),
            other => Err(format!("unknown recommendation '{}'", other)),
        }
    }
}

// ============================================================================
// OUTCOME
// ============================================================================

/// Result of scoring one signal snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringOutcome {
    /// Sum of fired rule points. Not clamped, may exceed 100.
    pub score: u32,
    /// Clamped to 0..=100
    pub confidence: u32,
    /// Human-readable reasons, in rule order
    pub triggers: Vec<String>,
    pub recommendation: Recommendation,
}

impl ScoringOutcome {
    pub fn empty() -> Self {
        Self {
            score: 0,
            confidence: 0,
            triggers: Vec::new(),
            recommendation: Recommendation::Allow,
        }
    }
}
