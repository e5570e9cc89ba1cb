//! Ledger Export / Import
//!
//! Snapshot of attempts, stats and live thresholds for offline review.
//! JSON exports can be imported into a fresh store; CSV is for spreadsheets.

use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::types::{Attempt, AttemptStats};
use super::{compute_stats, AttemptLedger};
use crate::error::{GuardResult, StorageError};
use crate::logic::threshold::{ThresholdConfig, ThresholdStore};

// ============================================================================
// EXPORT FORMATS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Pretty JSON document (importable)
    Json,
    /// One row per attempt
    Csv,
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(format!("unknown export format '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerExport {
    pub exported_at: DateTime<Utc>,
    pub thresholds: ThresholdConfig,
    pub stats: AttemptStats,
    pub attempts: Vec<Attempt>,
}

impl LedgerExport {
    pub fn capture(ledger: &AttemptLedger, thresholds: &ThresholdStore) -> Self {
        let attempts = ledger.list();
        Self {
            exported_at: Utc::now(),
            thresholds: thresholds.get(),
            stats: compute_stats(&attempts),
            attempts,
        }
    }

    pub fn to_json(&self) -> GuardResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> GuardResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_csv(&self) -> String {
        attempts_to_csv(&self.attempts)
    }

    /// Write to `destination`, returning the number of attempts written
    pub fn write_to(&self, destination: &Path, format: ExportFormat) -> GuardResult<usize> {
        let mut file = std::fs::File::create(destination).map_err(StorageError::from)?;
        let body = match format {
            ExportFormat::Json => self.to_json()?,
            ExportFormat::Csv => self.to_csv(),
        };
        file.write_all(body.as_bytes()).map_err(StorageError::from)?;
        Ok(self.attempts.len())
    }

    /// Load this export into `ledger` and `thresholds`, replacing their
    /// contents. Thresholds are validated before anything is written.
    pub fn restore(&self, ledger: &AttemptLedger, thresholds: &ThresholdStore) -> GuardResult<()> {
        self.thresholds.validate()?;
        ledger.replace_all(self.attempts.clone())?;
        thresholds.set(self.thresholds)?;
        log::info!(
            "Imported {} attempts (exported {})",
            self.attempts.len(),
            self.exported_at.to_rfc3339()
        );
        Ok(())
    }
}

/// CSV with header `id,timestamp,score,confidence,recommendation,isFalsePositive,triggers`.
/// Triggers are joined with `; ` inside one quoted field.
pub fn attempts_to_csv(attempts: &[Attempt]) -> String {
    let mut out = String::from("id,timestamp,score,confidence,recommendation,isFalsePositive,triggers\n");

    for attempt in attempts {
        let triggers = attempt.triggers.join("; ").replace('"', "\"\"");
        out.push_str(&format!(
            "{},{},{},{},{},{},\"{}\"\n",
            attempt.id,
            attempt.timestamp.to_rfc3339(),
            attempt.score,
            attempt.confidence,
            attempt.recommendation,
            attempt.is_false_positive,
            triggers
        ));
    }

    out
}
