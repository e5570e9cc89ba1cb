//! Commands - operator API over a `BotGuard`
//!
//! Thin wrappers that combine the scoring, ledger, threshold and experiment
//! services into the operations an operator or host actually performs.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{GuardError, GuardResult, StorageError};
use crate::logic::clock::ManualClock;
use crate::logic::experiment::{
    recommend_winner, Arm, Experiment, Metric, NewExperiment, SessionToken, Significance,
    WinnerRecommendation,
};
use crate::logic::guard::{BotGuard, Evaluation};
use crate::logic::ledger::{Attempt, AttemptStats, ExportFormat, LedgerExport, ThresholdRecommendation};
use crate::logic::scoring::{self, Recommendation, ScoringOutcome};
use crate::logic::telemetry::{EventBus, InputEvent, SignalSnapshot, TelemetryCollector};
use crate::logic::threshold::ThresholdConfig;

// ============================================================================
// DATA STRUCTURES
// ============================================================================

/// Scoring input: either a recorded event stream or a prebuilt snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScoreInput {
    Events(Vec<InputEvent>),
    Snapshot(SignalSnapshot),
}

/// Experiment plus its live analysis, for listing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentReport {
    pub experiment: Experiment,
    pub significance: Significance,
    pub recommendation: WinnerRecommendation,
}

// ============================================================================
// SCORING COMMANDS
// ============================================================================

/// Replay a recorded event stream through a fresh collector session.
/// Session time runs from the first event to the last.
pub fn score_events(events: &[InputEvent]) -> ScoringOutcome {
    let start_ms = events.first().map(InputEvent::at_ms).unwrap_or(0);
    let bus = Arc::new(EventBus::new());
    let clock = Arc::new(ManualClock::new(start_ms));
    let collector = TelemetryCollector::new(bus.clone(), clock.clone());

    collector.start();
    for event in events {
        clock.set(event.at_ms().max(start_ms));
        bus.emit(*event);
    }

    collector.stop().unwrap_or_else(ScoringOutcome::empty)
}

pub fn score_input(input: &ScoreInput) -> ScoringOutcome {
    match input {
        ScoreInput::Events(events) => score_events(events),
        ScoreInput::Snapshot(snapshot) => scoring::calculate(snapshot),
    }
}

pub fn read_score_input(path: &Path) -> GuardResult<ScoreInput> {
    let body = std::fs::read_to_string(path).map_err(StorageError::from)?;
    Ok(serde_json::from_str(&body)?)
}

/// Score and run the attempt through the guard pipeline. A missing session
/// token gets a fresh one, so the attempt is assigned like a new visitor.
pub fn evaluate_attempt(guard: &BotGuard, session: Option<&str>, input: &ScoreInput) -> Evaluation {
    let session = session.map(SessionToken::new).unwrap_or_else(SessionToken::generate);
    guard.evaluate(&session, score_input(input))
}

// ============================================================================
// LEDGER COMMANDS
// ============================================================================

/// Most recent `limit` attempts, oldest first
pub fn list_attempts(guard: &BotGuard, limit: Option<usize>) -> Vec<Attempt> {
    let attempts = guard.ledger().list();
    match limit {
        Some(limit) if limit < attempts.len() => attempts[attempts.len() - limit..].to_vec(),
        _ => attempts,
    }
}

pub fn ledger_stats(guard: &BotGuard) -> AttemptStats {
    guard.ledger().stats()
}

pub fn threshold_recommendation(guard: &BotGuard) -> Option<ThresholdRecommendation> {
    guard.ledger().threshold_recommendation(&guard.thresholds().get())
}

pub fn mark_attempt(guard: &BotGuard, id: &str, is_false_positive: bool) -> GuardResult<bool> {
    guard.mark_false_positive(id, is_false_positive)
}

pub fn clear_ledger(guard: &BotGuard) -> GuardResult<()> {
    guard.ledger().clear()
}

/// Returns the number of attempts written
pub fn export_ledger(guard: &BotGuard, destination: &Path, format: ExportFormat) -> GuardResult<usize> {
    LedgerExport::capture(guard.ledger(), guard.thresholds()).write_to(destination, format)
}

/// Replace ledger and thresholds with a JSON export. Returns the number of
/// attempts imported.
pub fn import_ledger(guard: &BotGuard, source: &Path) -> GuardResult<usize> {
    let body = std::fs::read_to_string(source).map_err(StorageError::from)?;
    let export = LedgerExport::from_json(&body)?;
    export.restore(guard.ledger(), guard.thresholds())?;
    Ok(export.attempts.len())
}

// ============================================================================
// THRESHOLD COMMANDS
// ============================================================================

pub fn get_thresholds(guard: &BotGuard) -> ThresholdConfig {
    guard.thresholds().get()
}

pub fn set_thresholds(guard: &BotGuard, challenge: f64, block: f64) -> GuardResult<ThresholdConfig> {
    let config = ThresholdConfig::new(challenge, block);
    guard.thresholds().set(config)?;
    Ok(config)
}

pub fn reset_thresholds(guard: &BotGuard) -> GuardResult<ThresholdConfig> {
    guard.thresholds().reset()?;
    Ok(guard.thresholds().get())
}

// ============================================================================
// EXPERIMENT COMMANDS
// ============================================================================

/// Start an experiment. Without an explicit control pair the live
/// thresholds are used.
pub fn create_experiment(
    guard: &BotGuard,
    name: &str,
    description: Option<String>,
    control: Option<ThresholdConfig>,
    variant: ThresholdConfig,
    traffic_split: f64,
    min_sample_size: u64,
) -> GuardResult<Experiment> {
    match control {
        Some(control) => guard.experiments().create(NewExperiment {
            name: name.to_string(),
            description,
            control,
            variant,
            traffic_split,
            min_sample_size,
        }),
        None => guard.experiments().create_from_live(
            name,
            variant,
            traffic_split,
            min_sample_size,
            guard.thresholds(),
        ),
    }
}

pub fn list_experiments(guard: &BotGuard) -> Vec<ExperimentReport> {
    let engine = guard.experiments();
    engine
        .list()
        .into_iter()
        .map(|experiment| ExperimentReport {
            significance: engine.significance(&experiment, Metric::FalsePositives),
            recommendation: recommend_winner(&experiment),
            experiment,
        })
        .collect()
}

pub fn pause_experiment(guard: &BotGuard, id: &str) -> GuardResult<Experiment> {
    guard.experiments().pause(id)
}

pub fn resume_experiment(guard: &BotGuard, id: &str) -> GuardResult<Experiment> {
    guard.experiments().resume(id)
}

pub fn complete_experiment(guard: &BotGuard, id: &str) -> GuardResult<Experiment> {
    guard.experiments().complete(id)
}

pub fn delete_experiment(guard: &BotGuard, id: &str) -> GuardResult<()> {
    guard.experiments().delete(id)
}

pub fn assign_session(guard: &BotGuard, session: &str, id: &str) -> Option<Arm> {
    guard.experiments().assign(&SessionToken::new(session), id)
}

pub fn record_experiment_result(
    guard: &BotGuard,
    id: &str,
    arm: Arm,
    score: f64,
    confidence: f64,
    recommendation: Recommendation,
    is_false_positive: bool,
) -> GuardResult<()> {
    guard
        .experiments()
        .record_result(id, arm, score, confidence, recommendation, is_false_positive)
}

pub fn experiment_significance(guard: &BotGuard, id: &str, metric: Metric) -> GuardResult<Significance> {
    let experiment = guard
        .experiments()
        .get(id)
        .ok_or_else(|| GuardError::UnknownExperiment(id.to_string()))?;
    Ok(guard.experiments().significance(&experiment, metric))
}

pub fn winner_recommendation(guard: &BotGuard, id: &str) -> GuardResult<WinnerRecommendation> {
    guard.experiments().winner_recommendation(id)
}

pub fn promote_arm(guard: &BotGuard, id: &str, arm: Arm) -> GuardResult<ThresholdConfig> {
    guard.experiments().promote(id, arm, guard.thresholds())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GuardConfig;
    use crate::logic::clock::FixedRandom;
    use crate::logic::storage::FileStorage;

    fn file_guard(dir: &Path) -> BotGuard {
        let storage = Arc::new(FileStorage::new(dir.to_path_buf()));
        BotGuard::new(storage, Arc::new(FixedRandom::new(vec![0.5])), &GuardConfig::default())
    }

    fn scripted_events() -> Vec<InputEvent> {
        // Perfectly even 20ms typing, a paste, no pointer movement
        let mut events: Vec<InputEvent> = (0..10)
            .map(|i| InputEvent::KeyDown { at_ms: 1_000 + i * 20 })
            .collect();
        events.push(InputEvent::Paste { at_ms: 1_200 });
        events.push(InputEvent::Click { at_ms: 1_220 });
        events
    }

    #[test]
    fn test_score_events_flags_scripted_input() {
        let outcome = score_events(&scripted_events());
        assert!(outcome.score >= 60);
        assert_eq!(outcome.recommendation, Recommendation::Block);
    }

    #[test]
    fn test_score_events_empty_stream() {
        assert_eq!(score_events(&[]), ScoringOutcome::empty());
    }

    #[test]
    fn test_score_input_parses_both_shapes() {
        let events: ScoreInput = serde_json::from_str(
            r#"[{"type":"key_down","at_ms":10},{"type":"click","at_ms":900}]"#,
        )
        .unwrap();
        assert!(matches!(events, ScoreInput::Events(ref e) if e.len() == 2));

        let snapshot = serde_json::to_string(&SignalSnapshot::new()).unwrap();
        let parsed: ScoreInput = serde_json::from_str(&snapshot).unwrap();
        assert!(matches!(parsed, ScoreInput::Snapshot(_)));
        assert_eq!(score_input(&parsed), ScoringOutcome::empty());
    }

    #[test]
    fn test_evaluate_and_list_with_limit() {
        let dir = tempfile::tempdir().unwrap();
        let guard = file_guard(dir.path());
        let input = ScoreInput::Events(scripted_events());

        for _ in 0..3 {
            evaluate_attempt(&guard, Some("session"), &input);
        }
        assert_eq!(list_attempts(&guard, None).len(), 3);
        assert_eq!(list_attempts(&guard, Some(2)).len(), 2);
        assert_eq!(ledger_stats(&guard).total, 3);
    }

    #[test]
    fn test_export_import_round_trip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let guard = file_guard(&dir.path().join("a"));
        set_thresholds(&guard, 40.0, 70.0).unwrap();
        let eval = evaluate_attempt(&guard, None, &ScoreInput::Events(scripted_events()));
        mark_attempt(&guard, eval.attempt_id.as_deref().unwrap(), true).unwrap();

        let export_path = dir.path().join("export.json");
        assert_eq!(export_ledger(&guard, &export_path, ExportFormat::Json).unwrap(), 1);

        let other = file_guard(&dir.path().join("b"));
        assert_eq!(import_ledger(&other, &export_path).unwrap(), 1);
        assert_eq!(get_thresholds(&other), ThresholdConfig::new(40.0, 70.0));
        assert_eq!(ledger_stats(&other).false_positive_count, 1);

        let csv_path = dir.path().join("export.csv");
        export_ledger(&guard, &csv_path, ExportFormat::Csv).unwrap();
        let csv = std::fs::read_to_string(csv_path).unwrap();
        assert!(csv.starts_with("id,timestamp,score,confidence,recommendation,isFalsePositive,triggers"));
    }

    #[test]
    fn test_experiment_commands_flow() {
        let dir = tempfile::tempdir().unwrap();
        let guard = file_guard(dir.path());
        set_thresholds(&guard, 30.0, 55.0).unwrap();

        let experiment = create_experiment(
            &guard,
            "Looser",
            None,
            None,
            ThresholdConfig::new(45.0, 65.0),
            50.0,
            5,
        )
        .unwrap();
        assert_eq!(experiment.variants.control, ThresholdConfig::new(30.0, 55.0));

        // FixedRandom draws 0.5 -> 50 is not below a 50% split
        assert_eq!(assign_session(&guard, "visitor", &experiment.id), Some(Arm::Control));

        record_experiment_result(&guard, &experiment.id, Arm::Variant, 50.0, 20.0, Recommendation::Allow, false)
            .unwrap();
        let sig = experiment_significance(&guard, &experiment.id, Metric::Blocked).unwrap();
        assert!(!sig.significant);

        let reports = list_experiments(&guard);
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].experiment.results.variant.attempts, 1);

        assert_eq!(promote_arm(&guard, &experiment.id, Arm::Variant).unwrap(), ThresholdConfig::new(45.0, 65.0));
        assert_eq!(get_thresholds(&guard), ThresholdConfig::new(45.0, 65.0));
        assert_eq!(reset_thresholds(&guard).unwrap(), ThresholdConfig::default());

        complete_experiment(&guard, &experiment.id).unwrap();
        delete_experiment(&guard, &experiment.id).unwrap();
        assert!(list_experiments(&guard).is_empty());
        assert!(matches!(
            winner_recommendation(&guard, &experiment.id),
            Err(GuardError::UnknownExperiment(_))
        ));
    }
}
