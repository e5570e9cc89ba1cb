use std::sync::Arc;

use super::export::attempts_to_csv;
use super::{AdjustDirection, AttemptLedger, AttemptStats, ExportFormat, LedgerExport};
use crate::error::GuardError;
use crate::logic::scoring::{recommend, Recommendation, ScoringOutcome};
use crate::logic::storage::MemoryStorage;
use crate::logic::threshold::{ThresholdConfig, ThresholdStore};

fn outcome(score: u32, confidence: u32) -> ScoringOutcome {
    ScoringOutcome {
        score,
        confidence,
        triggers: vec![format!("score {}", score)],
        recommendation: recommend(score),
    }
}

fn new_ledger(capacity: usize) -> (Arc<MemoryStorage>, AttemptLedger) {
    let storage = Arc::new(MemoryStorage::new());
    let ledger = AttemptLedger::with_capacity(storage.clone(), capacity);
    (storage, ledger)
}

#[test]
fn test_record_and_list_in_order() {
    let (_storage, ledger) = new_ledger(100);
    let a = ledger.record(&outcome(10, 5)).unwrap();
    let b = ledger.record(&outcome(70, 40)).unwrap();
    assert_ne!(a, b);

    let attempts = ledger.list();
    assert_eq!(attempts.len(), 2);
    assert_eq!(attempts[0].id, a);
    assert_eq!(attempts[1].id, b);
    assert_eq!(attempts[1].recommendation, Recommendation::Block);
    assert!(!attempts[1].is_false_positive);
    assert_eq!(ledger.get(&b).unwrap().score, 70);
}

#[test]
fn test_default_capacity() {
    let storage = Arc::new(MemoryStorage::new());
    assert_eq!(AttemptLedger::new(storage).capacity(), 1000);
}

#[test]
fn test_cap_keeps_most_recent_in_order() {
    let (_storage, ledger) = new_ledger(50);
    let ids: Vec<String> = (0..60)
        .map(|i| ledger.record(&outcome(i, 0)).unwrap())
        .collect();

    let attempts = ledger.list();
    assert_eq!(attempts.len(), 50);
    let kept: Vec<String> = attempts.into_iter().map(|a| a.id).collect();
    assert_eq!(kept, ids[10..].to_vec());
}

#[test]
fn test_capacity_error_shrinks_to_half() {
    let (storage, ledger) = new_ledger(10);
    for i in 0..10 {
        ledger.record(&outcome(i, 0)).unwrap();
    }
    let full = storage.bytes_used();
    storage.set_quota(Some(full * 3 / 4));

    let id = ledger.record(&outcome(99, 50)).unwrap();

    let attempts = ledger.list();
    assert_eq!(attempts.len(), 5);
    assert_eq!(attempts.last().unwrap().id, id);
    assert_eq!(attempts[0].score, 6);
}

#[test]
fn test_capacity_retry_failure_drops_write() {
    let (storage, ledger) = new_ledger(10);
    for i in 0..3 {
        ledger.record(&outcome(i, 0)).unwrap();
    }
    let before = ledger.list();
    storage.set_quota(Some(10));

    let result = ledger.record(&outcome(50, 10));
    assert!(matches!(result, Err(GuardError::Capacity(_))));
    assert_eq!(ledger.list(), before);
}

#[test]
fn test_mark_false_positive() {
    let (_storage, ledger) = new_ledger(10);
    let id = ledger.record(&outcome(45, 20)).unwrap();

    assert!(ledger.mark_false_positive(&id, true).unwrap());
    assert!(ledger.get(&id).unwrap().is_false_positive);

    assert!(ledger.mark_false_positive(&id, false).unwrap());
    assert!(!ledger.get(&id).unwrap().is_false_positive);

    assert!(!ledger.mark_false_positive("missing", true).unwrap());
}

#[test]
fn test_clear() {
    let (_storage, ledger) = new_ledger(10);
    ledger.record(&outcome(1, 1)).unwrap();
    ledger.clear().unwrap();
    assert!(ledger.list().is_empty());
}

#[test]
fn test_stats_empty() {
    let (_storage, ledger) = new_ledger(10);
    assert_eq!(ledger.stats(), AttemptStats::default());
    assert_eq!(ledger.stats().false_positive_rate, 0.0);
}

#[test]
fn test_stats_single_pass_values() {
    let (_storage, ledger) = new_ledger(10);
    ledger.record(&outcome(10, 10)).unwrap();
    let challenged = ledger.record(&outcome(40, 20)).unwrap();
    ledger.record(&outcome(70, 25)).unwrap();
    ledger.mark_false_positive(&challenged, true).unwrap();

    let stats = ledger.stats();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.avg_score, 40.0);
    assert_eq!(stats.avg_confidence, 18.3);
    assert_eq!(stats.allowed_count, 1);
    assert_eq!(stats.challenged_count, 1);
    assert_eq!(stats.blocked_count, 1);
    assert_eq!(stats.false_positive_count, 1);
    assert_eq!(stats.false_positive_rate, 33.3);
}

#[test]
fn test_no_recommendation_below_twenty_attempts() {
    let (_storage, ledger) = new_ledger(100);
    for _ in 0..19 {
        let id = ledger.record(&outcome(50, 10)).unwrap();
        ledger.mark_false_positive(&id, true).unwrap();
    }
    assert!(ledger.threshold_recommendation(&ThresholdConfig::default()).is_none());
}

#[test]
fn test_recommends_raise_on_high_false_positive_rate() {
    let (_storage, ledger) = new_ledger(100);
    for i in 0..10 {
        let id = ledger.record(&outcome(40, 20)).unwrap();
        if i < 3 {
            ledger.mark_false_positive(&id, true).unwrap();
        }
    }
    for _ in 0..10 {
        ledger.record(&outcome(5, 5)).unwrap();
    }

    let rec = ledger.threshold_recommendation(&ThresholdConfig::default()).unwrap();
    assert_eq!(rec.direction, AdjustDirection::Raise);
    assert_eq!(rec.flagged_false_positive_rate, 30.0);
    assert_eq!(rec.suggested, ThresholdConfig::new(40.0, 65.0));
}

#[test]
fn test_recommends_lower_on_near_misses() {
    let (_storage, ledger) = new_ledger(100);
    for _ in 0..5 {
        ledger.record(&outcome(30, 15)).unwrap();
    }
    for _ in 0..15 {
        ledger.record(&outcome(5, 5)).unwrap();
    }

    let rec = ledger.threshold_recommendation(&ThresholdConfig::default()).unwrap();
    assert_eq!(rec.direction, AdjustDirection::Lower);
    assert_eq!(rec.suggested, ThresholdConfig::new(30.0, 55.0));
    assert!(rec.reason.contains("5 allowed attempts"));
}

#[test]
fn test_no_recommendation_in_middle_band() {
    let (_storage, ledger) = new_ledger(100);
    // 1 of 10 flagged attempts is a false positive: 10%, neither > 20 nor < 5
    for i in 0..10 {
        let id = ledger.record(&outcome(65, 30)).unwrap();
        if i == 0 {
            ledger.mark_false_positive(&id, true).unwrap();
        }
    }
    for _ in 0..10 {
        ledger.record(&outcome(30, 10)).unwrap();
    }
    assert!(ledger.threshold_recommendation(&ThresholdConfig::default()).is_none());

    // Quiet traffic: nothing to act on
    let (_storage, quiet) = new_ledger(100);
    for _ in 0..20 {
        quiet.record(&outcome(5, 5)).unwrap();
    }
    assert!(quiet.threshold_recommendation(&ThresholdConfig::default()).is_none());
}

#[test]
fn test_export_import_round_trip() {
    let storage = Arc::new(MemoryStorage::new());
    let ledger = AttemptLedger::new(storage.clone());
    let thresholds = ThresholdStore::new(storage.clone());

    for score in [5, 20, 40, 55, 75, 90] {
        ledger.record(&outcome(score, score / 2)).unwrap();
    }
    let flagged = ledger.list()[3].id.clone();
    ledger.mark_false_positive(&flagged, true).unwrap();
    thresholds.set(ThresholdConfig::new(42.0, 66.0)).unwrap();

    let export = LedgerExport::capture(&ledger, &thresholds);
    let json = export.to_json().unwrap();

    let fresh = Arc::new(MemoryStorage::new());
    let fresh_ledger = AttemptLedger::new(fresh.clone());
    let fresh_thresholds = ThresholdStore::new(fresh.clone());
    LedgerExport::from_json(&json)
        .unwrap()
        .restore(&fresh_ledger, &fresh_thresholds)
        .unwrap();

    assert_eq!(fresh_ledger.stats(), ledger.stats());
    assert_eq!(fresh_ledger.list(), ledger.list());
    assert_eq!(fresh_thresholds.get(), ThresholdConfig::new(42.0, 66.0));
}

#[test]
fn test_import_rejects_invalid_thresholds_without_writing() {
    let storage = Arc::new(MemoryStorage::new());
    let ledger = AttemptLedger::new(storage.clone());
    let thresholds = ThresholdStore::new(storage.clone());
    ledger.record(&outcome(10, 10)).unwrap();

    let mut export = LedgerExport::capture(&ledger, &thresholds);
    export.attempts.clear();
    export.thresholds = ThresholdConfig::new(70.0, 60.0);

    assert!(matches!(
        export.restore(&ledger, &thresholds),
        Err(GuardError::Validation(_))
    ));
    assert_eq!(ledger.list().len(), 1);
}

#[test]
fn test_csv_export() {
    let (_storage, ledger) = new_ledger(10);
    let mut scored = outcome(40, 20);
    scored.triggers = vec!["Form filled too quickly".to_string(), "say \"hi\"".to_string()];
    let id = ledger.record(&scored).unwrap();

    let csv = attempts_to_csv(&ledger.list());
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "id,timestamp,score,confidence,recommendation,isFalsePositive,triggers");
    assert!(lines[1].starts_with(&id));
    assert!(lines[1].contains(",40,20,challenge,false,"));
    assert!(lines[1].ends_with("\"Form filled too quickly; say \"\"hi\"\"\""));
}

#[test]
fn test_write_export_files() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(MemoryStorage::new());
    let ledger = AttemptLedger::new(storage.clone());
    let thresholds = ThresholdStore::new(storage);
    ledger.record(&outcome(65, 30)).unwrap();

    let export = LedgerExport::capture(&ledger, &thresholds);
    let json_path = dir.path().join("ledger.json");
    let csv_path = dir.path().join("ledger.csv");

    assert_eq!(export.write_to(&json_path, ExportFormat::Json).unwrap(), 1);
    assert_eq!(export.write_to(&csv_path, ExportFormat::Csv).unwrap(), 1);

    let loaded = LedgerExport::from_json(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(loaded, export);
    assert_eq!(std::fs::read_to_string(&csv_path).unwrap().lines().count(), 2);
}

#[test]
fn test_unreadable_log_is_not_overwritten() {
    use crate::constants::ATTEMPTS_KEY;
    use crate::logic::storage::Storage;

    let (storage, ledger) = new_ledger(10);
    storage.set(ATTEMPTS_KEY, &serde_json::json!({"corrupt": true})).unwrap();

    assert!(matches!(ledger.record(&outcome(10, 5)), Err(GuardError::Storage(_))));
    assert!(ledger.mark_false_positive("any", true).is_err());
    assert!(ledger.replace_all(Vec::new()).is_err());
    assert_eq!(
        storage.get(ATTEMPTS_KEY).unwrap(),
        Some(serde_json::json!({"corrupt": true}))
    );

    // Queries degrade to empty; clear discards the blob
    assert!(ledger.list().is_empty());
    ledger.clear().unwrap();
    assert!(ledger.record(&outcome(10, 5)).is_ok());
}

#[test]
fn test_set_false_positive_returns_previous_state() {
    use super::Attempt;
    use crate::logic::experiment::Arm;

    let (_storage, ledger) = new_ledger(10);
    let attempt = Attempt::from_outcome(&outcome(40, 20))
        .with_decision(Recommendation::Allow)
        .with_experiment("exp-1", Arm::Control);
    let id = ledger.record_attempt(attempt).unwrap();

    let previous = ledger.set_false_positive(&id, true).unwrap().unwrap();
    assert!(!previous.is_false_positive);
    assert_eq!(previous.recommendation, Recommendation::Allow);
    assert_eq!(previous.experiment_id.as_deref(), Some("exp-1"));
    assert_eq!(previous.arm, Some(Arm::Control));

    assert!(ledger.set_false_positive(&id, true).unwrap().unwrap().is_false_positive);
    assert!(ledger.set_false_positive("missing", true).unwrap().is_none());
}
