// tests/feedback_ledger.rs
//
// File-backed ledger behaviour: upsert, offsets, clear, persistence across
// reopen, tolerance of corrupt files and loosely typed legacy records, and
// concurrent writers.

use std::sync::Arc;

use conversation_sentiment::error::FeedbackError;
use conversation_sentiment::feedback::{FeedbackLedger, FeedbackSubmission, FEEDBACK_FILE};
use conversation_sentiment::SentimentLevel;

fn ledger() -> (tempfile::TempDir, FeedbackLedger) {
    let dir = tempfile::tempdir().expect("tempdir");
    let ledger = FeedbackLedger::open(dir.path()).expect("open ledger");
    (dir, ledger)
}

fn correction(id: &str, original: &str, corrected: &str) -> FeedbackSubmission {
    FeedbackSubmission::new(id, original, corrected, 50.0)
}

#[test]
fn empty_ledger_has_zero_offset() {
    let (_dir, ledger) = ledger();
    let off = ledger.correction_offsets();
    assert_eq!(off.score_offset, 0.0);
    assert!(off.label_shifts.is_empty());
    assert_eq!(off.count, 0);
    assert_eq!(ledger.stats().total, 0);
}

#[test]
fn upsert_keeps_one_record_per_conversation() {
    let (_dir, ledger) = ledger();
    ledger.save(&correction("c1", "neutral", "positive")).unwrap();
    ledger.save(&correction("c2", "negative", "neutral")).unwrap();
    ledger.save(&correction("c1", "neutral", "very_positive")).unwrap();

    let records = ledger.records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].conversation_id, "c2");
    assert_eq!(records[1].conversation_id, "c1");
    assert_eq!(records[1].corrected_label, "very_positive");
    assert!(!records[1].timestamp.is_empty());
}

#[test]
fn offset_follows_mean_level_shift() {
    let (_dir, ledger) = ledger();
    ledger.save(&correction("a", "neutral", "slightly_positive")).unwrap();
    ledger.save(&correction("b", "Neutral", "Slightly Positive")).unwrap();
    ledger.save(&correction("c", "negative", "very_negative")).unwrap();

    let off = ledger.correction_offsets();
    assert_eq!(off.score_offset, 4.76);
    assert_eq!(off.count, 3);
    assert_eq!(off.label_shifts[&SentimentLevel::Neutral], 1.0);
    assert_eq!(off.label_shifts[&SentimentLevel::Negative], -1.0);
    assert!(off.is_active());
}

#[test]
fn offset_reflects_latest_ledger_state() {
    let (_dir, ledger) = ledger();
    ledger.save(&correction("a", "neutral", "positive")).unwrap();
    assert_eq!(ledger.correction_offsets().score_offset, 28.57);

    ledger.save(&correction("a", "neutral", "slightly_negative")).unwrap();
    assert_eq!(ledger.correction_offsets().score_offset, -14.29);
}

#[test]
fn clear_then_offsets_round_trip() {
    let (_dir, ledger) = ledger();
    ledger.save(&correction("a", "neutral", "positive")).unwrap();
    ledger.save(&correction("b", "positive", "neutral")).unwrap();

    assert_eq!(ledger.clear().unwrap(), 2);
    let off = ledger.correction_offsets();
    assert_eq!(off.score_offset, 0.0);
    assert!(off.label_shifts.is_empty());
    assert_eq!(off.count, 0);
    assert!(ledger.records().is_empty());
}

#[test]
fn validation_errors_write_nothing() {
    let (dir, ledger) = ledger();
    let err = ledger
        .save(&correction("a", "neutral", "neutral"))
        .unwrap_err();
    assert!(matches!(err, FeedbackError::NoOpCorrection(_)));
    assert!(err.is_validation());

    let err = ledger.save(&correction("", "neutral", "positive")).unwrap_err();
    assert!(matches!(err, FeedbackError::MissingField("conversation_id")));

    assert!(!dir.path().join(FEEDBACK_FILE).exists());
}

#[test]
fn unknown_labels_are_stored_but_not_counted() {
    let (_dir, ledger) = ledger();
    ledger.save(&correction("a", "Mixed", "positive")).unwrap();

    let records = ledger.records();
    assert_eq!(records[0].original_label, "Mixed");
    assert_eq!(ledger.correction_offsets().count, 0);
    assert_eq!(ledger.stats().corrections_by_label["Mixed"]["positive"], 1);
}

#[test]
fn records_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let ledger = FeedbackLedger::open(dir.path()).unwrap();
        ledger.save(&correction("a", "very_negative", "negative")).unwrap();
    }
    let reopened = FeedbackLedger::open(dir.path()).unwrap();
    assert_eq!(reopened.records().len(), 1);
    assert_eq!(reopened.correction_offsets().score_offset, 14.29);

    // The on-disk layout is a plain JSON array of records.
    let raw = std::fs::read_to_string(dir.path().join(FEEDBACK_FILE)).unwrap();
    let v: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(v[0]["conversation_id"], "a");
    assert_eq!(v[0]["original_score"], 50.0);
}

#[test]
fn corrupt_file_reads_as_empty_and_is_replaced_on_save() {
    let (dir, ledger) = ledger();
    std::fs::write(dir.path().join(FEEDBACK_FILE), "{not json").unwrap();

    assert!(ledger.records().is_empty());
    assert_eq!(ledger.correction_offsets().count, 0);

    ledger.save(&correction("a", "neutral", "positive")).unwrap();
    assert_eq!(ledger.records().len(), 1);

    // The unparseable original is kept next to the rewritten ledger.
    let backup = std::fs::read_to_string(ledger.corrupt_path()).unwrap();
    assert_eq!(backup, "{not json");
    assert_eq!(
        ledger.corrupt_path(),
        dir.path().join(format!("{FEEDBACK_FILE}.corrupt"))
    );
}

#[test]
fn legacy_records_with_loose_types_survive_a_save() {
    let (dir, ledger) = ledger();
    let legacy = serde_json::json!([
        {
            "conversation_id": "a",
            "original_label": "neutral",
            "corrected_label": "positive",
            "original_score": 48.5,
            "timestamp": "2024-05-01T10:00:00+00:00"
        },
        {
            "conversation_id": 7,
            "original_label": "negative",
            "corrected_label": "neutral",
            "original_score": null
        },
        {
            "conversation_id": "c",
            "original_label": "positive",
            "corrected_label": "very_positive"
        },
        "not a record",
        {
            "conversation_id": ["x"],
            "original_label": "neutral",
            "corrected_label": "negative"
        }
    ]);
    std::fs::write(dir.path().join(FEEDBACK_FILE), legacy.to_string()).unwrap();

    let records = ledger.records();
    assert_eq!(records.len(), 3);
    assert_eq!(records[1].conversation_id, "7");
    assert_eq!(records[1].original_score, 50.0);
    assert_eq!(records[2].original_score, 50.0);
    assert_eq!(records[2].timestamp, "");
    assert_eq!(ledger.correction_offsets().count, 3);

    ledger.save(&correction("b", "very_negative", "negative")).unwrap();

    let ids: Vec<_> = ledger
        .records()
        .into_iter()
        .map(|r| r.conversation_id)
        .collect();
    assert_eq!(ids, ["a", "7", "c", "b"]);
    assert_eq!(ledger.records()[0].original_score, 48.5);

    // Entries that could not be read are preserved in the backup copy.
    let backup: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(ledger.corrupt_path()).unwrap()).unwrap();
    assert_eq!(backup, legacy);
}

#[test]
fn numeric_ids_upsert_against_legacy_records() {
    let (dir, ledger) = ledger();
    std::fs::write(
        dir.path().join(FEEDBACK_FILE),
        r#"[{"conversation_id": 7, "original_label": "negative", "corrected_label": "neutral"}]"#,
    )
    .unwrap();

    let mut replacement = correction("ignored", "negative", "very_negative");
    replacement.conversation_id = Some(serde_json::json!(7));
    ledger.save(&replacement).unwrap();

    let records = ledger.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].corrected_label, "very_negative");
    // A clean file leaves no backup behind.
    assert!(!ledger.corrupt_path().exists());
}

#[test]
fn concurrent_saves_lose_nothing() {
    let (_dir, ledger) = ledger();
    let ledger = Arc::new(ledger);

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let ledger = Arc::clone(&ledger);
            std::thread::spawn(move || {
                for i in 0..10 {
                    ledger
                        .save(&correction(&format!("t{t}-{i}"), "neutral", "positive"))
                        .unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(ledger.records().len(), 80);
    assert_eq!(ledger.stats().corrections_by_label["neutral"]["positive"], 80);
}
