//! Reconciliation decision rules.
//!
//! # Invariants under test
//!
//! 1. Blank external id or blank payload always SKIPs, whatever is stored.
//! 2. No stored copy: CREATE.
//! 3. Strictly newer incoming: UPDATE; equal or older: SKIP.
//! 4. Same inputs always give the same decision.
//! 5. Applying a CREATE and reconciling the same record again gives SKIP.
//! 6. Stored last-modified never moves backward through UPDATE.

use chrono::{NaiveDate, NaiveDateTime};
use lns_reconcile::{decide, decide_at, evaluate_at, Decision, SkipReason};
use lns_schemas::{SourceRecord, StoredRecord};

fn now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 6, 1)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
}

fn ts(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
}

fn incoming(id: &str, payload: &str, modified: &str) -> SourceRecord {
    SourceRecord::new(id, payload, "nurse.kim", "2024-05-01 09:00:00 CDT", modified)
}

fn stored_at(modified: &str) -> StoredRecord {
    StoredRecord {
        id: Some(77),
        external_id: Some("n-1".to_string()),
        subject_id: 1,
        payload: "stored".to_string(),
        created_at: ts("2024-05-01 09:00:00"),
        last_modified_at: ts(modified),
        created_by: Some(1),
        last_modified_by: Some(1),
    }
}

#[test]
fn blank_id_or_payload_skips_regardless_of_state() {
    let existing = stored_at("2024-05-01 09:00:00");
    let cases = [
        (incoming("", "text", "2024-05-02 09:00:00"), SkipReason::MissingExternalId),
        (incoming("   ", "text", "2024-05-02 09:00:00"), SkipReason::MissingExternalId),
        (incoming("n-1", "", "2024-05-02 09:00:00"), SkipReason::BlankPayload),
        (incoming("n-1", " \t\n", "2024-05-02 09:00:00"), SkipReason::BlankPayload),
    ];
    for (rec, reason) in cases {
        for ex in [None, Some(&existing)] {
            let ev = evaluate_at(ex, &rec, now());
            assert_eq!(ev.decision, Decision::Skip(reason));
        }
    }

    let mut null_payload = incoming("n-1", "x", "2024-05-02 09:00:00");
    null_payload.payload = None;
    assert_eq!(
        evaluate_at(None, &null_payload, now()).decision,
        Decision::Skip(SkipReason::BlankPayload)
    );
}

#[test]
fn absent_stored_copy_creates() {
    let ev = evaluate_at(None, &incoming("n-1", "text", "2024-05-02 10:00:00 CDT"), now());
    assert_eq!(
        ev.decision,
        Decision::Create {
            created_at: ts("2024-05-01 09:00:00"),
            last_modified_at: ts("2024-05-02 10:00:00"),
        }
    );
}

#[test]
fn newer_updates_older_or_equal_skips() {
    let existing = stored_at("2024-05-02 10:00:00");

    let newer = evaluate_at(Some(&existing), &incoming("n-1", "t", "2024-05-02 10:00:01"), now());
    assert!(matches!(newer.decision, Decision::Update { .. }));

    let equal = evaluate_at(Some(&existing), &incoming("n-1", "t", "2024-05-02 10:00:00"), now());
    assert_eq!(equal.decision, Decision::Skip(SkipReason::NotNewer));

    let older = evaluate_at(Some(&existing), &incoming("n-1", "t", "2024-05-01 10:00:00"), now());
    assert_eq!(older.decision, Decision::Skip(SkipReason::NotNewer));
}

#[test]
fn decision_is_deterministic() {
    let existing = stored_at("2024-05-02 10:00:00");
    let rec = incoming("n-1", "t", "2024-05-03 10:00:00");
    let first = evaluate_at(Some(&existing), &rec, now());
    for _ in 0..10 {
        assert_eq!(evaluate_at(Some(&existing), &rec, now()), first);
        assert_eq!(decide_at(Some(&existing), &rec, now()), first.decision);
    }
    // Parseable timestamps never consult the clock.
    assert_eq!(decide(Some(&existing), &rec), first.decision);
}

#[test]
fn create_then_skip_on_reapplication() {
    let rec = incoming("n-1", "text", "2024-05-02 10:00:00");

    let first = evaluate_at(None, &rec, now());
    assert!(matches!(first.decision, Decision::Create { .. }));
    let persisted = first.decision.apply(None, &rec, 1, 5).unwrap();

    let second = evaluate_at(Some(&persisted), &rec, now());
    assert_eq!(second.decision, Decision::Skip(SkipReason::NotNewer));
}

#[test]
fn last_modified_never_moves_backward() {
    let mut current = stored_at("2024-05-02 10:00:00");
    let feed = [
        "2024-05-03 10:00:00",
        "2024-05-01 10:00:00",
        "2024-05-04 10:00:00",
        "2024-05-02 23:59:59",
    ];
    for modified in feed {
        let rec = incoming("n-1", modified, modified);
        let ev = evaluate_at(Some(&current), &rec, now());
        if let Some(next) = ev.decision.apply(Some(&current), &rec, 1, 2) {
            assert!(next.last_modified_at > current.last_modified_at);
            current = next;
        }
    }
    assert_eq!(current.last_modified_at, ts("2024-05-04 10:00:00"));
    assert_eq!(current.payload, "2024-05-04 10:00:00");
}
