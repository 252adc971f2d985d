//! Importing the same source twice creates once, then skips everything.
//! Skip reasons for invalid records hold on both passes.

use std::sync::Arc;

use lns_db::MemStore;
use lns_runtime::{Orchestrator, RunOutcome};
use lns_testkit::{
    fast_config, fixture_path, load_directory_json, load_records_json, subject, FakeSource,
};

#[tokio::test]
async fn second_pass_only_skips() {
    let directory = load_directory_json(&fixture_path("directory_small.json")).unwrap();
    let notes = load_records_json(&fixture_path("notes_c-100.json")).unwrap();
    assert_eq!(notes.len(), 4);

    let store = Arc::new(MemStore::with_subjects([subject(7, &["c-100", "c-200"])]));
    let source = Arc::new(
        FakeSource::new()
            .with_entries(directory)
            .with_records("c-100", notes),
    );
    let orch = Orchestrator::new(source.clone(), store.clone(), fast_config()).unwrap();

    let first = orch.run().await;
    assert_eq!(first.outcome, RunOutcome::Completed);
    // Two valid notes; blank payload and missing guid are skipped.
    assert_eq!(
        (first.statistics.created, first.statistics.skipped),
        (2, 2)
    );
    assert_eq!(source.record_calls("c-200"), 1);

    let second = orch.run().await;
    assert_eq!(second.outcome, RunOutcome::Completed);
    assert_eq!(
        (second.statistics.created, second.statistics.updated, second.statistics.skipped),
        (0, 0, 4)
    );

    // Blank author resolves to the system actor.
    let logins: Vec<String> = store.actors().await.into_iter().map(|a| a.login).collect();
    assert_eq!(logins, vec!["nurse.kim".to_string(), "system".to_string()]);
}
