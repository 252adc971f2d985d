//! 250 subjects, batch 100, parallelism 4: three partitions of 100, 100, 50,
//! every subject reconciled once, and never more tasks in flight than allowed.

use std::sync::Arc;
use std::time::Duration;

use lns_config::ImportConfig;
use lns_db::MemStore;
use lns_runtime::{Orchestrator, RunOutcome};
use lns_testkit::{fast_config, note, numbered_subjects, FakeSource};

fn source_for(n: i64) -> FakeSource {
    (1..=n).fold(FakeSource::new(), |src, id| {
        src.with_records(
            &format!("k-{id}"),
            vec![note(&format!("n-{id}"), "text", "amy", "2024-02-02 09:00:00")],
        )
    })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn two_hundred_fifty_subjects_make_three_partitions() {
    let store = Arc::new(MemStore::with_subjects(numbered_subjects(250)));
    let cfg = ImportConfig {
        batch_size: 100,
        parallelism: 4,
        ..fast_config()
    };
    let orch = Orchestrator::new(Arc::new(source_for(250)), store.clone(), cfg).unwrap();

    let report = orch.run().await;

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.partition_sizes, vec![100, 100, 50]);
    assert_eq!(report.statistics.created, 250);
    assert_eq!(report.statistics.detail.subjects_processed, 250);
    assert_eq!(report.statistics.detail.actors_created, 1);
    assert_eq!(store.records().await.len(), 250);
    assert_eq!(store.actors().await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn pool_never_exceeds_parallelism() {
    let store = Arc::new(MemStore::with_subjects(numbered_subjects(12)));
    let source = Arc::new(source_for(12).with_record_delay(Duration::from_millis(50)));
    let cfg = ImportConfig {
        batch_size: 2,
        parallelism: 2,
        ..fast_config()
    };
    let orch = Orchestrator::new(source.clone(), store, cfg).unwrap();

    let report = orch.run().await;
    assert_eq!(report.partition_sizes.len(), 6);
    assert_eq!(report.statistics.created, 12);
    assert!(source.max_in_flight() <= 2, "saw {}", source.max_in_flight());
}

#[tokio::test(start_paused = true)]
async fn disabled_parallelism_runs_one_partition_at_a_time() {
    let store = Arc::new(MemStore::with_subjects(numbered_subjects(6)));
    let source = Arc::new(source_for(6).with_record_delay(Duration::from_millis(50)));
    let cfg = ImportConfig {
        batch_size: 2,
        parallelism: 8,
        parallelism_enabled: false,
        ..fast_config()
    };
    let orch = Orchestrator::new(source.clone(), store, cfg).unwrap();

    let report = orch.run().await;
    assert_eq!(report.statistics.created, 6);
    assert_eq!(source.max_in_flight(), 1);
}
