//! The periodic trigger waits one full interval before its first run, then
//! starts a run on every tick.

use std::sync::Arc;
use std::time::Duration;

use lns_daemon::state::{spawn_scheduler, AppState};
use lns_db::MemStore;
use lns_testkit::{fast_config, note, subject, FakeSource};

#[tokio::test(start_paused = true)]
async fn scheduler_fires_after_one_interval_then_repeats() {
    let store = Arc::new(MemStore::with_subjects([subject(1, &["c-1"])]));
    let source = Arc::new(FakeSource::new().with_records(
        "c-1",
        vec![note("n-1", "first", "amy", "2024-02-02 09:00:00")],
    ));
    let st = Arc::new(AppState::new(source.clone(), store.clone(), fast_config()).unwrap());

    spawn_scheduler(Arc::clone(&st), Duration::from_secs(100));

    tokio::time::sleep(Duration::from_secs(99)).await;
    assert_eq!(source.directory_calls(), 0, "no run at boot");
    assert!(st.last_report().await.is_none());

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(source.directory_calls(), 1);
    let report = st.last_report().await.expect("first scheduled run finished");
    assert_eq!(report.statistics.created, 1);

    tokio::time::sleep(Duration::from_secs(100)).await;
    assert_eq!(source.directory_calls(), 2);
    assert!(!st.is_running());
}
