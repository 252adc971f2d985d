//! Shared runtime state for lns-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. Runs are started from
//! here (HTTP trigger or scheduler) and are serialized by a single run lock:
//! a second trigger while a run is active is refused, never queued.

use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use std::time::{Duration, Instant};

use lns_config::ImportConfig;
use lns_db::RecordStore;
use lns_runtime::{ImportError, Orchestrator, RunObserver, RunReport, RunState};
use lns_source::SourceClient;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, OwnedMutexGuard, RwLock};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// BusMsg: SSE event bus payload
// ---------------------------------------------------------------------------

/// Messages broadcast over the internal event bus and surfaced as SSE events.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMsg {
    Heartbeat { ts_millis: i64 },
    Status(StatusSnapshot),
    Transition { run_id: Uuid, state: RunState },
    LogLine { level: String, msg: String },
}

impl BusMsg {
    /// SSE event name.
    pub fn event_name(&self) -> &'static str {
        match self {
            BusMsg::Heartbeat { .. } => "heartbeat",
            BusMsg::Status(_) => "status",
            BusMsg::Transition { .. } => "transition",
            BusMsg::LogLine { .. } => "log",
        }
    }
}

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

/// Static build metadata included in health responses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: String,
    pub version: String,
}

impl Default for BuildInfo {
    fn default() -> Self {
        Self {
            service: "lns-daemon".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// StatusSnapshot
// ---------------------------------------------------------------------------

/// Point-in-time view returned by GET /v1/status and carried inside SSE
/// `status` events.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub daemon_uptime_secs: u64,
    /// "idle" | "running"
    pub state: String,
    pub active_run_id: Option<Uuid>,
    /// Last state reported by the orchestrator, terminal once a run ends.
    pub run_state: Option<RunState>,
    pub last_report: Option<RunReport>,
}

/// Latest transition seen from the orchestrator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunProgress {
    pub run_id: Uuid,
    pub state: RunState,
}

// ---------------------------------------------------------------------------
// BusObserver
// ---------------------------------------------------------------------------

/// Forwards orchestrator transitions to the bus and the status surface.
///
/// `on_transition` is synchronous, so progress lives behind a std mutex.
pub struct BusObserver {
    bus: broadcast::Sender<BusMsg>,
    progress: Arc<Mutex<Option<RunProgress>>>,
}

impl RunObserver for BusObserver {
    fn on_transition(&self, run_id: Uuid, state: RunState) {
        *lock(&self.progress) = Some(RunProgress { run_id, state });
        let _ = self.bus.send(BusMsg::Transition { run_id, state });
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ---------------------------------------------------------------------------
// RunInProgress
// ---------------------------------------------------------------------------

/// Refusal returned when a trigger arrives while a run holds the run lock.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunInProgress;

impl std::fmt::Display for RunInProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("an import run is already in progress")
    }
}

impl std::error::Error for RunInProgress {}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// Handle shared (via `Arc`) across all Axum handlers and background tasks.
pub struct AppState {
    /// Broadcast bus for SSE.
    pub bus: broadcast::Sender<BusMsg>,
    /// Static build metadata.
    pub build: BuildInfo,
    pub orchestrator: Arc<Orchestrator>,
    pub store: Arc<dyn RecordStore>,
    /// Held for the whole duration of a run.
    pub run_lock: Arc<tokio::sync::Mutex<()>>,
    last_report: Arc<RwLock<Option<RunReport>>>,
    progress: Arc<Mutex<Option<RunProgress>>>,
}

impl AppState {
    /// Build the orchestrator around `source`/`store` with this state's bus
    /// observer attached. Fails on an invalid import configuration.
    pub fn new(
        source: Arc<dyn SourceClient>,
        store: Arc<dyn RecordStore>,
        cfg: ImportConfig,
    ) -> Result<Self, ImportError> {
        let (bus, _rx) = broadcast::channel::<BusMsg>(1024);
        let progress = Arc::new(Mutex::new(None));
        let observer = Arc::new(BusObserver {
            bus: bus.clone(),
            progress: Arc::clone(&progress),
        });
        let orchestrator =
            Orchestrator::new(source, Arc::clone(&store), cfg)?.with_observer(observer);

        Ok(Self {
            bus,
            build: BuildInfo::default(),
            orchestrator: Arc::new(orchestrator),
            store,
            run_lock: Arc::new(tokio::sync::Mutex::new(())),
            last_report: Arc::new(RwLock::new(None)),
            progress,
        })
    }

    pub fn is_running(&self) -> bool {
        self.run_lock.try_lock().is_err()
    }

    pub async fn last_report(&self) -> Option<RunReport> {
        self.last_report.read().await.clone()
    }

    pub async fn snapshot(&self) -> StatusSnapshot {
        let running = self.is_running();
        let progress = *lock(&self.progress);
        StatusSnapshot {
            daemon_uptime_secs: uptime_secs(),
            state: if running { "running" } else { "idle" }.to_string(),
            active_run_id: progress.filter(|_| running).map(|p| p.run_id),
            run_state: progress.map(|p| p.state),
            last_report: self.last_report().await,
        }
    }

    /// Start a full run in the background. Refused while another run holds
    /// the lock.
    pub fn try_start_run(self: &Arc<Self>) -> Result<(), RunInProgress> {
        let guard = self.acquire()?;
        let st = Arc::clone(self);
        tokio::spawn(async move {
            let report = st.orchestrator.run().await;
            st.finish(guard, report).await;
        });
        Ok(())
    }

    /// Run a single-subject import to completion. Refused while another run
    /// holds the lock.
    pub async fn run_subject(&self, subject_id: i64) -> Result<RunReport, RunInProgress> {
        let guard = self.acquire()?;
        let report = self.orchestrator.run_for_subject(subject_id).await;
        self.finish(guard, report.clone()).await;
        Ok(report)
    }

    fn acquire(&self) -> Result<OwnedMutexGuard<()>, RunInProgress> {
        Arc::clone(&self.run_lock)
            .try_lock_owned()
            .map_err(|_| RunInProgress)
    }

    async fn finish(&self, guard: OwnedMutexGuard<()>, report: RunReport) {
        let level = if report.is_critical() { "ERROR" } else { "INFO" };
        let msg = format!(
            "run {} finished: {} (created={} updated={} skipped={} errors={})",
            report.run_id,
            report.outcome.as_state().as_str(),
            report.statistics.created,
            report.statistics.updated,
            report.statistics.skipped,
            report.statistics.errors,
        );
        *self.last_report.write().await = Some(report);
        drop(guard);

        let _ = self.bus.send(BusMsg::LogLine {
            level: level.to_string(),
            msg,
        });
        let snap = self.snapshot().await;
        let _ = self.bus.send(BusMsg::Status(snap));
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Seconds since the first call in this process.
pub fn uptime_secs() -> u64 {
    static START: OnceLock<Instant> = OnceLock::new();
    START.get_or_init(Instant::now).elapsed().as_secs()
}

/// Spawn a background task that emits a heartbeat on the bus every `interval`.
pub fn spawn_heartbeat(bus: broadcast::Sender<BusMsg>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let ts = chrono::Utc::now().timestamp_millis();
            let _ = bus.send(BusMsg::Heartbeat { ts_millis: ts });
        }
    });
}

/// Spawn the periodic import trigger.
///
/// The first run fires one `interval` after startup. A tick that finds a run
/// in progress is skipped.
pub fn spawn_scheduler(state: Arc<AppState>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // interval() completes its first tick immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match state.try_start_run() {
                Ok(()) => tracing::info!("scheduled import run started"),
                Err(RunInProgress) => {
                    tracing::info!("scheduled import skipped: run in progress")
                }
            }
        }
    });
}
