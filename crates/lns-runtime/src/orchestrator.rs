//! Run driver: directory load, partitioning, bounded worker pool, merge,
//! classification.

use std::sync::Arc;

use chrono::Local;
use lns_config::ImportConfig;
use lns_db::RecordStore;
use lns_reconcile::{merge, merge_all, partition};
use lns_schemas::{RunStatistics, Subject};
use lns_source::SourceClient;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use crate::retry::RetryingFetcher;
use crate::worker::{build_directory, fetch_window, note_attempt, PartitionResult, PartitionWorker};
use crate::{Directory, ImportError, RunObserver, RunOutcome, RunReport, RunState};

pub struct Orchestrator {
    source: Arc<dyn SourceClient>,
    store: Arc<dyn RecordStore>,
    cfg: ImportConfig,
    observer: Option<Arc<dyn RunObserver>>,
}

impl Orchestrator {
    /// Validates `cfg` up front; an invalid configuration never starts a run.
    pub fn new(
        source: Arc<dyn SourceClient>,
        store: Arc<dyn RecordStore>,
        cfg: ImportConfig,
    ) -> Result<Self, ImportError> {
        cfg.validate()
            .map_err(|e| ImportError::InvalidConfiguration(e.to_string()))?;
        Ok(Self {
            source,
            store,
            cfg,
            observer: None,
        })
    }

    pub fn with_observer(mut self, observer: Arc<dyn RunObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn config(&self) -> &ImportConfig {
        &self.cfg
    }

    /// Reconcile every active subject.
    pub async fn run(&self) -> RunReport {
        let run_id = Uuid::new_v4();
        self.run_all(run_id)
            .instrument(tracing::info_span!("import_run", %run_id))
            .await
    }

    /// Reconcile one subject. Missing or inactive subjects fail the run.
    pub async fn run_for_subject(&self, subject_id: i64) -> RunReport {
        let run_id = Uuid::new_v4();
        self.run_one(run_id, subject_id)
            .instrument(tracing::info_span!("import_subject", %run_id, subject_id))
            .await
    }

    // -----------------------------------------------------------------------
    // Run bodies
    // -----------------------------------------------------------------------

    async fn run_all(&self, run_id: Uuid) -> RunReport {
        let deadline = Instant::now() + self.cfg.overall_timeout;
        let mut stats = RunStatistics::started_now();
        tracing::info!(
            batch_size = self.cfg.batch_size,
            parallelism = self.cfg.effective_parallelism(),
            days = self.cfg.days_to_import,
            "import run started"
        );

        self.transition(run_id, RunState::DirectoryLoading);
        let fetcher = self.fetcher(deadline);
        let loaded =
            tokio::time::timeout_at(deadline, self.load_directory(&fetcher, &mut stats)).await;
        let directory = match loaded {
            Ok(Ok(d)) => d,
            Ok(Err(e)) => return self.abort(run_id, stats, Vec::new(), e),
            Err(_) => return self.abort(run_id, stats, Vec::new(), self.timeout_error()),
        };

        self.transition(run_id, RunState::Partitioning);
        let subjects = match tokio::time::timeout_at(deadline, self.store.list_subjects()).await {
            Ok(Ok(s)) => s,
            Ok(Err(e)) => {
                let err = ImportError::SubjectLoadFailure(format!("{e:#}"));
                return self.abort(run_id, stats, Vec::new(), err);
            }
            Err(_) => return self.abort(run_id, stats, Vec::new(), self.timeout_error()),
        };
        if subjects.is_empty() {
            tracing::info!("no active subjects; nothing to import");
            return self.conclude(run_id, stats, Vec::new(), None);
        }
        let batches = match partition(&subjects, self.cfg.batch_size) {
            Ok(b) => b,
            Err(e) => {
                let err = ImportError::InvalidConfiguration(e.to_string());
                return self.abort(run_id, stats, Vec::new(), err);
            }
        };
        let sizes: Vec<usize> = batches.iter().map(Vec::len).collect();
        tracing::info!(
            subjects = subjects.len(),
            partitions = sizes.len(),
            "subjects partitioned"
        );

        self.transition(run_id, RunState::Running);
        let worker = match self.worker(directory, fetcher, deadline) {
            Ok(w) => Arc::new(w),
            Err(e) => return self.abort(run_id, stats, sizes, e),
        };
        let parts = match self.run_pool(worker, batches, deadline).await {
            Ok(parts) => parts,
            Err(e) => return self.abort(run_id, stats, sizes, e),
        };

        self.transition(run_id, RunState::Merging);
        let stats = merge(stats, &merge_all(&parts));
        self.conclude(run_id, stats, sizes, None)
    }

    async fn run_one(&self, run_id: Uuid, subject_id: i64) -> RunReport {
        let deadline = Instant::now() + self.cfg.overall_timeout;
        let mut stats = RunStatistics::started_now();

        let found = tokio::time::timeout_at(deadline, self.store.find_subject(subject_id)).await;
        let found = match found {
            Ok(found) => found,
            Err(_) => return self.abort(run_id, stats, Vec::new(), self.timeout_error()),
        };
        let subject = match found {
            Ok(Some(s)) if s.is_active() => s,
            Ok(Some(_)) => {
                let err = ImportError::SubjectUnavailable {
                    subject_id,
                    reason: "subject_inactive",
                };
                return self.abort(run_id, stats, Vec::new(), err);
            }
            Ok(None) => {
                let err = ImportError::SubjectUnavailable {
                    subject_id,
                    reason: "subject_not_found",
                };
                return self.abort(run_id, stats, Vec::new(), err);
            }
            Err(e) => {
                let err = ImportError::SubjectLoadFailure(format!("{e:#}"));
                return self.abort(run_id, stats, Vec::new(), err);
            }
        };

        self.transition(run_id, RunState::DirectoryLoading);
        let fetcher = self.fetcher(deadline);
        let loaded =
            tokio::time::timeout_at(deadline, self.load_directory(&fetcher, &mut stats)).await;
        let directory = match loaded {
            Ok(Ok(d)) => d,
            Ok(Err(e)) => return self.abort(run_id, stats, Vec::new(), e),
            Err(_) => return self.abort(run_id, stats, Vec::new(), self.timeout_error()),
        };

        self.transition(run_id, RunState::Partitioning);
        let sizes = vec![1];

        self.transition(run_id, RunState::Running);
        let worker = match self.worker(directory, fetcher, deadline) {
            Ok(w) => w,
            Err(e) => return self.abort(run_id, stats, sizes, e),
        };
        let result =
            tokio::time::timeout_at(deadline, worker.process_batch(0, vec![subject])).await;
        let part = match result {
            Ok(r) if !r.interrupted => r.stats,
            _ => return self.abort(run_id, stats, sizes, self.timeout_error()),
        };

        self.transition(run_id, RunState::Merging);
        let stats = merge(stats, &part);
        self.conclude(run_id, stats, sizes, None)
    }

    // -----------------------------------------------------------------------
    // Stages
    // -----------------------------------------------------------------------

    fn fetcher(&self, deadline: Instant) -> RetryingFetcher {
        // Validation guarantees 1..=20 attempts.
        let attempts = u32::try_from(self.cfg.max_retry_attempts).unwrap_or(1).max(1);
        RetryingFetcher {
            max_attempts: attempts,
            delay: self.cfg.retry_delay,
            deadline: Some(deadline),
        }
    }

    fn worker(
        &self,
        directory: Directory,
        fetcher: RetryingFetcher,
        deadline: Instant,
    ) -> Result<PartitionWorker, ImportError> {
        let window = fetch_window(Local::now().date_naive(), self.cfg.days_to_import)
            .ok_or_else(|| {
                ImportError::InvalidConfiguration(format!(
                    "days_to_import={} gives no valid fetch window",
                    self.cfg.days_to_import
                ))
            })?;
        Ok(PartitionWorker {
            source: Arc::clone(&self.source),
            store: Arc::clone(&self.store),
            directory: Arc::new(directory),
            fetcher,
            window,
            deadline,
        })
    }

    async fn load_directory(
        &self,
        fetcher: &RetryingFetcher,
        stats: &mut RunStatistics,
    ) -> Result<Directory, ImportError> {
        let entries = fetcher
            .fetch_observed(
                "fetch_directory",
                || self.source.fetch_directory(),
                |a| note_attempt(stats, a),
            )
            .await
            .map_err(|e| ImportError::DirectoryLoadFailure(e.to_string()))?;

        let directory = build_directory(entries);
        tracing::info!(
            source = self.source.source_name(),
            entries = directory.len(),
            "directory loaded"
        );
        Ok(directory)
    }

    /// One task per batch, at most `effective_parallelism` running at once.
    /// Waits until `deadline`; the JoinSet is shut down on every exit, which
    /// aborts tasks still in flight.
    async fn run_pool(
        &self,
        worker: Arc<PartitionWorker>,
        batches: Vec<Vec<Subject>>,
        deadline: Instant,
    ) -> Result<Vec<RunStatistics>, ImportError> {
        let permits = Arc::new(Semaphore::new(self.cfg.effective_parallelism()));
        let mut tasks = JoinSet::new();

        for (index, batch) in batches.into_iter().enumerate() {
            let worker = Arc::clone(&worker);
            let permits = Arc::clone(&permits);
            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await.ok();
                worker.process_batch(index, batch).await
            });
        }

        let collected = tokio::time::timeout_at(deadline, collect_partitions(&mut tasks)).await;
        let outcome = match collected {
            Ok(parts) if parts.iter().all(|p| !p.interrupted) => {
                Ok(parts.into_iter().map(|p| p.stats).collect())
            }
            _ => Err(self.timeout_error()),
        };
        tasks.shutdown().await;
        outcome
    }

    // -----------------------------------------------------------------------
    // Termination
    // -----------------------------------------------------------------------

    fn timeout_error(&self) -> ImportError {
        ImportError::RunTimeout {
            after: self.cfg.overall_timeout,
        }
    }

    fn abort(
        &self,
        run_id: Uuid,
        mut stats: RunStatistics,
        partition_sizes: Vec<usize>,
        err: ImportError,
    ) -> RunReport {
        tracing::error!(kind = err.kind(), error = %err, "import run failed");
        stats.critical_failure = true;
        stats.record_error(err.kind());
        self.conclude(run_id, stats, partition_sizes, Some(err.to_string()))
    }

    fn conclude(
        &self,
        run_id: Uuid,
        mut stats: RunStatistics,
        partition_sizes: Vec<usize>,
        failure: Option<String>,
    ) -> RunReport {
        stats.finish();
        let outcome = RunOutcome::classify(&stats);
        self.transition(run_id, outcome.as_state());
        tracing::info!(outcome = outcome.as_state().as_str(), %stats, "import run finished");
        RunReport {
            run_id,
            outcome,
            statistics: stats,
            partition_sizes,
            failure,
        }
    }

    fn transition(&self, run_id: Uuid, state: RunState) {
        tracing::debug!(state = state.as_str(), "run state");
        if let Some(o) = &self.observer {
            o.on_transition(run_id, state);
        }
    }
}

/// Drain the pool. A task that panicked or was cancelled counts as one error.
async fn collect_partitions(tasks: &mut JoinSet<PartitionResult>) -> Vec<PartitionResult> {
    let mut out = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(result) => out.push(result),
            Err(e) => {
                tracing::error!(error = %e, panic = e.is_panic(), "partition task failed");
                let mut stats = RunStatistics::default();
                stats.record_error("task_panicked");
                out.push(PartitionResult {
                    stats,
                    interrupted: false,
                });
            }
        }
    }
    out
}
