use lns_schemas::RunStatistics;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of one run.
///
/// `NotStarted -> DirectoryLoading -> Partitioning -> Running -> Merging ->
/// {Completed | Degraded | CriticallyFailed}`. Any non-terminal state may
/// jump straight to `CriticallyFailed`; `Partitioning` may jump to
/// `Completed` when there is nothing to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    NotStarted,
    DirectoryLoading,
    Partitioning,
    Running,
    Merging,
    Completed,
    Degraded,
    CriticallyFailed,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::NotStarted => "not_started",
            RunState::DirectoryLoading => "directory_loading",
            RunState::Partitioning => "partitioning",
            RunState::Running => "running",
            RunState::Merging => "merging",
            RunState::Completed => "completed",
            RunState::Degraded => "degraded",
            RunState::CriticallyFailed => "critically_failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunState::Completed | RunState::Degraded | RunState::CriticallyFailed
        )
    }
}

/// Terminal classification of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Completed,
    Degraded,
    CriticallyFailed,
}

impl RunOutcome {
    /// Critical flag wins over errors; errors make the run degraded.
    pub fn classify(stats: &RunStatistics) -> Self {
        if stats.critical_failure {
            RunOutcome::CriticallyFailed
        } else if stats.errors > 0 {
            RunOutcome::Degraded
        } else {
            RunOutcome::Completed
        }
    }

    pub fn as_state(&self) -> RunState {
        match self {
            RunOutcome::Completed => RunState::Completed,
            RunOutcome::Degraded => RunState::Degraded,
            RunOutcome::CriticallyFailed => RunState::CriticallyFailed,
        }
    }
}

/// Result of one run. Always produced, even when the run fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub outcome: RunOutcome,
    pub statistics: RunStatistics,
    /// Subjects per partition, in partition order.
    pub partition_sizes: Vec<usize>,
    /// Reason for a critical failure.
    pub failure: Option<String>,
}

impl RunReport {
    pub fn is_critical(&self) -> bool {
        self.outcome == RunOutcome::CriticallyFailed
    }
}

/// Receives state transitions (e.g. the daemon's status surface).
pub trait RunObserver: Send + Sync {
    fn on_transition(&self, run_id: Uuid, state: RunState);
}
