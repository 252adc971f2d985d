use std::fmt;
use std::time::Duration;

/// Failures of the import runtime.
///
/// Record- and subject-level failures never surface as this type to callers
/// of `Orchestrator::run`; they are folded into `RunStatistics` counters. The
/// run itself always yields a `RunReport`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportError {
    /// One failed fetch attempt; retried while attempts remain.
    TransientFetch {
        operation: String,
        attempt: u32,
        message: String,
    },
    /// Every attempt failed. `last` is the final attempt's error.
    FetchExhausted {
        operation: String,
        attempts: u32,
        last: String,
    },
    /// Settings rejected before the run started.
    InvalidConfiguration(String),
    /// The directory could not be loaded; the run cannot proceed.
    DirectoryLoadFailure(String),
    /// The local subject list could not be loaded.
    SubjectLoadFailure(String),
    /// The run did not finish within its overall timeout.
    RunTimeout { after: Duration },
    /// A fetch was not started because the run deadline had passed.
    DeadlineExceeded { operation: String },
    /// Single-subject import target missing or not active.
    SubjectUnavailable { subject_id: i64, reason: &'static str },
}

impl ImportError {
    /// Stable `errors_by_kind` key.
    pub fn kind(&self) -> &'static str {
        match self {
            ImportError::TransientFetch { .. } => "transient_fetch",
            ImportError::FetchExhausted { .. } => "fetch_exhausted",
            ImportError::InvalidConfiguration(_) => "invalid_configuration",
            ImportError::DirectoryLoadFailure(_) => "directory_load_failure",
            ImportError::SubjectLoadFailure(_) => "subject_load_failure",
            ImportError::RunTimeout { .. } => "run_timeout",
            ImportError::DeadlineExceeded { .. } => "deadline_exceeded",
            ImportError::SubjectUnavailable { reason, .. } => reason,
        }
    }
}

impl fmt::Display for ImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportError::TransientFetch {
                operation,
                attempt,
                message,
            } => write!(f, "{operation} attempt {attempt} failed: {message}"),
            ImportError::FetchExhausted {
                operation,
                attempts,
                last,
            } => write!(
                f,
                "{operation} failed after {attempts} attempt(s); last error: {last}"
            ),
            ImportError::InvalidConfiguration(msg) => write!(f, "invalid configuration: {msg}"),
            ImportError::DirectoryLoadFailure(msg) => write!(f, "directory load failed: {msg}"),
            ImportError::SubjectLoadFailure(msg) => write!(f, "subject load failed: {msg}"),
            ImportError::RunTimeout { after } => {
                write!(f, "run timed out after {}s", after.as_secs())
            }
            ImportError::DeadlineExceeded { operation } => {
                write!(f, "{operation} not attempted: run deadline exceeded")
            }
            ImportError::SubjectUnavailable { subject_id, reason } => {
                write!(f, "subject {subject_id} unavailable: {reason}")
            }
        }
    }
}

impl std::error::Error for ImportError {}
