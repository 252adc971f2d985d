//! lns-runtime
//!
//! Drives a reconciliation run: loads the legacy directory, partitions the
//! active subjects, reconciles each partition on a bounded task pool, merges
//! the per-partition statistics, and classifies the run.
//!
//! Pure decisions live in `lns-reconcile`; IO sits behind `lns_source::SourceClient`
//! and `lns_db::RecordStore`.

mod error;
mod orchestrator;
mod resolver;
mod retry;
mod state;
mod worker;

pub use error::ImportError;
pub use orchestrator::Orchestrator;
pub use resolver::{normalize_login, ResolvedActor, UserResolver};
pub use retry::{FetchAttempt, RetryingFetcher};
pub use state::{RunObserver, RunOutcome, RunReport, RunState};
pub use worker::{build_directory, fetch_window, Directory};
