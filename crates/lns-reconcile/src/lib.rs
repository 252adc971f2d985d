//! lns-reconcile
//!
//! Pure decision logic for the notes sync engine.
//!
//! - Subjects are split into contiguous batches (`partition`).
//! - Each incoming legacy note is validated and compared against the stored
//!   copy: CREATE, UPDATE, or SKIP (`decide`).
//! - Per-partition statistics are folded with an associative, commutative
//!   merge (`merge`).
//!
//! Deterministic, no IO. Wall-clock time enters only through `decide`, which
//! uses it as the fallback for unparseable source timestamps; `decide_at` and
//! `evaluate_at` take that instant explicitly.

mod decision;
mod partition;
mod stats;
mod timestamp;

pub use decision::{decide, decide_at, evaluate_at, Decision, Evaluation, SkipReason};
pub use partition::{partition, PartitionError};
pub use stats::{merge, merge_all};
pub use timestamp::{parse_source_timestamp, resolve_timestamp, ResolvedTimestamp, SOURCE_TS_FORMAT};
