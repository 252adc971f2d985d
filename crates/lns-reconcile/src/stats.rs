use lns_schemas::{RunDetail, RunStatistics};

/// Fold `source` into `target`.
///
/// Counters add, `critical_failure` ORs, the time span widens to cover both
/// (earliest start, latest finish), detail maps add key-wise. Associative and
/// commutative, so partition results may be folded in any order.
pub fn merge(mut target: RunStatistics, source: &RunStatistics) -> RunStatistics {
    target.created += source.created;
    target.updated += source.updated;
    target.skipped += source.skipped;
    target.errors += source.errors;
    target.critical_failure |= source.critical_failure;

    target.started_at = match (target.started_at, source.started_at) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    };
    target.finished_at = match (target.finished_at, source.finished_at) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    };

    merge_detail(&mut target.detail, &source.detail);
    target
}

/// Fold every partial result, starting from an empty instance.
pub fn merge_all<'a, I>(parts: I) -> RunStatistics
where
    I: IntoIterator<Item = &'a RunStatistics>,
{
    parts.into_iter().fold(RunStatistics::default(), merge)
}

fn merge_detail(target: &mut RunDetail, source: &RunDetail) {
    for (kind, n) in &source.errors_by_kind {
        *target.errors_by_kind.entry(kind.clone()).or_insert(0) += n;
    }
    target.subjects_processed += source.subjects_processed;
    target.actors_created += source.actors_created;
    target.fetch_attempts += source.fetch_attempts;
    target.fetch_failures += source.fetch_failures;
}
