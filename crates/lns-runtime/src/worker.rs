//! Work done inside one partition task.
//!
//! A task walks its subjects in order, and each subject's external keys in
//! order. Failures are counted into the task's own `RunStatistics` and never
//! stop the task; only the run deadline does.

use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::Arc;

use anyhow::Result;
use chrono::{Local, NaiveDate};
use lns_db::{RecordStore, SaveOutcome};
use lns_reconcile::{evaluate_at, Decision};
use lns_schemas::{DirectoryEntry, RunStatistics, SourceRecord, Subject};
use lns_source::SourceClient;
use tokio::time::Instant;

use crate::retry::{FetchAttempt, RetryingFetcher};
use crate::{ImportError, UserResolver};

/// Directory entries keyed by trimmed guid.
pub type Directory = HashMap<String, DirectoryEntry>;

/// Key the directory by guid. Blank guids are dropped; on duplicates the
/// later entry wins.
pub fn build_directory(entries: Vec<DirectoryEntry>) -> Directory {
    let mut map = Directory::with_capacity(entries.len());
    for entry in entries {
        let key = entry.guid.trim().to_string();
        if key.is_empty() {
            tracing::debug!("directory entry without guid ignored");
            continue;
        }
        if map.contains_key(&key) {
            tracing::warn!(guid = %key, "duplicate directory guid; later entry wins");
        }
        map.insert(key, entry);
    }
    map
}

/// Inclusive `[today - days, today]`. `None` for negative `days` or a start
/// before the calendar's range.
pub fn fetch_window(today: NaiveDate, days: i64) -> Option<(NaiveDate, NaiveDate)> {
    let back = u64::try_from(days).ok()?;
    let from = today.checked_sub_days(chrono::Days::new(back))?;
    Some((from, today))
}

pub(crate) fn note_attempt(stats: &mut RunStatistics, attempt: &FetchAttempt<'_>) {
    stats.detail.fetch_attempts += 1;
    if attempt.error.is_some() {
        stats.detail.fetch_failures += 1;
    }
}

/// What a partition task hands back.
#[derive(Debug)]
pub(crate) struct PartitionResult {
    pub stats: RunStatistics,
    /// The task stopped early because the run deadline passed.
    pub interrupted: bool,
}

/// Shared, read-only context for every partition task of one run.
pub(crate) struct PartitionWorker {
    pub source: Arc<dyn SourceClient>,
    pub store: Arc<dyn RecordStore>,
    pub directory: Arc<Directory>,
    pub fetcher: RetryingFetcher,
    pub window: (NaiveDate, NaiveDate),
    pub deadline: Instant,
}

impl PartitionWorker {
    fn deadline_passed(&self) -> bool {
        Instant::now() >= self.deadline
    }

    pub async fn process_batch(&self, index: usize, batch: Vec<Subject>) -> PartitionResult {
        let mut stats = RunStatistics::started_now();
        let mut resolver = UserResolver::new(Arc::clone(&self.store));
        let mut interrupted = false;

        tracing::debug!(partition = index, subjects = batch.len(), "partition started");
        for subject in &batch {
            if self.process_subject(subject, &mut resolver, &mut stats).await.is_break() {
                interrupted = true;
                tracing::warn!(
                    partition = index,
                    subject_id = subject.id,
                    "partition stopped at run deadline"
                );
                break;
            }
            stats.detail.subjects_processed += 1;
        }
        stats.finish();

        tracing::info!(
            partition = index,
            created = stats.created,
            updated = stats.updated,
            skipped = stats.skipped,
            errors = stats.errors,
            "partition finished"
        );
        PartitionResult { stats, interrupted }
    }

    async fn process_subject(
        &self,
        subject: &Subject,
        resolver: &mut UserResolver,
        stats: &mut RunStatistics,
    ) -> ControlFlow<()> {
        let (date_from, date_to) = self.window;

        for key in subject.external_keys() {
            if self.deadline_passed() {
                return ControlFlow::Break(());
            }
            let Some(entry) = self.directory.get(&key) else {
                tracing::debug!(subject_id = subject.id, key = %key, "key not in directory; skipped");
                continue;
            };
            let agency = entry.agency.as_deref().unwrap_or_default();

            let fetched = self
                .fetcher
                .fetch_observed(
                    "fetch_records",
                    || self.source.fetch_records(agency, &key, date_from, date_to),
                    |a| note_attempt(stats, a),
                )
                .await;
            let records = match fetched {
                Ok(r) => r,
                Err(ImportError::DeadlineExceeded { .. }) => return ControlFlow::Break(()),
                Err(e) => {
                    tracing::warn!(subject_id = subject.id, key = %key, error = %e, "record fetch failed");
                    stats.record_error(e.kind());
                    continue;
                }
            };

            for record in &records {
                if self.deadline_passed() {
                    return ControlFlow::Break(());
                }
                if let Err(e) = self.process_record(subject.id, record, resolver, stats).await {
                    tracing::warn!(
                        subject_id = subject.id,
                        external_id = record.external_id_or_placeholder(),
                        error = %format!("{e:#}"),
                        "record failed"
                    );
                    stats.record_error("record_processing_error");
                }
            }
        }
        ControlFlow::Continue(())
    }

    async fn process_record(
        &self,
        subject_id: i64,
        record: &SourceRecord,
        resolver: &mut UserResolver,
        stats: &mut RunStatistics,
    ) -> Result<()> {
        let key = record
            .external_id
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty());
        let existing = match key {
            Some(k) => self.store.find_stored_record(k).await?,
            None => None,
        };

        let eval = evaluate_at(existing.as_ref(), record, Local::now().naive_local());
        if eval.timestamp_fallback {
            tracing::warn!(
                subject_id,
                external_id = record.external_id_or_placeholder(),
                "unparseable source timestamp; current time substituted"
            );
            stats.note("timestamp_fallback");
        }

        if let Decision::Skip(reason) = eval.decision {
            tracing::debug!(
                subject_id,
                external_id = record.external_id_or_placeholder(),
                reason = reason.as_str(),
                "record skipped"
            );
            stats.skipped += 1;
            return Ok(());
        }

        let author = resolver.resolve(record.author_login.as_deref()).await?;
        if author.created {
            stats.detail.actors_created += 1;
        }

        let Some(row) = eval
            .decision
            .apply(existing.as_ref(), record, subject_id, author.actor.id)
        else {
            stats.skipped += 1;
            return Ok(());
        };

        match self.store.save_stored_record(&row).await? {
            SaveOutcome::Inserted { .. } => stats.created += 1,
            SaveOutcome::Updated { .. } => stats.updated += 1,
            // Lost a race to a writer with an equal or newer copy.
            SaveOutcome::Stale => stats.skipped += 1,
        }
        Ok(())
    }
}
