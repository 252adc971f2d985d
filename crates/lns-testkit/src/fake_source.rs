//! Scripted, call-counting `SourceClient`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use lns_schemas::{DirectoryEntry, SourceRecord};
use lns_source::{SourceClient, SourceError};

/// Failures to inject before succeeding. `u32::MAX` never succeeds.
const ALWAYS: u32 = u32::MAX;

#[derive(Debug, Default)]
pub struct FakeSource {
    directory: Vec<DirectoryEntry>,
    records: HashMap<String, Vec<SourceRecord>>,
    record_delay: Option<Duration>,
    directory_hangs: bool,

    directory_failures: AtomicU32,
    record_failures: Mutex<HashMap<String, u32>>,

    directory_calls: AtomicU32,
    record_calls: Mutex<HashMap<String, u32>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Script
    // -----------------------------------------------------------------------

    pub fn with_entry(mut self, guid: &str, agency: &str) -> Self {
        self.directory.push(DirectoryEntry::new(guid, agency));
        self
    }

    pub fn with_entries(mut self, entries: impl IntoIterator<Item = DirectoryEntry>) -> Self {
        self.directory.extend(entries);
        self
    }

    /// Directory entry for `key` plus the records returned for it.
    pub fn with_records(mut self, key: &str, records: Vec<SourceRecord>) -> Self {
        if !self.directory.iter().any(|e| e.guid == key) {
            self.directory.push(DirectoryEntry::new(key, "default"));
        }
        self.records.insert(key.to_string(), records);
        self
    }

    /// Every records fetch sleeps this long first (tokio clock).
    pub fn with_record_delay(mut self, delay: Duration) -> Self {
        self.record_delay = Some(delay);
        self
    }

    /// The directory fetch never completes.
    pub fn hang_directory(mut self) -> Self {
        self.directory_hangs = true;
        self
    }

    pub fn fail_directory_times(self, n: u32) -> Self {
        self.directory_failures.store(n, Ordering::SeqCst);
        self
    }

    pub fn fail_directory_always(self) -> Self {
        self.fail_directory_times(ALWAYS)
    }

    pub fn fail_records_times(self, key: &str, n: u32) -> Self {
        lock(&self.record_failures).insert(key.to_string(), n);
        self
    }

    pub fn fail_records_always(self, key: &str) -> Self {
        self.fail_records_times(key, ALWAYS)
    }

    // -----------------------------------------------------------------------
    // Observations
    // -----------------------------------------------------------------------

    pub fn directory_calls(&self) -> u32 {
        self.directory_calls.load(Ordering::SeqCst)
    }

    pub fn record_calls(&self, key: &str) -> u32 {
        lock(&self.record_calls).get(key).copied().unwrap_or(0)
    }

    pub fn total_record_calls(&self) -> u32 {
        lock(&self.record_calls).values().sum()
    }

    /// Highest number of records fetches observed running at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

/// Decrement a failure budget; `true` when this call should fail.
fn take_failure(budget: &mut u32) -> bool {
    match *budget {
        0 => false,
        ALWAYS => true,
        _ => {
            *budget -= 1;
            true
        }
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl SourceClient for FakeSource {
    fn source_name(&self) -> &'static str {
        "fake"
    }

    async fn fetch_directory(&self) -> Result<Vec<DirectoryEntry>, SourceError> {
        self.directory_calls.fetch_add(1, Ordering::SeqCst);
        if self.directory_hangs {
            std::future::pending::<()>().await;
        }
        let mut budget = self.directory_failures.load(Ordering::SeqCst);
        if take_failure(&mut budget) {
            self.directory_failures.store(budget, Ordering::SeqCst);
            return Err(SourceError::Transport("scripted directory failure".to_string()));
        }
        Ok(self.directory.clone())
    }

    async fn fetch_records(
        &self,
        _agency: &str,
        external_key: &str,
        _date_from: NaiveDate,
        _date_to: NaiveDate,
    ) -> Result<Vec<SourceRecord>, SourceError> {
        *lock(&self.record_calls)
            .entry(external_key.to_string())
            .or_insert(0) += 1;

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlight(&self.in_flight);
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(d) = self.record_delay {
            tokio::time::sleep(d).await;
        }

        let fail = lock(&self.record_failures)
            .get_mut(external_key)
            .map(take_failure)
            .unwrap_or(false);
        if fail {
            return Err(SourceError::Api {
                code: Some(503),
                message: format!("scripted failure for {external_key}"),
            });
        }
        Ok(self.records.get(external_key).cloned().unwrap_or_default())
    }
}
