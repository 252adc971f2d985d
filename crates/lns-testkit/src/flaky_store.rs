//! `RecordStore` wrapper that fails writes for chosen legacy ids or stalls
//! subject lookups.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use lns_db::{MemStore, RecordStore, SaveOutcome};
use lns_schemas::{Actor, ImportSummary, StoredRecord, Subject};

pub struct FlakyStore {
    inner: Arc<MemStore>,
    failing_saves: HashSet<String>,
    subjects_hang: bool,
}

impl FlakyStore {
    pub fn new(inner: Arc<MemStore>) -> Self {
        Self {
            inner,
            failing_saves: HashSet::new(),
            subjects_hang: false,
        }
    }

    pub fn fail_saves_for(mut self, external_ids: &[&str]) -> Self {
        self.failing_saves
            .extend(external_ids.iter().map(|s| s.to_string()));
        self
    }

    /// `list_subjects` and `find_subject` never complete.
    pub fn hang_subject_queries(mut self) -> Self {
        self.subjects_hang = true;
        self
    }

    async fn stall_if_scripted(&self) {
        if self.subjects_hang {
            std::future::pending::<()>().await;
        }
    }
}

#[async_trait]
impl RecordStore for FlakyStore {
    async fn find_stored_record(&self, external_id: &str) -> Result<Option<StoredRecord>> {
        self.inner.find_stored_record(external_id).await
    }

    async fn save_stored_record(&self, record: &StoredRecord) -> Result<SaveOutcome> {
        if let Some(id) = record.external_id.as_deref() {
            if self.failing_saves.contains(id) {
                bail!("scripted save failure for {id}");
            }
        }
        self.inner.save_stored_record(record).await
    }

    async fn find_actor(&self, login: &str) -> Result<Option<Actor>> {
        self.inner.find_actor(login).await
    }

    async fn upsert_actor(&self, login: &str) -> Result<(Actor, bool)> {
        self.inner.upsert_actor(login).await
    }

    async fn list_subjects(&self) -> Result<Vec<Subject>> {
        self.stall_if_scripted().await;
        self.inner.list_subjects().await
    }

    async fn find_subject(&self, id: i64) -> Result<Option<Subject>> {
        self.stall_if_scripted().await;
        self.inner.find_subject(id).await
    }

    async fn import_summary(&self, since: NaiveDateTime) -> Result<ImportSummary> {
        self.inner.import_summary(since).await
    }
}
