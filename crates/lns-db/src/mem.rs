//! In-process `RecordStore`.
//!
//! Same observable semantics as `PgStore`: unique logins, unique legacy ids,
//! monotonic `last_modified_at`. One mutex guards all tables, so every trait
//! method is atomic with respect to the others.

use std::collections::{BTreeMap, HashMap};

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use lns_schemas::{Actor, ImportSummary, StoredRecord, Subject};
use tokio::sync::Mutex;

use crate::{RecordStore, SaveOutcome};

#[derive(Debug, Default)]
struct Tables {
    subjects: BTreeMap<i64, Subject>,
    actors: HashMap<String, Actor>,
    records: BTreeMap<i64, StoredRecord>,
    by_external_id: HashMap<String, i64>,
    next_actor_id: i64,
    next_record_id: i64,
}

impl Tables {
    fn alloc_record_id(&mut self) -> i64 {
        self.next_record_id += 1;
        self.next_record_id
    }
}

#[derive(Debug, Default)]
pub struct MemStore {
    tables: Mutex<Tables>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_subjects(subjects: impl IntoIterator<Item = Subject>) -> Self {
        let tables = Tables {
            subjects: subjects.into_iter().map(|s| (s.id, s)).collect(),
            ..Tables::default()
        };
        Self {
            tables: Mutex::new(tables),
        }
    }

    pub async fn insert_subject(&self, subject: Subject) {
        self.tables.lock().await.subjects.insert(subject.id, subject);
    }

    /// Snapshot of every stored note, ordered by id.
    pub async fn records(&self) -> Vec<StoredRecord> {
        self.tables.lock().await.records.values().cloned().collect()
    }

    /// Snapshot of every actor, ordered by id.
    pub async fn actors(&self) -> Vec<Actor> {
        let mut out: Vec<Actor> = self.tables.lock().await.actors.values().cloned().collect();
        out.sort_by_key(|a| a.id);
        out
    }
}

#[async_trait]
impl RecordStore for MemStore {
    async fn find_stored_record(&self, external_id: &str) -> Result<Option<StoredRecord>> {
        let t = self.tables.lock().await;
        Ok(t
            .by_external_id
            .get(external_id)
            .and_then(|id| t.records.get(id))
            .cloned())
    }

    async fn save_stored_record(&self, record: &StoredRecord) -> Result<SaveOutcome> {
        let mut t = self.tables.lock().await;

        let existing_id = match record.external_id.as_deref() {
            Some(guid) => t.by_external_id.get(guid).copied(),
            None => record.id.filter(|id| t.records.contains_key(id)),
        };

        if let Some(id) = existing_id {
            let Some(row) = t.records.get_mut(&id) else {
                return Ok(SaveOutcome::Stale);
            };
            if row.last_modified_at >= record.last_modified_at {
                tracing::debug!(id, "stored note is as new or newer; save skipped");
                return Ok(SaveOutcome::Stale);
            }
            row.payload = record.payload.clone();
            row.last_modified_at = record.last_modified_at;
            row.last_modified_by = record.last_modified_by;
            return Ok(SaveOutcome::Updated { id });
        }

        if record.external_id.is_none() && record.id.is_some() {
            // Update by id of a row that does not exist.
            return Ok(SaveOutcome::Stale);
        }

        let id = t.alloc_record_id();
        let mut row = record.clone();
        row.id = Some(id);
        if let Some(guid) = row.external_id.clone() {
            t.by_external_id.insert(guid, id);
        }
        t.records.insert(id, row);
        Ok(SaveOutcome::Inserted { id })
    }

    async fn find_actor(&self, login: &str) -> Result<Option<Actor>> {
        Ok(self.tables.lock().await.actors.get(login).cloned())
    }

    async fn upsert_actor(&self, login: &str) -> Result<(Actor, bool)> {
        let mut t = self.tables.lock().await;
        if let Some(a) = t.actors.get(login) {
            return Ok((a.clone(), false));
        }
        t.next_actor_id += 1;
        let actor = Actor {
            id: t.next_actor_id,
            login: login.to_string(),
        };
        t.actors.insert(login.to_string(), actor.clone());
        Ok((actor, true))
    }

    async fn list_subjects(&self) -> Result<Vec<Subject>> {
        Ok(self
            .tables
            .lock()
            .await
            .subjects
            .values()
            .filter(|s| s.is_active())
            .cloned()
            .collect())
    }

    async fn find_subject(&self, id: i64) -> Result<Option<Subject>> {
        Ok(self.tables.lock().await.subjects.get(&id).cloned())
    }

    async fn import_summary(&self, since: NaiveDateTime) -> Result<ImportSummary> {
        let t = self.tables.lock().await;
        let imported = t.records.values().filter(|r| r.external_id.is_some());
        let mut summary = ImportSummary {
            total_records: t.records.len() as i64,
            ..ImportSummary::default()
        };
        for r in imported {
            summary.imported_records += 1;
            if r.last_modified_at >= since {
                summary.imported_last_24h += 1;
            }
            summary.last_import_at = summary.last_import_at.max(Some(r.last_modified_at));
        }
        Ok(summary)
    }
}
