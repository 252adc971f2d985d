//! lns-testkit
//!
//! Scripted collaborators and fixture builders for scenario tests: a
//! call-counting `FakeSource`, a failure-injecting `FlakyStore`, and helpers
//! for subjects, notes and configs.

pub mod fake_source;
pub mod flaky_store;

use std::fs;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use lns_config::ImportConfig;
use lns_schemas::{DirectoryEntry, SourceRecord, StoredRecord, Subject};

pub use fake_source::FakeSource;
pub use flaky_store::FlakyStore;

/// Absolute path of a file under this crate's `fixtures/`.
pub fn fixture_path(name: &str) -> String {
    format!("{}/fixtures/{}", env!("CARGO_MANIFEST_DIR"), name)
}

pub fn load_directory_json(path: &str) -> Result<Vec<DirectoryEntry>> {
    let s = fs::read_to_string(path).with_context(|| format!("read directory fixture: {path}"))?;
    serde_json::from_str(&s).context("parse directory fixture json")
}

pub fn load_records_json(path: &str) -> Result<Vec<SourceRecord>> {
    let s = fs::read_to_string(path).with_context(|| format!("read records fixture: {path}"))?;
    serde_json::from_str(&s).context("parse records fixture json")
}

/// Defaults with no retry delay, so failing fetches do not slow tests down.
pub fn fast_config() -> ImportConfig {
    ImportConfig {
        retry_delay: std::time::Duration::ZERO,
        ..ImportConfig::default()
    }
}

/// Active subject `id` linked to `keys`.
pub fn subject(id: i64, keys: &[&str]) -> Subject {
    Subject::new(id, keys)
}

/// `n` active subjects, ids `1..=n`, each linked to key `k-<id>`.
pub fn numbered_subjects(n: i64) -> Vec<Subject> {
    (1..=n)
        .map(|id| Subject::new(id, &[format!("k-{id}").as_str()]))
        .collect()
}

/// Source note with a fixed creation time and the given modification time.
pub fn note(external_id: &str, payload: &str, author: &str, modified: &str) -> SourceRecord {
    SourceRecord::new(external_id, payload, author, "2024-01-01 08:00:00 CST", modified)
}

/// A note already persisted locally for `subject_id`.
pub fn stored(
    external_id: &str,
    subject_id: i64,
    payload: &str,
    modified: NaiveDateTime,
) -> StoredRecord {
    StoredRecord {
        id: None,
        external_id: Some(external_id.to_string()),
        subject_id,
        payload: payload.to_string(),
        created_at: modified,
        last_modified_at: modified,
        created_by: None,
        last_modified_by: None,
    }
}
