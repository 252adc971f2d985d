//! lns-schemas
//!
//! Shared data model for the legacy-notes sync engine. Plain data only:
//! no IO, no decision logic. Wire shapes of the legacy source use the
//! source's camelCase field names via serde renames.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Subject status codes that count as "active" for import.
pub const ACTIVE_SUBJECT_STATUSES: &[i16] = &[200, 210, 230];

/// Login substituted when a source record carries no author.
pub const SYSTEM_LOGIN: &str = "system";

// ---------------------------------------------------------------------------
// Subject
// ---------------------------------------------------------------------------

/// A locally-owned entity (patient profile) whose legacy notes are imported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: i64,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// Comma-separated legacy client guids, exactly as persisted.
    pub external_keys_raw: Option<String>,
    pub status_id: i16,
}

impl Subject {
    pub fn new(id: i64, external_keys: &[&str]) -> Self {
        Self {
            id,
            first_name: None,
            last_name: None,
            external_keys_raw: Some(external_keys.join(",")),
            status_id: ACTIVE_SUBJECT_STATUSES[0],
        }
    }

    pub fn is_active(&self) -> bool {
        ACTIVE_SUBJECT_STATUSES.contains(&self.status_id)
    }

    /// Legacy client guids linked to this subject: split on `,`, trimmed,
    /// empties dropped, order preserved.
    pub fn external_keys(&self) -> Vec<String> {
        match self.external_keys_raw.as_deref() {
            None => Vec::new(),
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Source-side shapes
// ---------------------------------------------------------------------------

/// A legacy client record. `guid` is the directory key; `agency` routes the
/// notes request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryEntry {
    pub guid: String,
    #[serde(default)]
    pub agency: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub dob: Option<String>,
    #[serde(default)]
    pub created_date_time: Option<String>,
}

impl DirectoryEntry {
    pub fn new(guid: impl Into<String>, agency: impl Into<String>) -> Self {
        Self {
            guid: guid.into(),
            agency: Some(agency.into()),
            first_name: None,
            last_name: None,
            status: None,
            dob: None,
            created_date_time: None,
        }
    }
}

/// A legacy note as returned by the source. Every field is source-native and
/// may be null; timestamps look like `2024-03-01 10:15:00 CDT`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    #[serde(rename = "guid", default)]
    pub external_id: Option<String>,
    #[serde(rename = "comments", default)]
    pub payload: Option<String>,
    #[serde(rename = "loggedUser", default)]
    pub author_login: Option<String>,
    #[serde(rename = "createdDateTime", default)]
    pub created_at: Option<String>,
    #[serde(rename = "modifiedDateTime", default)]
    pub last_modified_at: Option<String>,
    #[serde(rename = "clientGuid", default)]
    pub client_guid: Option<String>,
    #[serde(default)]
    pub datetime: Option<String>,
}

impl SourceRecord {
    pub fn new(
        external_id: impl Into<String>,
        payload: impl Into<String>,
        author_login: impl Into<String>,
        created_at: impl Into<String>,
        last_modified_at: impl Into<String>,
    ) -> Self {
        Self {
            external_id: Some(external_id.into()),
            payload: Some(payload.into()),
            author_login: Some(author_login.into()),
            created_at: Some(created_at.into()),
            last_modified_at: Some(last_modified_at.into()),
            client_guid: None,
            datetime: None,
        }
    }

    /// External id for log fields; `"<none>"` when absent.
    pub fn external_id_or_placeholder(&self) -> &str {
        self.external_id.as_deref().unwrap_or("<none>")
    }
}

// ---------------------------------------------------------------------------
// Local-side shapes
// ---------------------------------------------------------------------------

/// Locally persisted note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    /// `None` until the store assigns an id.
    pub id: Option<i64>,
    /// `None` for notes created locally rather than imported.
    pub external_id: Option<String>,
    pub subject_id: i64,
    pub payload: String,
    pub created_at: NaiveDateTime,
    pub last_modified_at: NaiveDateTime,
    pub created_by: Option<i64>,
    pub last_modified_by: Option<i64>,
}

/// Identity resolved by normalized login.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    pub id: i64,
    pub login: String,
}

/// Store-wide import counters surfaced by the status endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub total_records: i64,
    pub imported_records: i64,
    pub last_import_at: Option<NaiveDateTime>,
    pub imported_last_24h: i64,
}

impl ImportSummary {
    pub fn progress(&self) -> f64 {
        if self.total_records > 0 {
            self.imported_records as f64 / self.total_records as f64
        } else {
            0.0
        }
    }
}

// ---------------------------------------------------------------------------
// RunStatistics
// ---------------------------------------------------------------------------

/// Extra per-run observations carried alongside the four core counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunDetail {
    /// Error / anomaly kind -> count.
    pub errors_by_kind: BTreeMap<String, u64>,
    pub subjects_processed: u64,
    pub actors_created: u64,
    pub fetch_attempts: u64,
    pub fetch_failures: u64,
}

/// Aggregate outcome of one reconciliation run, or of one partition of it.
///
/// Each partition task owns its own instance; instances are merged only after
/// the task has finished.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStatistics {
    pub created: u64,
    pub updated: u64,
    pub skipped: u64,
    pub errors: u64,
    pub critical_failure: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub detail: RunDetail,
}

impl RunStatistics {
    pub fn started_now() -> Self {
        Self {
            started_at: Some(Utc::now()),
            ..Self::default()
        }
    }

    pub fn finish(&mut self) {
        let now = Utc::now();
        self.finished_at = Some(match self.started_at {
            Some(start) if start > now => start,
            _ => now,
        });
    }

    /// Count one error and attribute it to `kind`.
    pub fn record_error(&mut self, kind: &str) {
        self.errors += 1;
        self.note(kind);
    }

    /// Attribute an anomaly to `kind` without counting it as an error.
    pub fn note(&mut self, kind: &str) {
        *self.detail.errors_by_kind.entry(kind.to_string()).or_insert(0) += 1;
    }

    pub fn total_processed(&self) -> u64 {
        self.created + self.updated + self.skipped
    }

    /// Wall-clock span of the run; zero until both ends are set.
    pub fn duration(&self) -> chrono::Duration {
        match (self.started_at, self.finished_at) {
            (Some(s), Some(e)) => e - s,
            _ => chrono::Duration::zero(),
        }
    }
}

impl std::fmt::Display for RunStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "created={} updated={} skipped={} errors={} critical={} duration_ms={}",
            self.created,
            self.updated,
            self.skipped,
            self.errors,
            self.critical_failure,
            self.duration().num_milliseconds()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn external_keys_are_trimmed_and_empties_dropped() {
        let s = Subject {
            id: 1,
            first_name: None,
            last_name: None,
            external_keys_raw: Some(" a-1 , ,b-2,".to_string()),
            status_id: 200,
        };
        assert_eq!(s.external_keys(), vec!["a-1".to_string(), "b-2".to_string()]);
    }

    #[test]
    fn missing_external_keys_yield_empty_list() {
        let mut s = Subject::new(7, &[]);
        s.external_keys_raw = None;
        assert!(s.external_keys().is_empty());
    }

    #[test]
    fn only_listed_statuses_are_active() {
        let mut s = Subject::new(1, &["k"]);
        for code in [200, 210, 230] {
            s.status_id = code;
            assert!(s.is_active());
        }
        s.status_id = 100;
        assert!(!s.is_active());
    }

    #[test]
    fn source_record_decodes_camel_case_and_ignores_unknown_fields() {
        let raw = r#"{
            "guid": "n-1",
            "comments": "hello",
            "loggedUser": "jdoe",
            "createdDateTime": "2024-03-01 10:00:00 CDT",
            "modifiedDateTime": "2024-03-02 11:00:00 CDT",
            "clientGuid": "c-1",
            "somethingElse": 42
        }"#;
        let rec: SourceRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(rec.external_id.as_deref(), Some("n-1"));
        assert_eq!(rec.author_login.as_deref(), Some("jdoe"));
        assert_eq!(rec.datetime, None);
    }

    #[test]
    fn record_error_counts_and_attributes() {
        let mut st = RunStatistics::default();
        st.record_error("note_processing_error");
        st.note("timestamp_fallback");
        assert_eq!(st.errors, 1);
        assert_eq!(st.detail.errors_by_kind.len(), 2);
    }

    #[test]
    fn finish_never_precedes_start() {
        let mut st = RunStatistics::started_now();
        st.finish();
        assert!(st.finished_at.unwrap() >= st.started_at.unwrap());
    }
}
