use chrono::NaiveDateTime;
use lns_schemas::{SourceRecord, StoredRecord};
use serde::{Deserialize, Serialize};

use crate::timestamp::resolve_timestamp;

/// Why an incoming record was not applied. A skip is an outcome, not an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SkipReason {
    /// External id absent or blank.
    MissingExternalId,
    /// Payload absent or blank after trimming.
    BlankPayload,
    /// Stored copy is as new as, or newer than, the incoming one.
    NotNewer,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::MissingExternalId => "missing_external_id",
            SkipReason::BlankPayload => "blank_payload",
            SkipReason::NotNewer => "not_newer",
        }
    }
}

/// Outcome of comparing one incoming record against its stored counterpart.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decision {
    Create {
        created_at: NaiveDateTime,
        last_modified_at: NaiveDateTime,
    },
    Update {
        last_modified_at: NaiveDateTime,
    },
    Skip(SkipReason),
}

impl Decision {
    pub fn is_skip(&self) -> bool {
        matches!(self, Decision::Skip(_))
    }

    /// Build the record to persist for this decision.
    ///
    /// CREATE produces a fresh record authored by `actor_id`. UPDATE replaces
    /// payload, last-modified time, and last-modified actor on a copy of
    /// `existing`; creation fields are untouched. SKIP (or an UPDATE without
    /// an existing record) yields `None`.
    pub fn apply(
        &self,
        existing: Option<&StoredRecord>,
        incoming: &SourceRecord,
        subject_id: i64,
        actor_id: i64,
    ) -> Option<StoredRecord> {
        let payload = incoming.payload.clone().unwrap_or_default();
        match self {
            Decision::Create {
                created_at,
                last_modified_at,
            } => Some(StoredRecord {
                id: None,
                external_id: incoming.external_id.as_deref().map(|s| s.trim().to_string()),
                subject_id,
                payload,
                created_at: *created_at,
                last_modified_at: *last_modified_at,
                created_by: Some(actor_id),
                last_modified_by: Some(actor_id),
            }),
            Decision::Update { last_modified_at } => existing.map(|e| StoredRecord {
                payload,
                last_modified_at: *last_modified_at,
                last_modified_by: Some(actor_id),
                ..e.clone()
            }),
            Decision::Skip(_) => None,
        }
    }
}

/// A decision plus whether the timestamp fallback was used to reach it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Evaluation {
    pub decision: Decision,
    /// At least one source timestamp was unparseable and replaced by `now`.
    pub timestamp_fallback: bool,
}

/// Decide CREATE / UPDATE / SKIP using the wall clock as the timestamp
/// fallback.
pub fn decide(existing: Option<&StoredRecord>, incoming: &SourceRecord) -> Decision {
    decide_at(existing, incoming, chrono::Local::now().naive_local())
}

/// [`decide`] with the fallback instant supplied by the caller.
pub fn decide_at(
    existing: Option<&StoredRecord>,
    incoming: &SourceRecord,
    now: NaiveDateTime,
) -> Decision {
    evaluate_at(existing, incoming, now).decision
}

/// Decide CREATE / UPDATE / SKIP with an explicit fallback instant.
///
/// Rules, in order:
/// 1. blank external id or blank payload: SKIP;
/// 2. nothing stored: CREATE;
/// 3. incoming last-modified strictly after stored: UPDATE;
/// 4. otherwise SKIP (stored copy is authoritative).
pub fn evaluate_at(
    existing: Option<&StoredRecord>,
    incoming: &SourceRecord,
    now: NaiveDateTime,
) -> Evaluation {
    if is_blank(incoming.external_id.as_deref()) {
        return skipped(SkipReason::MissingExternalId);
    }
    if is_blank(incoming.payload.as_deref()) {
        return skipped(SkipReason::BlankPayload);
    }

    let modified = resolve_timestamp(incoming.last_modified_at.as_deref(), now);

    match existing {
        None => {
            let created = resolve_timestamp(incoming.created_at.as_deref(), now);
            Evaluation {
                decision: Decision::Create {
                    created_at: created.value,
                    last_modified_at: modified.value,
                },
                timestamp_fallback: created.fell_back || modified.fell_back,
            }
        }
        Some(stored) if modified.value > stored.last_modified_at => Evaluation {
            decision: Decision::Update {
                last_modified_at: modified.value,
            },
            timestamp_fallback: modified.fell_back,
        },
        Some(_) => Evaluation {
            decision: Decision::Skip(SkipReason::NotNewer),
            timestamp_fallback: modified.fell_back,
        },
    }
}

fn skipped(reason: SkipReason) -> Evaluation {
    Evaluation {
        decision: Decision::Skip(reason),
        timestamp_fallback: false,
    }
}

fn is_blank(s: Option<&str>) -> bool {
    s.map(|v| v.trim().is_empty()).unwrap_or(true)
}
