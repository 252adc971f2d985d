//! Postgres-backed `RecordStore`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use lns_schemas::{Actor, ImportSummary, StoredRecord, Subject, ACTIVE_SUBJECT_STATUSES};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use crate::{RecordStore, SaveOutcome};

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Insert a subject row and return its id. Used for seeding and tests.
    pub async fn insert_subject(&self, subject: &Subject) -> Result<i64> {
        let (id,): (i64,) = sqlx::query_as::<_, (i64,)>(
            r#"
            insert into patient_profile (first_name, last_name, old_client_guid, status_id)
            values ($1, $2, $3, $4)
            returning id
            "#,
        )
        .bind(&subject.first_name)
        .bind(&subject.last_name)
        .bind(&subject.external_keys_raw)
        .bind(subject.status_id)
        .fetch_one(&self.pool)
        .await
        .context("insert_subject failed")?;
        Ok(id)
    }
}

fn subject_from_row(row: &PgRow) -> Result<Subject> {
    Ok(Subject {
        id: row.try_get("id")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        external_keys_raw: row.try_get("old_client_guid")?,
        status_id: row.try_get("status_id")?,
    })
}

fn record_from_row(row: &PgRow) -> Result<StoredRecord> {
    Ok(StoredRecord {
        id: Some(row.try_get("id")?),
        external_id: row.try_get("legacy_note_guid")?,
        subject_id: row.try_get("patient_id")?,
        payload: row
            .try_get::<Option<String>, _>("note")?
            .unwrap_or_default(),
        created_at: row.try_get("created_date_time")?,
        last_modified_at: row.try_get("last_modified_date_time")?,
        created_by: row.try_get("created_by_user_id")?,
        last_modified_by: row.try_get("last_modified_by_user_id")?,
    })
}

fn saved(row: Option<PgRow>, key: impl std::fmt::Display) -> Result<SaveOutcome> {
    let Some(row) = row else {
        tracing::debug!(%key, "stored note is as new or newer; save skipped");
        return Ok(SaveOutcome::Stale);
    };
    let id: i64 = row.try_get("id")?;
    let inserted: bool = row.try_get("inserted")?;
    Ok(if inserted {
        SaveOutcome::Inserted { id }
    } else {
        SaveOutcome::Updated { id }
    })
}

#[async_trait]
impl RecordStore for PgStore {
    async fn find_stored_record(&self, external_id: &str) -> Result<Option<StoredRecord>> {
        let row = sqlx::query(
            r#"
            select id, legacy_note_guid, patient_id, note, created_date_time,
                   last_modified_date_time, created_by_user_id, last_modified_by_user_id
            from patient_note
            where legacy_note_guid = $1
            "#,
        )
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await
        .context("find_stored_record failed")?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn save_stored_record(&self, record: &StoredRecord) -> Result<SaveOutcome> {
        if let Some(guid) = record.external_id.as_deref() {
            // xmax = 0 only for a freshly inserted tuple.
            let row = sqlx::query(
                r#"
                insert into patient_note (
                  legacy_note_guid, patient_id, note, created_date_time,
                  last_modified_date_time, created_by_user_id, last_modified_by_user_id
                ) values (
                  $1, $2, $3, $4, $5, $6, $7
                )
                on conflict (legacy_note_guid) do update
                  set note = excluded.note,
                      last_modified_date_time = excluded.last_modified_date_time,
                      last_modified_by_user_id = excluded.last_modified_by_user_id
                  where patient_note.last_modified_date_time < excluded.last_modified_date_time
                returning id, (xmax = 0) as inserted
                "#,
            )
            .bind(guid)
            .bind(record.subject_id)
            .bind(&record.payload)
            .bind(record.created_at)
            .bind(record.last_modified_at)
            .bind(record.created_by)
            .bind(record.last_modified_by)
            .fetch_optional(&self.pool)
            .await
            .context("save_stored_record upsert failed")?;
            return saved(row, guid);
        }

        if let Some(id) = record.id {
            let row = sqlx::query(
                r#"
                update patient_note
                set note = $2,
                    last_modified_date_time = $3,
                    last_modified_by_user_id = $4
                where id = $1 and last_modified_date_time < $3
                returning id, false as inserted
                "#,
            )
            .bind(id)
            .bind(&record.payload)
            .bind(record.last_modified_at)
            .bind(record.last_modified_by)
            .fetch_optional(&self.pool)
            .await
            .context("save_stored_record update failed")?;
            return saved(row, id);
        }

        let (id,): (i64,) = sqlx::query_as::<_, (i64,)>(
            r#"
            insert into patient_note (
              patient_id, note, created_date_time, last_modified_date_time,
              created_by_user_id, last_modified_by_user_id
            ) values (
              $1, $2, $3, $4, $5, $6
            )
            returning id
            "#,
        )
        .bind(record.subject_id)
        .bind(&record.payload)
        .bind(record.created_at)
        .bind(record.last_modified_at)
        .bind(record.created_by)
        .bind(record.last_modified_by)
        .fetch_one(&self.pool)
        .await
        .context("save_stored_record insert failed")?;
        Ok(SaveOutcome::Inserted { id })
    }

    async fn find_actor(&self, login: &str) -> Result<Option<Actor>> {
        let row = sqlx::query_as::<_, (i64, String)>(
            "select id, login from company_user where login = $1",
        )
        .bind(login)
        .fetch_optional(&self.pool)
        .await
        .context("find_actor failed")?;
        Ok(row.map(|(id, login)| Actor { id, login }))
    }

    async fn upsert_actor(&self, login: &str) -> Result<(Actor, bool)> {
        let inserted = sqlx::query_as::<_, (i64,)>(
            r#"
            insert into company_user (login) values ($1)
            on conflict (login) do nothing
            returning id
            "#,
        )
        .bind(login)
        .fetch_optional(&self.pool)
        .await
        .context("upsert_actor insert failed")?;

        if let Some((id,)) = inserted {
            return Ok((
                Actor {
                    id,
                    login: login.to_string(),
                },
                true,
            ));
        }

        // Lost the race (or already present): the row is committed by now.
        let actor = self
            .find_actor(login)
            .await?
            .with_context(|| format!("upsert_actor: '{login}' vanished after conflict"))?;
        Ok((actor, false))
    }

    async fn list_subjects(&self) -> Result<Vec<Subject>> {
        let rows = sqlx::query(
            r#"
            select id, first_name, last_name, old_client_guid, status_id
            from patient_profile
            where status_id = any($1)
            order by id
            "#,
        )
        .bind(ACTIVE_SUBJECT_STATUSES.to_vec())
        .fetch_all(&self.pool)
        .await
        .context("list_subjects failed")?;

        rows.iter().map(subject_from_row).collect()
    }

    async fn find_subject(&self, id: i64) -> Result<Option<Subject>> {
        let row = sqlx::query(
            r#"
            select id, first_name, last_name, old_client_guid, status_id
            from patient_profile
            where id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("find_subject failed")?;

        row.as_ref().map(subject_from_row).transpose()
    }

    async fn import_summary(&self, since: NaiveDateTime) -> Result<ImportSummary> {
        let row = sqlx::query(
            r#"
            select
              count(*)::bigint as total,
              count(legacy_note_guid)::bigint as imported,
              max(last_modified_date_time) filter (where legacy_note_guid is not null) as last_import,
              count(*) filter (
                where legacy_note_guid is not null and last_modified_date_time >= $1
              )::bigint as recent
            from patient_note
            "#,
        )
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .context("import_summary failed")?;

        Ok(ImportSummary {
            total_records: row.try_get("total")?,
            imported_records: row.try_get("imported")?,
            last_import_at: row.try_get("last_import")?,
            imported_last_24h: row.try_get("recent")?,
        })
    }
}
