//! lns-db
//!
//! Persistence for the import: subjects (patient profiles), actors (company
//! users) and imported notes. `RecordStore` is the seam the runtime depends
//! on; `PgStore` backs it with Postgres, `MemStore` with process memory.

pub mod mem;
pub mod pg;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use lns_schemas::{Actor, ImportSummary, StoredRecord, Subject};
use sqlx::{postgres::PgPoolOptions, PgPool};

pub use mem::MemStore;
pub use pg::PgStore;

pub const ENV_DB_URL: &str = "LNS_DATABASE_URL";

/// What `save_stored_record` did with the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Inserted { id: i64 },
    Updated { id: i64 },
    /// A row with the same key is already as new or newer; nothing written.
    Stale,
}

/// Storage contract used by the import runtime.
///
/// Implementations are shared across partition tasks, so every method takes
/// `&self` and must be safe under concurrent calls.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Imported note by its legacy id.
    async fn find_stored_record(&self, external_id: &str) -> Result<Option<StoredRecord>>;

    /// Insert or update a note.
    ///
    /// Keyed by `external_id` when present, else by `id`. An existing row is
    /// only overwritten when the incoming `last_modified_at` is strictly later,
    /// so `last_modified_at` never moves backward even under racing writers.
    async fn save_stored_record(&self, record: &StoredRecord) -> Result<SaveOutcome>;

    async fn find_actor(&self, login: &str) -> Result<Option<Actor>>;

    /// Atomic get-or-create by login. `true` when this call created the row.
    async fn upsert_actor(&self, login: &str) -> Result<(Actor, bool)>;

    /// Subjects whose status is in the active set, ordered by id.
    async fn list_subjects(&self) -> Result<Vec<Subject>>;

    async fn find_subject(&self, id: i64) -> Result<Option<Subject>>;

    /// Store-wide counters. `imported_last_24h` counts imported notes whose
    /// last-modified time is at or after `since`.
    async fn import_summary(&self, since: NaiveDateTime) -> Result<ImportSummary>;
}

/// Connect to Postgres using LNS_DATABASE_URL.
pub async fn connect_from_env() -> Result<PgPool> {
    let url = std::env::var(ENV_DB_URL).with_context(|| format!("missing env var {ENV_DB_URL}"))?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&url)
        .await
        .context("failed to connect to Postgres")?;

    Ok(pool)
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    tracing::info!("db migrations applied");
    Ok(())
}

/// Connectivity plus schema presence.
pub async fn status(pool: &PgPool) -> Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as::<_, (i32,)>("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;

    let (exists,): (bool,) = sqlx::query_as::<_, (bool,)>(
        r#"
        select exists (
            select 1
            from information_schema.tables
            where table_schema = 'public' and table_name = 'patient_note'
        )
        "#,
    )
    .fetch_one(pool)
    .await
    .context("status table-exists query failed")?;

    Ok(DbStatus {
        ok: one == 1,
        has_notes_table: exists,
    })
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub ok: bool,
    pub has_notes_table: bool,
}
