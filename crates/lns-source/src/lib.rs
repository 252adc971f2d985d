//! lns-source
//!
//! Boundary to the legacy notes service. This crate owns the `SourceClient`
//! contract and the reqwest-backed implementation. It performs no retries and
//! no persistence; callers (lns-runtime) wrap fetches in a retry policy and
//! hand the records to a store.

pub mod error;
pub mod http;

use async_trait::async_trait;
use chrono::NaiveDate;
use lns_schemas::{DirectoryEntry, SourceRecord};

pub use error::SourceError;
pub use http::LegacyHttpClient;

/// Date format the legacy service expects in request bodies.
pub const SOURCE_DATE_FORMAT: &str = "%Y-%m-%d";

/// Upstream legacy-notes contract.
///
/// Object safe so the orchestrator can hold an `Arc<dyn SourceClient>`.
#[async_trait]
pub trait SourceClient: Send + Sync {
    /// Short name for logs (e.g. `"legacy-http"`).
    fn source_name(&self) -> &'static str;

    /// Every subject known to the legacy system, keyed by `guid`.
    async fn fetch_directory(&self) -> Result<Vec<DirectoryEntry>, SourceError>;

    /// Records for one subject within the inclusive `[date_from, date_to]` window.
    async fn fetch_records(
        &self,
        agency: &str,
        external_key: &str,
        date_from: NaiveDate,
        date_to: NaiveDate,
    ) -> Result<Vec<SourceRecord>, SourceError>;
}
