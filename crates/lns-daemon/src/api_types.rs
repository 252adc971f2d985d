//! Request and response types for the lns-daemon HTTP endpoints.
//!
//! Everything here is `Serialize + Deserialize` so tests can decode what the
//! handlers encode. No business logic lives here.

use lns_runtime::RunReport;
use lns_schemas::ImportSummary;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: String,
    pub version: String,
}

// ---------------------------------------------------------------------------
// /v1/import/*
// ---------------------------------------------------------------------------

/// Body of a 202 from POST /v1/import/start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportAcceptedResponse {
    pub accepted: bool,
}

/// Body of a refused request (409 run in progress, 404 unknown subject, 500).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// GET /v1/import/statistics: store-wide counters plus the most recent run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportStatisticsResponse {
    pub summary: ImportSummary,
    /// imported / total, 0.0 when the store holds no records.
    pub progress: f64,
    pub last_run: Option<RunReport>,
}
