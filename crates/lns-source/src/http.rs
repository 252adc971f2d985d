//! reqwest-backed `SourceClient`.
//!
//! Both endpoints are `POST` with a JSON body and return a JSON array. Unknown
//! fields are ignored; a `null` body is read as an empty list.

use async_trait::async_trait;
use chrono::NaiveDate;
use lns_config::{SourceConfig, SourceToken};
use lns_schemas::{DirectoryEntry, SourceRecord};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::{SourceClient, SourceError, SOURCE_DATE_FORMAT};

const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Clone)]
pub struct LegacyHttpClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<SourceToken>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RecordsRequest<'a> {
    agency: &'a str,
    date_from: String,
    date_to: String,
    client_guid: &'a str,
}

impl LegacyHttpClient {
    /// Build a client from resolved settings. The token is never logged.
    pub fn new(cfg: &SourceConfig, token: Option<SourceToken>) -> Result<Self, SourceError> {
        let base_url = cfg.base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(SourceError::Config("source base_url is empty".to_string()));
        }
        let http = reqwest::Client::builder()
            .connect_timeout(cfg.connect_timeout)
            .timeout(cfg.read_timeout)
            .build()
            .map_err(|e| SourceError::Config(format!("http client build failed: {e}")))?;
        Ok(Self {
            http,
            base_url,
            token,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post_list<B, T>(&self, path: &str, body: &B) -> Result<Vec<T>, SourceError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self.http.post(&url).json(body);
        if let Some(t) = &self.token {
            req = req.bearer_auth(t.expose());
        }

        let resp = req
            .send()
            .await
            .map_err(|e| SourceError::Transport(format!("POST {path}: {e}")))?;

        let status = resp.status();
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| SourceError::Transport(format!("POST {path} body read: {e}")))?;

        if !status.is_success() {
            let text = String::from_utf8_lossy(&bytes);
            let message: String = text.chars().take(MAX_ERROR_BODY).collect();
            return Err(SourceError::Api {
                code: Some(status.as_u16()),
                message,
            });
        }

        let list: Option<Vec<T>> = serde_json::from_slice(&bytes)
            .map_err(|e| SourceError::Decode(format!("POST {path}: {e}")))?;
        Ok(list.unwrap_or_default())
    }
}

#[async_trait]
impl SourceClient for LegacyHttpClient {
    fn source_name(&self) -> &'static str {
        "legacy-http"
    }

    async fn fetch_directory(&self) -> Result<Vec<DirectoryEntry>, SourceError> {
        let entries: Vec<DirectoryEntry> =
            self.post_list("/clients", &serde_json::json!({})).await?;
        tracing::debug!(count = entries.len(), "source directory fetched");
        Ok(entries)
    }

    async fn fetch_records(
        &self,
        agency: &str,
        external_key: &str,
        date_from: NaiveDate,
        date_to: NaiveDate,
    ) -> Result<Vec<SourceRecord>, SourceError> {
        let body = RecordsRequest {
            agency,
            date_from: date_from.format(SOURCE_DATE_FORMAT).to_string(),
            date_to: date_to.format(SOURCE_DATE_FORMAT).to_string(),
            client_guid: external_key,
        };
        let records: Vec<SourceRecord> = self.post_list("/notes", &body).await?;
        tracing::debug!(
            external_key,
            count = records.len(),
            "source records fetched"
        );
        Ok(records)
    }
}
