//! `lns import run` and `lns import subject`.

use std::sync::Arc;

use anyhow::{Context, Result};
use lns_db::{MemStore, PgStore, RecordStore};
use lns_runtime::{Orchestrator, RunReport};
use lns_source::{LegacyHttpClient, SourceClient};

use super::load_config;

pub async fn import_run(config_paths: &[String], mem: bool) -> Result<RunReport> {
    let orch = build_orchestrator(config_paths, mem).await?;
    Ok(orch.run().await)
}

pub async fn import_subject(subject_id: i64, config_paths: &[String], mem: bool) -> Result<RunReport> {
    let orch = build_orchestrator(config_paths, mem).await?;
    Ok(orch.run_for_subject(subject_id).await)
}

async fn build_orchestrator(config_paths: &[String], mem: bool) -> Result<Orchestrator> {
    let loaded = load_config(config_paths)?;
    let import_cfg = loaded.import_config()?;
    let source_cfg = loaded.source_config()?;
    let token = lns_config::resolve_source_token(&loaded.config_json)?;
    tracing::info!(config_hash = %loaded.config_hash, base_url = %source_cfg.base_url, "config loaded");

    let source: Arc<dyn SourceClient> = Arc::new(
        LegacyHttpClient::new(&source_cfg, token).context("source client setup failed")?,
    );

    let store: Arc<dyn RecordStore> = if mem {
        eprintln!("WARN: --mem: in-memory store, nothing will persist");
        Arc::new(MemStore::new())
    } else {
        let pool = lns_db::connect_from_env().await?;
        Arc::new(PgStore::new(pool))
    };

    Orchestrator::new(source, store, import_cfg).context("invalid import configuration")
}
