//! lns-daemon entry point.
//!
//! Thin on purpose: loads config, sets up tracing, builds the shared state,
//! starts the heartbeat and scheduler, wires middleware, and serves HTTP.
//! Handlers live in `routes.rs`; shared state in `state.rs`.
//!
//! Environment:
//! - `LNS_CONFIG`: comma-separated YAML paths, layered in order (optional).
//! - `LNS_DAEMON_ADDR`: bind address, default `127.0.0.1:8899`.
//! - `LNS_DATABASE_URL`: Postgres URL (unless `--mem`).
//!
//! `--mem` swaps Postgres for the in-memory store (dev only; nothing persists).

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use lns_config::{ConfigMode, LoadedConfig, UnusedKeyPolicy};
use lns_daemon::{routes, state};
use lns_db::{MemStore, PgStore, RecordStore};
use lns_source::{LegacyHttpClient, SourceClient};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn, Level};

const ENV_CONFIG: &str = "LNS_CONFIG";
const ENV_ADDR: &str = "LNS_DAEMON_ADDR";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let loaded = load_config()?;
    let unused =
        lns_config::report_unused_keys(ConfigMode::Daemon, &loaded.config_json, UnusedKeyPolicy::Warn)?;
    if !unused.is_clean() {
        warn!(keys = ?unused.unused_leaf_pointers, "unused config keys");
    }
    let import_cfg = loaded.import_config()?;
    let source_cfg = loaded.source_config()?;
    let daemon_cfg = loaded.daemon_config()?;
    let token = lns_config::resolve_source_token(&loaded.config_json)?;
    info!(config_hash = %loaded.config_hash, base_url = %source_cfg.base_url, "config loaded");

    let source: Arc<dyn SourceClient> = Arc::new(LegacyHttpClient::new(&source_cfg, token)?);
    let store = open_store().await?;

    let shared = Arc::new(
        state::AppState::new(source, store, import_cfg).context("invalid import configuration")?,
    );

    state::spawn_heartbeat(shared.bus.clone(), Duration::from_secs(1));
    if daemon_cfg.schedule_enabled {
        info!(
            interval_secs = daemon_cfg.schedule_interval.as_secs(),
            "import scheduler enabled"
        );
        state::spawn_scheduler(Arc::clone(&shared), daemon_cfg.schedule_interval);
    }

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    let addr = bind_addr_from_env().unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 8899)));
    info!("lns-daemon listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .await
        .context("server crashed")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

fn load_config() -> anyhow::Result<LoadedConfig> {
    let raw = std::env::var(ENV_CONFIG).unwrap_or_default();
    let paths: Vec<&str> = raw
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    lns_config::load_layered_yaml(&paths)
}

async fn open_store() -> anyhow::Result<Arc<dyn RecordStore>> {
    if std::env::args().any(|a| a == "--mem") {
        warn!("--mem: using in-memory store, nothing will persist");
        return Ok(Arc::new(MemStore::new()));
    }
    let pool = lns_db::connect_from_env().await?;
    lns_db::migrate(&pool).await?;
    Ok(Arc::new(PgStore::new(pool)))
}

fn bind_addr_from_env() -> Option<SocketAddr> {
    std::env::var(ENV_ADDR).ok()?.parse().ok()
}

/// CORS: allow only localhost origins.
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
        "http://localhost:5173",
        "http://127.0.0.1:5173",
    ];

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(tower_http::cors::Any)
}
