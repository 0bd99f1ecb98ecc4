// src/main.rs
mod config;
mod error;
mod ledger;
mod loot;
mod routes;
mod scan;
mod session;
mod types;

use std::{net::SocketAddr, sync::Arc};

use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use config::Config;
use ledger::Ledger;
use routes::{AppState, MapSettings};
use scan::ScanProxy;
use session::SessionGate;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cfg = Config::from_env()?;

    if cfg.mapbox_token.is_none() || cfg.mapbox_style.is_none() {
        error!("MAPBOX_TOKEN / MAPBOX_STYLE_URL missing, map page will not render tiles");
    }
    if cfg.gemini_api_key.is_none() {
        warn!("GEMINI_API_KEY missing, scans will be rejected upstream");
    }

    let scanner = ScanProxy::new(
        cfg.gemini_base_url.clone(),
        cfg.gemini_model.clone(),
        cfg.gemini_api_key.clone().unwrap_or_default(),
        cfg.upstream_timeout,
    )?;

    let state = AppState {
        ledger: Arc::new(Ledger::new(cfg.signals_file.clone())),
        scanner: Arc::new(scanner),
        sessions: Arc::new(SessionGate::new(cfg.session_secret.clone())),
        map: Arc::new(MapSettings {
            token: cfg.mapbox_token.clone(),
            style: cfg.mapbox_style.clone(),
        }),
        loot_max: cfg.loot_max,
    };
    info!(
        ledger = %state.ledger.path().display(),
        model = %cfg.gemini_model,
        timeout_ms = cfg.upstream_timeout.as_millis() as u64,
        "state ready"
    );

    let app = routes::router(state, &cfg.static_dir);

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
    info!("beacon listening on {addr}");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
