//! TNP Monitor — Binary Entrypoint
//! Boots the Axum HTTP server and the background detection scheduler,
//! wiring the portal source, fingerprint store, and notifier sinks.

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tnp_monitor::extract::portal::{PortalConfig, PortalSource};
use tnp_monitor::extract::ItemSource;
use tnp_monitor::telemetry::Metrics;
use tnp_monitor::{api, scheduler, AppConfig, DetectionEngine, NotifierMux, SqliteStore};

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tnp_monitor=info,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    // Recorder must be installed before the engine describes its counters.
    let metrics = Metrics::init();

    let cfg = AppConfig::from_env();
    tracing::info!(
        db = %cfg.db_path,
        interval_secs = cfg.check_interval_secs,
        lookback_hours = cfg.lookback_hours,
        retention_days = cfg.retention_days,
        "starting tnp-monitor"
    );

    let store = Arc::new(
        SqliteStore::open(&cfg.db_path)
            .with_context(|| format!("opening fingerprint store at {}", cfg.db_path))?,
    );

    let mut sources: Vec<Box<dyn ItemSource>> = Vec::new();
    if let (Some(username), Some(password)) = (&cfg.portal_username, &cfg.portal_password) {
        sources.push(Box::new(PortalSource::new(PortalConfig {
            base_url: cfg.portal_base_url.clone(),
            username: username.clone(),
            password: password.clone(),
        })?));
    } else {
        tracing::warn!("TP_USERNAME/TP_PASSWORD not set, portal scraping disabled");
    }

    let mux = NotifierMux::from_config(&cfg);
    let notifier_count = mux.len();

    let engine = Arc::new(DetectionEngine::new(sources, store, mux, &cfg));
    let _scheduler = scheduler::spawn(engine.clone(), cfg.check_interval_secs);

    let state = api::AppState {
        engine,
        check_interval_secs: cfg.check_interval_secs,
        notifier_count,
        portal_configured: cfg.has_portal_credentials(),
    };
    let router = api::create_router(state).merge(metrics.router());

    let addr = format!("0.0.0.0:{}", cfg.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, "http server listening");
    axum::serve(listener, router).await.context("http server")?;
    Ok(())
}
