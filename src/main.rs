// =============================================================================
// pairwatch — Main Entry Point
// =============================================================================
//
// Wires the core to its collaborators: the Binance ticker feed, the SQLite
// candle store and the read-only HTTP API.  Ctrl+C flips a shared shutdown
// flag; the feed, the ingestor and the persistence loop exit between units
// of work.  The config file is read-only to the service.
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use pairwatch::market_data::feed::{run_feed, FEED_CHANNEL_CAPACITY};
use pairwatch::runtime_config::RuntimeConfig;
use pairwatch::storage::{run_persistence_loop, CandleSink, CandleStore};
use pairwatch::{api, AppState};

const DEFAULT_CONFIG_PATH: &str = "pairwatch_config.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("pairwatch starting up");

    let config_path =
        std::env::var("PAIRWATCH_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
    let mut config = RuntimeConfig::load(&config_path).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        RuntimeConfig::default()
    });
    config.apply_env_overrides(|key| std::env::var(key).ok());
    config.validate().context("invalid runtime config")?;
    let timeframes = config.timeframes()?;

    info!(
        symbols = ?config.symbols,
        tick_capacity = config.tick_capacity,
        window = config.analytics_window,
        "Configured instruments"
    );

    // ── 2. Shared state ──────────────────────────────────────────────────
    let state = Arc::new(AppState::new(config.clone()));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── 3. Feed → ingestor ───────────────────────────────────────────────
    let (events_tx, events_rx) = mpsc::channel(FEED_CHANNEL_CAPACITY);
    let ingest_handle = tokio::spawn(
        state
            .ingestor
            .clone()
            .run(events_rx, shutdown_rx.clone()),
    );
    let feed_handle = tokio::spawn(run_feed(
        config.feed_url.clone(),
        config.symbols.clone(),
        Duration::from_secs(config.reconnect_delay_secs.max(1)),
        events_tx,
        shutdown_rx.clone(),
    ));

    // ── 4. Persistence ───────────────────────────────────────────────────
    let persist_handle = match CandleStore::open(&config.database_path) {
        Ok(store) => {
            let sink: Arc<dyn CandleSink> = Arc::new(store);
            Some(tokio::spawn(run_persistence_loop(
                state.tick_store.clone(),
                sink,
                config.symbols.clone(),
                timeframes,
                Duration::from_secs(config.persist_interval_secs.max(1)),
                shutdown_rx.clone(),
            )))
        }
        Err(e) => {
            // Analytics keep running without durability.
            error!(error = %e, "Candle DB unavailable -- persistence disabled");
            None
        }
    };

    // ── 5. API server ────────────────────────────────────────────────────
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind API server on {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, "API server listening");
    let app = api::rest::router(state.clone());
    let mut api_shutdown = shutdown_rx.clone();
    let api_handle = tokio::spawn(async move {
        let served = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = api_shutdown.wait_for(|stop| *stop).await;
            })
            .await;
        if let Err(e) = served {
            error!(error = %e, "API server failed");
        }
    });

    info!("All subsystems running. Press Ctrl+C to stop.");

    // ── 6. Graceful shutdown ─────────────────────────────────────────────
    tokio::signal::ctrl_c().await?;
    warn!("Shutdown signal received -- stopping gracefully");
    let _ = shutdown_tx.send(true);

    if let Err(e) = feed_handle.await {
        error!(error = %e, "feed task failed");
    }
    if let Err(e) = ingest_handle.await {
        error!(error = %e, "ingestor task failed");
    }
    if let Some(handle) = persist_handle {
        if let Err(e) = handle.await {
            error!(error = %e, "persistence task failed");
        }
    }
    let _ = api_handle.await;

    info!("pairwatch shut down complete.");
    Ok(())
}
