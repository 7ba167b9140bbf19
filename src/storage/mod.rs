// =============================================================================
// Storage — persistence collaborator for completed candles
// =============================================================================
//
// Persistence sits off the hot path.  The loop below takes a fresh resample
// of every configured (symbol, timeframe), hands the completed candles to a
// `CandleSink` on a blocking thread, and logs failures.  A failing sink never
// touches the tick store and never stops ingestion.
// =============================================================================

pub mod candle_store;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::market_data::{resample_ticks, TickStore, Timeframe};
use crate::types::Candle;

pub use candle_store::CandleStore;

/// Receives completed candles.  Implementations must treat re-delivery of
/// an existing `(symbol, timeframe, interval_start)` as a no-op.
pub trait CandleSink: Send + Sync {
    /// Returns the number of rows newly stored.
    fn persist(&self, symbol: &str, timeframe: Timeframe, candles: &[Candle]) -> Result<usize>;
}

/// One persistence pass.  Returns rows newly written; per-series failures
/// are logged and skipped.
pub fn persist_once(
    store: &TickStore,
    sink: &dyn CandleSink,
    symbols: &[String],
    timeframes: &[Timeframe],
    now: DateTime<Utc>,
) -> usize {
    let mut written = 0;
    for symbol in symbols {
        let ticks = store.snapshot(symbol);
        if ticks.is_empty() {
            continue;
        }
        for &tf in timeframes {
            let candles = resample_ticks(&ticks, tf, now);
            match sink.persist(symbol, tf, &candles) {
                Ok(n) => written += n,
                Err(e) => {
                    warn!(symbol = %symbol, timeframe = %tf, error = %e, "candle persistence failed");
                }
            }
        }
    }
    written
}

/// Run [`persist_once`] every `every` until `shutdown` flips to `true`.
pub async fn run_persistence_loop(
    store: Arc<TickStore>,
    sink: Arc<dyn CandleSink>,
    symbols: Vec<String>,
    timeframes: Vec<Timeframe>,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(
        symbols = ?symbols,
        timeframes = ?timeframes,
        every_secs = every.as_secs(),
        "persistence loop started"
    );
    let mut interval = tokio::time::interval(every);
    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = interval.tick() => {
                let store = store.clone();
                let sink = sink.clone();
                let symbols = symbols.clone();
                let timeframes = timeframes.clone();
                let pass = tokio::task::spawn_blocking(move || {
                    persist_once(&store, sink.as_ref(), &symbols, &timeframes, Utc::now())
                })
                .await;
                match pass {
                    Ok(n) if n > 0 => debug!(rows = n, "candles persisted"),
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "persistence task panicked"),
                }
            }
        }
    }
    info!("persistence loop stopped");
}
