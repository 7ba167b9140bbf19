// =============================================================================
// Ticker Feed — Binance combined `@ticker` stream → FeedEvent channel
// =============================================================================
//
// The adapter owns the network session only.  It turns each 24hr ticker
// payload into a `FeedEvent` and offers it to the ingestor over a bounded
// channel.  The feed never waits on the ingestor: when the channel is full
// the event is discarded, the same way the tick store discards old ticks.
//
// `run_ticker_stream` is one session and returns when the socket closes or
// errors.  `run_feed` reconnects until shutdown.
// =============================================================================

use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::StreamExt;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::connect_async;
use tracing::{debug, error, info, warn};

use crate::types::FeedEvent;

pub const DEFAULT_FEED_URL: &str = "wss://stream.binance.com:9443/stream";

/// Events buffered between the feed and the ingestor.
pub const FEED_CHANNEL_CAPACITY: usize = 4_096;

/// Build the combined-stream URL subscribing to `<symbol>@ticker` for each
/// symbol.
pub fn build_ticker_url(base: &str, symbols: &[String]) -> String {
    let streams: Vec<String> = symbols
        .iter()
        .map(|s| format!("{}@ticker", s.to_lowercase()))
        .collect();
    format!("{base}?streams={}", streams.join("/"))
}

/// Connect to the ticker stream and forward parsed events to `events`.
///
/// Returns `Ok(())` when the server ends the stream or the receiving side
/// has gone away, `Err` on connection or read failures.
pub async fn run_ticker_stream(
    base_url: &str,
    symbols: &[String],
    events: &mpsc::Sender<FeedEvent>,
) -> Result<()> {
    let url = build_ticker_url(base_url, symbols);
    info!(url = %url, symbols = ?symbols, "connecting to ticker WebSocket");

    let (ws_stream, _response) = connect_async(&url)
        .await
        .context("failed to connect to ticker WebSocket")?;

    info!(count = symbols.len(), "ticker WebSocket connected");
    let (_write, mut read) = ws_stream.split();

    loop {
        match read.next().await {
            Some(Ok(msg)) => {
                if let tokio_tungstenite::tungstenite::Message::Text(text) = msg {
                    match parse_ticker_message(&text) {
                        Ok(Some(event)) => {
                            if !forward(events, event) {
                                warn!("ingestor channel closed -- stopping ticker stream");
                                return Ok(());
                            }
                        }
                        Ok(None) => debug!("ignoring non-ticker frame"),
                        Err(e) => warn!(error = %e, "failed to parse ticker message"),
                    }
                }
            }
            Some(Err(e)) => {
                error!(error = %e, "ticker WebSocket read error");
                return Err(e.into());
            }
            None => {
                warn!("ticker WebSocket stream ended");
                return Ok(());
            }
        }
    }
}

/// Offer one event to the ingestor without waiting.  A full channel drops
/// the event.  Returns `false` once the receiving side is gone.
pub fn forward(events: &mpsc::Sender<FeedEvent>, event: FeedEvent) -> bool {
    match events.try_send(event) {
        Ok(()) => true,
        Err(TrySendError::Full(dropped)) => {
            debug!(symbol = %dropped.instrument, "ingestor channel full -- dropping event");
            true
        }
        Err(TrySendError::Closed(_)) => false,
    }
}

/// Keep a ticker session open, pausing `reconnect` between sessions, until
/// `shutdown` flips to `true` or the ingestor drops its receiver.
pub async fn run_feed(
    base_url: String,
    symbols: Vec<String>,
    reconnect: Duration,
    events: mpsc::Sender<FeedEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(symbols = ?symbols, "feed task started");
    loop {
        tokio::select! {
            biased;
            _ = wait_for_shutdown(&mut shutdown) => break,
            session = run_ticker_stream(&base_url, &symbols, &events) => {
                if let Err(e) = session {
                    error!(error = %e, "Ticker stream error -- reconnecting");
                }
            }
        }
        if events.is_closed() {
            break;
        }
        tokio::select! {
            biased;
            _ = wait_for_shutdown(&mut shutdown) => break,
            _ = tokio::time::sleep(reconnect) => {}
        }
    }
    info!("feed task stopped");
}

/// Resolves once shutdown is requested or the sender is dropped.
async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

/// Parse a combined-stream ticker frame.
///
/// Expected shape:
/// ```json
/// { "stream": "btcusdt@ticker",
///   "data": { "e": "24hrTicker", "E": 1700000000000, "s": "BTCUSDT", "c": "37000.1", "v": "1234.5" } }
/// ```
///
/// Frames without a `data` envelope (subscription acks and the like) yield
/// `Ok(None)`.
pub fn parse_ticker_message(text: &str) -> Result<Option<FeedEvent>> {
    let root: serde_json::Value =
        serde_json::from_str(text).context("failed to parse ticker JSON")?;

    let Some(data) = root.get("data") else {
        return Ok(None);
    };

    let instrument = data["s"]
        .as_str()
        .context("missing field data.s")?
        .to_uppercase();
    let last_price = parse_number(&data["c"], "data.c")?;
    let volume = parse_number(&data["v"], "data.v")?;
    let event_time_ms = data["E"].as_i64().context("missing field data.E")?;

    Ok(Some(FeedEvent {
        instrument,
        last_price,
        volume,
        event_time_ms,
    }))
}

/// Binance sends most numeric fields as JSON strings.
fn parse_number(val: &serde_json::Value, name: &str) -> Result<f64> {
    match val {
        serde_json::Value::String(s) => s
            .parse::<f64>()
            .with_context(|| format!("failed to parse {name} as f64: {s}")),
        serde_json::Value::Number(n) => n
            .as_f64()
            .with_context(|| format!("field {name} is not a valid f64")),
        _ => anyhow::bail!("field {name} has unexpected JSON type"),
    }
}
