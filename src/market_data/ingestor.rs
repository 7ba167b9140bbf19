// =============================================================================
// Ingestor — validates feed events and writes them to the shared state
// =============================================================================
//
// The ingestor is the only writer of the tick store and the latest-value
// cache.  Each accepted tick is appended to the store first and then written
// to the cache; both structures guard their own invariants, so a reader of
// either never sees a half-applied update.
//
// Malformed events (negative or non-finite price/quantity, empty symbol,
// unrepresentable timestamp) are counted and dropped.  They never stop the
// consumption loop.
// =============================================================================

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::market_data::{LatestTickCache, TickStore};
use crate::types::{FeedEvent, LatestTick, Tick};

/// Running totals exposed on the health endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    pub accepted: u64,
    pub dropped: u64,
}

pub struct Ingestor {
    store: Arc<TickStore>,
    cache: Arc<LatestTickCache>,
    accepted: AtomicU64,
    dropped: AtomicU64,
}

impl Ingestor {
    pub fn new(store: Arc<TickStore>, cache: Arc<LatestTickCache>) -> Self {
        Self {
            store,
            cache,
            accepted: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Validate and ingest one observation.  Returns `false` when the event
    /// was dropped as malformed.
    pub fn on_tick(&self, instrument: &str, price: f64, quantity: f64, event_time_ms: i64) -> bool {
        let event = FeedEvent {
            instrument: instrument.to_string(),
            last_price: price,
            volume: quantity,
            event_time_ms,
        };
        self.on_event(&event)
    }

    pub fn on_event(&self, event: &FeedEvent) -> bool {
        let Some(tick) = normalize(event) else {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            debug!(
                symbol = %event.instrument,
                price = event.last_price,
                quantity = event.volume,
                event_time_ms = event.event_time_ms,
                "dropping malformed feed event"
            );
            return false;
        };

        self.store.append(&event.instrument, tick);
        self.cache.update(&event.instrument, LatestTick::from(tick));
        self.accepted.fetch_add(1, Ordering::Relaxed);
        true
    }

    pub fn stats(&self) -> IngestStats {
        IngestStats {
            accepted: self.accepted.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }

    /// Consume feed events until the channel closes or `shutdown` flips to
    /// `true`.  Cancellation is only observed between events, so an append
    /// in progress always completes.
    pub async fn run(
        self: Arc<Self>,
        mut events: mpsc::Receiver<FeedEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!("ingestor started");
        loop {
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("ingestor received shutdown signal");
                        break;
                    }
                }
                event = events.recv() => match event {
                    Some(ev) => {
                        self.on_event(&ev);
                    }
                    None => {
                        warn!("feed channel closed -- ingestor stopping");
                        break;
                    }
                },
            }
        }
        let stats = self.stats();
        info!(accepted = stats.accepted, dropped = stats.dropped, "ingestor stopped");
    }
}

fn normalize(event: &FeedEvent) -> Option<Tick> {
    if event.instrument.is_empty() {
        return None;
    }
    let valid = |v: f64| v.is_finite() && v >= 0.0;
    if !valid(event.last_price) || !valid(event.volume) {
        return None;
    }
    let timestamp = event.event_time()?;
    Some(Tick::new(timestamp, event.last_price, event.volume))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn ingestor(capacity: usize) -> (Arc<Ingestor>, Arc<TickStore>, Arc<LatestTickCache>) {
        let store = Arc::new(TickStore::new(capacity));
        let cache = Arc::new(LatestTickCache::new());
        let ing = Arc::new(Ingestor::new(store.clone(), cache.clone()));
        (ing, store, cache)
    }

    fn event(sym: &str, price: f64, ms: i64) -> FeedEvent {
        FeedEvent {
            instrument: sym.into(),
            last_price: price,
            volume: 1.5,
            event_time_ms: ms,
        }
    }

    #[test]
    fn accepted_tick_updates_store_and_cache() {
        let (ing, store, cache) = ingestor(10);
        assert!(ing.on_tick("BTCUSDT", 100.0, 2.0, 1_000));
        assert_eq!(store.len("BTCUSDT"), 1);
        let latest = cache.latest("BTCUSDT").unwrap();
        assert_eq!(latest.price, 100.0);
        assert_eq!(latest.quantity, 2.0);
        assert_eq!(latest.timestamp.timestamp_millis(), 1_000);
        assert_eq!(ing.stats(), IngestStats { accepted: 1, dropped: 0 });
    }

    #[test]
    fn malformed_ticks_are_dropped() {
        let (ing, store, cache) = ingestor(10);
        assert!(!ing.on_tick("A", -1.0, 1.0, 1_000));
        assert!(!ing.on_tick("A", 1.0, -0.5, 1_000));
        assert!(!ing.on_tick("A", f64::NAN, 1.0, 1_000));
        assert!(!ing.on_tick("A", f64::INFINITY, 1.0, 1_000));
        assert!(!ing.on_tick("", 1.0, 1.0, 1_000));
        assert!(!ing.on_tick("A", 1.0, 1.0, i64::MAX));
        assert!(store.is_empty("A"));
        assert!(cache.latest("A").is_none());
        assert_eq!(ing.stats().dropped, 6);
    }

    #[test]
    fn zero_price_and_quantity_are_valid() {
        let (ing, store, _) = ingestor(10);
        assert!(ing.on_tick("A", 0.0, 0.0, 0));
        assert_eq!(store.len("A"), 1);
    }

    #[test]
    fn out_of_order_ticks_do_not_panic() {
        let (ing, store, cache) = ingestor(10);
        ing.on_tick("A", 3.0, 1.0, 3_000);
        ing.on_tick("A", 1.0, 1.0, 1_000);
        let prices: Vec<f64> = store.snapshot("A").iter().map(|t| t.price).collect();
        assert_eq!(prices, vec![1.0, 3.0]);
        // Cache reflects the most recently ingested tick, not the newest timestamp.
        assert_eq!(cache.latest("A").unwrap().price, 1.0);
    }

    #[tokio::test]
    async fn run_loop_consumes_until_channel_closes() {
        let (ing, store, _) = ingestor(10);
        let (tx, rx) = mpsc::channel(16);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        tx.try_send(event("A", 1.0, 1_000)).unwrap();
        tx.try_send(event("B", 2.0, 1_000)).unwrap();
        tx.try_send(event("A", -2.0, 2_000)).unwrap();
        drop(tx);

        ing.clone().run(rx, shutdown_rx).await;
        assert_eq!(store.len("A"), 1);
        assert_eq!(store.len("B"), 1);
        assert_eq!(ing.stats(), IngestStats { accepted: 2, dropped: 1 });
    }

    #[tokio::test]
    async fn run_loop_stops_on_shutdown() {
        let (ing, store, _) = ingestor(10);
        let (tx, rx) = mpsc::channel(16);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(ing.clone().run(rx, shutdown_rx));
        tx.try_send(event("A", 1.0, 1_000)).unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        shutdown_tx.send(true).unwrap();

        tokio::time::timeout(std::time::Duration::from_secs(1), handle)
            .await
            .expect("ingestor should stop")
            .unwrap();
        assert_eq!(store.len("A"), 1);
        // Sender still alive: loop exited because of the signal.
        assert!(tx.try_send(event("A", 2.0, 2_000)).is_err());
    }
}
