// =============================================================================
// Tick Store — bounded per-instrument tick history
// =============================================================================
//
// Each instrument owns its own ring buffer behind its own mutex, so writers and
// readers of unrelated instruments never contend.  The outer map is only
// write-locked the first time an instrument is seen.
//
// Buffers are kept in insertion order.  Readers get a sorted copy; nothing
// assumes the feed delivered ticks in time order.
// =============================================================================

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::types::Tick;

/// Default number of ticks retained per instrument.
pub const DEFAULT_TICK_CAPACITY: usize = 10_000;

type TickRing = Arc<Mutex<VecDeque<Tick>>>;

/// Thread-safe, capacity-bounded FIFO of ticks keyed by instrument.
pub struct TickStore {
    buffers: RwLock<HashMap<String, TickRing>>,
    capacity: usize,
}

impl Default for TickStore {
    fn default() -> Self {
        Self::new(DEFAULT_TICK_CAPACITY)
    }
}

impl TickStore {
    /// Create a store retaining at most `capacity` ticks per instrument.
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        Self {
            buffers: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn ring(&self, instrument: &str) -> Option<TickRing> {
        self.buffers.read().get(instrument).cloned()
    }

    fn ring_or_insert(&self, instrument: &str) -> TickRing {
        if let Some(ring) = self.ring(instrument) {
            return ring;
        }
        let mut map = self.buffers.write();
        map.entry(instrument.to_string())
            .or_insert_with(|| {
                debug!(symbol = %instrument, capacity = self.capacity, "tick buffer created");
                Arc::new(Mutex::new(VecDeque::with_capacity(self.capacity)))
            })
            .clone()
    }

    /// Append `tick` to the instrument's buffer, evicting the oldest entry
    /// first when the buffer is full.
    pub fn append(&self, instrument: &str, tick: Tick) {
        let ring = self.ring_or_insert(instrument);
        let mut buf = ring.lock();
        if buf.len() >= self.capacity {
            buf.pop_front();
        }
        buf.push_back(tick);
    }

    /// Point-in-time copy of the instrument's ticks sorted by timestamp
    /// (stable, so equal timestamps keep arrival order).  Unknown
    /// instruments yield an empty vector.
    pub fn snapshot(&self, instrument: &str) -> Vec<Tick> {
        let Some(ring) = self.ring(instrument) else {
            return Vec::new();
        };
        let mut ticks: Vec<Tick> = ring.lock().iter().copied().collect();
        ticks.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        ticks
    }

    /// Number of ticks currently held for `instrument`.
    pub fn len(&self, instrument: &str) -> usize {
        self.ring(instrument).map_or(0, |ring| ring.lock().len())
    }

    pub fn is_empty(&self, instrument: &str) -> bool {
        self.len(instrument) == 0
    }

    /// Instruments that have received at least one tick, sorted.
    pub fn instruments(&self) -> Vec<String> {
        let mut names: Vec<String> = self.buffers.read().keys().cloned().collect();
        names.sort();
        names
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn tick(ms: i64, price: f64) -> Tick {
        Tick::new(Utc.timestamp_millis_opt(ms).unwrap(), price, 1.0)
    }

    #[test]
    fn fifo_eviction_keeps_most_recent() {
        let store = TickStore::new(3);
        for i in 0..10 {
            store.append("BTCUSDT", tick(i * 1_000, i as f64));
            assert!(store.len("BTCUSDT") <= 3);
        }
        let prices: Vec<f64> = store.snapshot("BTCUSDT").iter().map(|t| t.price).collect();
        assert_eq!(prices, vec![7.0, 8.0, 9.0]);
    }

    #[test]
    fn eviction_is_by_arrival_not_timestamp() {
        let store = TickStore::new(2);
        store.append("A", tick(5_000, 1.0));
        store.append("A", tick(1_000, 2.0));
        store.append("A", tick(3_000, 3.0));
        // The first-appended tick goes, even though it has the latest time.
        let prices: Vec<f64> = store.snapshot("A").iter().map(|t| t.price).collect();
        assert_eq!(prices, vec![2.0, 3.0]);
    }

    #[test]
    fn snapshot_sorts_out_of_order_ticks() {
        let store = TickStore::new(10);
        store.append("A", tick(3_000, 3.0));
        store.append("A", tick(1_000, 1.0));
        store.append("A", tick(2_000, 2.0));
        let prices: Vec<f64> = store.snapshot("A").iter().map(|t| t.price).collect();
        assert_eq!(prices, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn snapshot_is_a_copy() {
        let store = TickStore::new(10);
        store.append("A", tick(1_000, 1.0));
        let snap = store.snapshot("A");
        store.append("A", tick(2_000, 2.0));
        assert_eq!(snap.len(), 1);
        assert_eq!(store.len("A"), 2);
    }

    #[test]
    fn unknown_instrument_is_empty() {
        let store = TickStore::default();
        assert!(store.snapshot("NOPE").is_empty());
        assert!(store.is_empty("NOPE"));
        assert_eq!(store.capacity(), DEFAULT_TICK_CAPACITY);
    }

    #[test]
    fn zero_capacity_clamped() {
        let store = TickStore::new(0);
        store.append("A", tick(1, 1.0));
        store.append("A", tick(2, 2.0));
        assert_eq!(store.len("A"), 1);
    }

    #[test]
    fn instruments_are_isolated() {
        let store = TickStore::new(2);
        for i in 0..5 {
            store.append("A", tick(i, 1.0));
        }
        store.append("B", tick(0, 2.0));
        assert_eq!(store.len("A"), 2);
        assert_eq!(store.len("B"), 1);
        assert_eq!(store.instruments(), vec!["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn concurrent_writers_and_readers_respect_capacity() {
        let store = Arc::new(TickStore::new(100));
        let mut handles = Vec::new();
        for w in 0..4 {
            let s = store.clone();
            handles.push(std::thread::spawn(move || {
                let sym = format!("SYM{w}");
                for i in 0..1_000 {
                    s.append(&sym, tick(i, i as f64));
                }
            }));
        }
        for _ in 0..2 {
            let s = store.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..200 {
                    for w in 0..4 {
                        let snap = s.snapshot(&format!("SYM{w}"));
                        assert!(snap.len() <= 100);
                        assert!(snap.windows(2).all(|p| p[0].timestamp <= p[1].timestamp));
                    }
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        for w in 0..4 {
            let snap = store.snapshot(&format!("SYM{w}"));
            assert_eq!(snap.len(), 100);
            assert_eq!(snap[0].price, 900.0);
            assert_eq!(snap[99].price, 999.0);
        }
    }
}
