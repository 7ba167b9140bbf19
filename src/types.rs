// =============================================================================
// Shared types used across the pairwatch core
// =============================================================================

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// A single normalised trade/ticker observation for one instrument.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub quantity: f64,
}

impl Tick {
    pub fn new(timestamp: DateTime<Utc>, price: f64, quantity: f64) -> Self {
        Self {
            timestamp,
            price,
            quantity,
        }
    }
}

/// Most recent observation for an instrument, as shown on the live view.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatestTick {
    pub price: f64,
    pub quantity: f64,
    pub timestamp: DateTime<Utc>,
}

impl From<Tick> for LatestTick {
    fn from(tick: Tick) -> Self {
        Self {
            price: tick.price,
            quantity: tick.quantity,
            timestamp: tick.timestamp,
        }
    }
}

/// Parsed event handed over by a feed adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedEvent {
    pub instrument: String,
    pub last_price: f64,
    pub volume: f64,
    pub event_time_ms: i64,
}

impl FeedEvent {
    /// Event time as a UTC instant, `None` when out of chrono's range.
    pub fn event_time(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.event_time_ms).single()
    }
}

/// One completed OHLCV bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub interval_start: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    /// Number of ticks that fell into the bucket.
    pub tick_count: u64,
}
