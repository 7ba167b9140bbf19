// =============================================================================
// Resampler — tick snapshot → fixed-interval OHLCV candles
// =============================================================================
//
// Buckets are aligned to the Unix epoch, i.e. to whole seconds / minutes /
// five-minute marks, never to the first tick seen.
//
// Incomplete-candle policy: `now` falls inside exactly one interval, the
// currently open one.  That bucket, and anything stamped after it, is still
// accumulating and is withheld.  Every returned candle therefore ends at or
// before the start of the open interval.
//
// Candles are rebuilt from a fresh snapshot on every call; nothing is cached.
// =============================================================================

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::ResampleError;
use crate::market_data::TickStore;
use crate::types::{Candle, Tick};

/// Supported candle widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1s")]
    OneSecond,
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "5m")]
    FiveMinutes,
}

impl Timeframe {
    pub const ALL: [Timeframe; 3] = [Self::OneSecond, Self::OneMinute, Self::FiveMinutes];

    pub fn width_ms(self) -> i64 {
        match self {
            Self::OneSecond => 1_000,
            Self::OneMinute => 60_000,
            Self::FiveMinutes => 300_000,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::OneSecond => "1s",
            Self::OneMinute => "1m",
            Self::FiveMinutes => "5m",
        }
    }

    /// Start (ms since epoch) of the interval containing `ts_ms`.
    pub fn bucket_start_ms(self, ts_ms: i64) -> i64 {
        ts_ms.div_euclid(self.width_ms()) * self.width_ms()
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Timeframe {
    type Err = ResampleError;

    /// Accepts the short labels plus the `1min` / `5min` spellings used by
    /// dataframe tooling.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1s" => Ok(Self::OneSecond),
            "1m" | "1min" => Ok(Self::OneMinute),
            "5m" | "5min" => Ok(Self::FiveMinutes),
            other => Err(ResampleError::InvalidTimeframe {
                timeframe: other.to_string(),
            }),
        }
    }
}

/// Resample the current snapshot of `instrument` into completed candles.
///
/// `now` is the reference instant for the incomplete-candle policy; the
/// service passes `Utc::now()`, tests pass a fixed clock.
pub fn resample(
    store: &TickStore,
    instrument: &str,
    timeframe: &str,
    now: DateTime<Utc>,
) -> Result<Vec<Candle>, ResampleError> {
    let timeframe: Timeframe = timeframe.parse()?;
    Ok(resample_ticks(&store.snapshot(instrument), timeframe, now))
}

/// Bucket `ticks` (sorted by timestamp) into candles, withholding the
/// interval that is still open at `now`.
pub fn resample_ticks(ticks: &[Tick], timeframe: Timeframe, now: DateTime<Utc>) -> Vec<Candle> {
    let open_bucket = timeframe.bucket_start_ms(now.timestamp_millis());
    let mut candles: Vec<Candle> = Vec::new();
    let mut current: Option<(i64, Candle)> = None;

    for tick in ticks {
        let bucket = timeframe.bucket_start_ms(tick.timestamp.timestamp_millis());
        if bucket >= open_bucket {
            // Sorted input: everything from here on is incomplete.
            break;
        }
        if let Some((start, candle)) = current.as_mut() {
            if *start == bucket {
                candle.high = candle.high.max(tick.price);
                candle.low = candle.low.min(tick.price);
                candle.close = tick.price;
                candle.volume += tick.quantity;
                candle.tick_count += 1;
                continue;
            }
        }
        let Some(interval_start) = Utc.timestamp_millis_opt(bucket).single() else {
            continue;
        };
        if let Some((_, done)) = current.take() {
            candles.push(done);
        }
        current = Some((
            bucket,
            Candle {
                interval_start,
                open: tick.price,
                high: tick.price,
                low: tick.price,
                close: tick.price,
                volume: tick.quantity,
                tick_count: 1,
            },
        ));
    }
    if let Some((_, done)) = current {
        candles.push(done);
    }

    trace!(
        ticks = ticks.len(),
        candles = candles.len(),
        timeframe = %timeframe,
        "resampled"
    );
    candles
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const T0: i64 = 1_700_000_000_000;

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    fn store_with(prices: &[(i64, f64, f64)]) -> TickStore {
        let store = TickStore::new(1_000);
        for &(ms, price, qty) in prices {
            store.append("A", Tick::new(at(ms), price, qty));
        }
        store
    }

    #[test]
    fn completed_bucket_returned_open_bucket_withheld() {
        let store = store_with(&[
            (T0 + 100, 100.0, 1.0),
            (T0 + 300, 101.0, 2.0),
            (T0 + 500, 99.0, 0.5),
            (T0 + 900, 102.0, 1.5),
            (T0 + 1_200, 103.0, 4.0),
        ]);
        let candles = resample(&store, "A", "1s", at(T0 + 1_500)).unwrap();
        assert_eq!(candles.len(), 1);
        let c = &candles[0];
        assert_eq!(c.interval_start, at(T0));
        assert_eq!(c.open, 100.0);
        assert_eq!(c.high, 102.0);
        assert_eq!(c.low, 99.0);
        assert_eq!(c.close, 102.0);
        assert!((c.volume - 5.0).abs() < 1e-12);
        assert_eq!(c.tick_count, 4);
    }

    #[test]
    fn last_candle_ends_before_open_interval() {
        let ticks: Vec<(i64, f64, f64)> = (0..50).map(|i| (T0 + i * 370, 100.0 + i as f64, 1.0)).collect();
        let store = store_with(&ticks);
        for now_offset in [0, 999, 1_000, 7_345, 18_130, 40_000] {
            let now = at(T0 + now_offset);
            let candles = resample(&store, "A", "1s", now).unwrap();
            if let Some(last) = candles.last() {
                let end = last.interval_start.timestamp_millis() + 1_000;
                let open_start = Timeframe::OneSecond.bucket_start_ms(now.timestamp_millis());
                assert!(end <= open_start, "candle ending {end} overlaps open interval {open_start}");
            }
        }
    }

    #[test]
    fn all_buckets_complete_when_now_is_later() {
        let store = store_with(&[(T0 + 100, 1.0, 1.0), (T0 + 1_100, 2.0, 1.0)]);
        let candles = resample(&store, "A", "1s", at(T0 + 5_000)).unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[1].interval_start, at(T0 + 1_000));
    }

    #[test]
    fn empty_buckets_are_skipped() {
        let store = store_with(&[(T0, 1.0, 1.0), (T0 + 5_000, 2.0, 1.0)]);
        let candles = resample(&store, "A", "1s", at(T0 + 10_000)).unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[1].interval_start, at(T0 + 5_000));
    }

    #[test]
    fn out_of_order_ticks_bucket_in_time_order() {
        let store = store_with(&[
            (T0 + 900, 5.0, 1.0),
            (T0 + 100, 1.0, 1.0),
            (T0 + 500, 3.0, 1.0),
        ]);
        let candles = resample(&store, "A", "1s", at(T0 + 2_000)).unwrap();
        assert_eq!(candles[0].open, 1.0);
        assert_eq!(candles[0].close, 5.0);
    }

    #[test]
    fn minute_buckets_align_to_calendar() {
        // T0 is 1_700_000_000_000 = 2023-11-14T22:13:20Z, 20 s into a minute.
        let store = store_with(&[(T0, 1.0, 1.0), (T0 + 45_000, 2.0, 1.0), (T0 + 50_000, 3.0, 1.0)]);
        let candles = resample(&store, "A", "1m", at(T0 + 600_000)).unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].interval_start.timestamp_millis() % 60_000, 0);
        assert_eq!(candles[0].interval_start, at(T0 - 20_000));
        assert_eq!(candles[1].open, 2.0);
        assert_eq!(candles[1].close, 3.0);
    }

    #[test]
    fn empty_snapshot_yields_no_candles() {
        let store = TickStore::new(10);
        assert!(resample(&store, "A", "5m", at(T0)).unwrap().is_empty());
    }

    #[test]
    fn unsupported_timeframe_is_an_error() {
        let store = TickStore::new(10);
        let err = resample(&store, "A", "3m", at(T0)).unwrap_err();
        assert_eq!(
            err,
            ResampleError::InvalidTimeframe {
                timeframe: "3m".into()
            }
        );
    }

    #[test]
    fn timeframe_parsing_and_labels() {
        assert_eq!("1min".parse::<Timeframe>().unwrap(), Timeframe::OneMinute);
        assert_eq!("5min".parse::<Timeframe>().unwrap(), Timeframe::FiveMinutes);
        assert_eq!(Timeframe::OneSecond.to_string(), "1s");
        assert_eq!(Timeframe::FiveMinutes.bucket_start_ms(-1), -300_000);
        for tf in Timeframe::ALL {
            assert_eq!(tf.label().parse::<Timeframe>().unwrap(), tf);
        }
    }
}
