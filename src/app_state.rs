// =============================================================================
// Central Application State
// =============================================================================
//
// Explicitly constructed owner of the shared market-data state.  The tick
// store and latest-value cache are created here and handed to the ingestor;
// the API and the persistence loop read through the same `Arc`s.  Nothing is
// process-global, so tests build as many isolated instances as they like.
//
// Thread safety:
//   - The tick store locks per instrument.
//   - The latest-value cache uses parking_lot::RwLock.
//   - The runtime config is read-only once the service has started.
//   - Ingest counters are atomics inside the ingestor.
// =============================================================================

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::analytics::{pair_statistics, PairStatistics, Series};
use crate::error::ResampleError;
use crate::market_data::{resample, Ingestor, LatestTickCache, TickStore};
use crate::runtime_config::RuntimeConfig;
use crate::types::{Candle, LatestTick};

pub struct AppState {
    pub runtime_config: Arc<RuntimeConfig>,
    pub tick_store: Arc<TickStore>,
    pub latest_cache: Arc<LatestTickCache>,
    pub ingestor: Arc<Ingestor>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: RuntimeConfig) -> Self {
        let tick_store = Arc::new(TickStore::new(config.tick_capacity));
        let latest_cache = Arc::new(LatestTickCache::new());
        let ingestor = Arc::new(Ingestor::new(tick_store.clone(), latest_cache.clone()));
        Self {
            runtime_config: Arc::new(config),
            tick_store,
            latest_cache,
            ingestor,
            started_at: Utc::now(),
        }
    }

    pub fn latest(&self, instrument: &str) -> Option<LatestTick> {
        self.latest_cache.latest(instrument)
    }

    pub fn analytics_window(&self) -> usize {
        self.runtime_config.analytics_window
    }

    /// Completed candles for `instrument` as of `now`.
    pub fn resample_at(
        &self,
        instrument: &str,
        timeframe: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<Candle>, ResampleError> {
        resample(&self.tick_store, instrument, timeframe, now)
    }

    pub fn resample(&self, instrument: &str, timeframe: &str) -> Result<Vec<Candle>, ResampleError> {
        self.resample_at(instrument, timeframe, Utc::now())
    }

    /// Resample both legs with the same clock and compute the pair bundle on
    /// their closes.  `window` falls back to the configured default.
    pub fn pair_statistics_at(
        &self,
        a: &str,
        b: &str,
        timeframe: &str,
        window: Option<usize>,
        now: DateTime<Utc>,
    ) -> Result<PairStatistics, ResampleError> {
        let closes_a = Series::closes(&self.resample_at(a, timeframe, now)?);
        let closes_b = Series::closes(&self.resample_at(b, timeframe, now)?);
        let window = window.unwrap_or_else(|| self.analytics_window());
        Ok(pair_statistics(&closes_a, &closes_b, window))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const T0: i64 = 1_700_000_000_000;

    fn state() -> AppState {
        let cfg = RuntimeConfig {
            tick_capacity: 4,
            ..RuntimeConfig::default()
        };
        AppState::new(cfg)
    }

    #[test]
    fn ingest_then_read_back() {
        let st = state();
        for (i, price) in [100.0, 101.0, 99.0, 102.0].iter().enumerate() {
            assert!(st.ingestor.on_tick("A", *price, 1.0, T0 + i as i64 * 200));
        }
        assert!(st.ingestor.on_tick("A", 103.0, 2.0, T0 + 1_100));

        // Capacity 4: the first tick (100) was evicted.
        assert_eq!(st.tick_store.len("A"), 4);
        assert_eq!(st.latest("A").unwrap().price, 103.0);

        let now = Utc.timestamp_millis_opt(T0 + 1_500).unwrap();
        let candles = st.resample_at("A", "1s", now).unwrap();
        assert_eq!(candles.len(), 1);
        assert_eq!(candles[0].open, 101.0);
        assert_eq!(candles[0].close, 102.0);
    }

    #[test]
    fn instances_are_isolated() {
        let one = state();
        let two = state();
        one.ingestor.on_tick("A", 1.0, 1.0, T0);
        assert!(two.latest("A").is_none());
        assert!(two.tick_store.is_empty("A"));
    }

    #[test]
    fn pair_statistics_propagates_invalid_timeframe() {
        let st = state();
        let now = Utc.timestamp_millis_opt(T0).unwrap();
        assert!(matches!(
            st.pair_statistics_at("A", "B", "15m", None, now),
            Err(ResampleError::InvalidTimeframe { .. })
        ));
    }

    #[test]
    fn pair_statistics_waits_for_data() {
        let st = state();
        st.ingestor.on_tick("A", 1.0, 1.0, T0);
        st.ingestor.on_tick("B", 2.0, 1.0, T0);
        let now = Utc.timestamp_millis_opt(T0 + 5_000).unwrap();
        let stats = st.pair_statistics_at("A", "B", "1s", None, now).unwrap();
        assert!(stats.hedge_ratio.is_none());
        assert!(stats.adf_result.is_none());
    }

    #[test]
    fn pair_statistics_on_resampled_closes() {
        let st = AppState::new(RuntimeConfig::default());
        for i in 0..60_i64 {
            let p = 100.0 + 3.0 * (i as f64 * 0.4).sin() + 0.05 * i as f64;
            st.ingestor.on_tick("A", p, 1.0, T0 + i * 1_000 + 10);
            st.ingestor.on_tick("B", 2.0 * p, 1.0, T0 + i * 1_000 + 20);
        }
        let now = Utc.timestamp_millis_opt(T0 + 60_500).unwrap();
        let stats = st.pair_statistics_at("A", "B", "1s", Some(20), now).unwrap();
        assert!((stats.hedge_ratio.unwrap() - 0.5).abs() < 1e-9);
        assert_eq!(stats.spread.len(), 60);
        assert!((stats.rolling_correlation.last_value().unwrap() - 1.0).abs() < 1e-9);
    }
}
