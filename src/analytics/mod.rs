// =============================================================================
// Pairs Analytics Module
// =============================================================================
//
// Pure computations over resampled close-price series.  Nothing in here
// touches shared state; callers pass series in and own what comes back.

pub mod pairs;
pub mod regression;
pub mod series;
pub mod stationarity;

pub use pairs::{
    hedge_ratio, pair_statistics, rolling_correlation, rolling_zscore, spread, stationarity_test,
    PairStatistics, DEFAULT_WINDOW, MIN_HEDGE_POINTS,
};
pub use series::{align, AlignedPoint, Observation, Series};
pub use stationarity::{adf_test, AdfResult, CriticalValues};
