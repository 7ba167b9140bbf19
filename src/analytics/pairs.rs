// =============================================================================
// Pairs Analytics — hedge ratio, spread, z-score, correlation, stationarity
// =============================================================================
//
// Every function here is pure: inputs are the caller's series, outputs are
// fresh series.  Insufficient data is `None`; per-point arithmetic problems
// (unfilled window, zero variance, zero previous price) become gaps in the
// output series and never abort the rest of the computation.
//
// Window sizes count observations of the already-resampled input, not
// wall-clock time.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::analytics::regression::ols;
use crate::analytics::series::{align, Observation, Series};
use crate::analytics::stationarity::{adf_test, AdfResult};

/// Default rolling window, in observations.
pub const DEFAULT_WINDOW: usize = 30;
/// Minimum aligned points for a hedge-ratio fit.
pub const MIN_HEDGE_POINTS: usize = 10;

/// Everything the presentation layer shows for one pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairStatistics {
    pub hedge_ratio: Option<f64>,
    pub spread: Series,
    pub zscore: Series,
    pub rolling_correlation: Series,
    pub adf_result: Option<AdfResult>,
}

/// OLS slope of `a` on `b` (with intercept) over their shared timestamps.
pub fn hedge_ratio(a: &Series, b: &Series) -> Option<f64> {
    let joined = align(a, b);
    if joined.len() < MIN_HEDGE_POINTS {
        trace!(aligned = joined.len(), min = MIN_HEDGE_POINTS, "hedge ratio: insufficient data");
        return None;
    }
    let y: Vec<f64> = joined.iter().map(|p| p.a).collect();
    let x: Vec<f64> = joined.iter().map(|p| p.b).collect();
    let fit = ols(&y, &[x]);
    if fit.is_none() {
        trace!(aligned = joined.len(), "hedge ratio: degenerate regression");
    }
    fit.map(|f| f.slopes[0])
}

/// `a[t] - hedge_ratio * b[t]` for every shared timestamp.
pub fn spread(a: &Series, b: &Series, hedge_ratio: f64) -> Series {
    Series::from_values(
        align(a, b)
            .into_iter()
            .map(|p| (p.timestamp, p.a - hedge_ratio * p.b)),
    )
}

/// `(x - mean) / std` over a trailing window of `window` observations,
/// sample standard deviation.  A window containing a gap yields a gap.
pub fn rolling_zscore(series: &Series, window: usize) -> Series {
    let values = series.values();
    let points = series
        .iter()
        .enumerate()
        .map(|(i, obs)| Observation {
            timestamp: obs.timestamp,
            value: trailing(&values, i, window).and_then(zscore_of_last),
        })
        .collect();
    Series::new(points)
}

/// Trailing-window Pearson correlation of period-over-period returns
/// (`v[t] / v[t-1] - 1`), computed on the shared timestamps of `a` and `b`.
/// The first aligned point has no return, so the first defined value sits at
/// index `window`.
pub fn rolling_correlation(a: &Series, b: &Series, window: usize) -> Series {
    let joined = align(a, b);
    let ra: Vec<Option<f64>> = returns(joined.iter().map(|p| p.a));
    let rb: Vec<Option<f64>> = returns(joined.iter().map(|p| p.b));

    let points = joined
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let value = match (trailing(&ra, i, window), trailing(&rb, i, window)) {
                (Some(xa), Some(xb)) => pearson(&xa, &xb),
                _ => None,
            };
            Observation {
                timestamp: p.timestamp,
                value,
            }
        })
        .collect();
    Series::new(points)
}

/// ADF test on the defined points of `series`.
pub fn stationarity_test(series: &Series) -> Option<AdfResult> {
    adf_test(&series.defined())
}

/// Full bundle for a pair of close-price series.
///
/// Without a hedge ratio there is no spread, so spread, z-score and the
/// stationarity test come back empty; correlation is still computed.
pub fn pair_statistics(a: &Series, b: &Series, window: usize) -> PairStatistics {
    let hedge = hedge_ratio(a, b);
    let (spread_series, zscore, adf_result) = match hedge {
        Some(h) => {
            let s = spread(a, b, h);
            let z = rolling_zscore(&s, window);
            let adf = stationarity_test(&s);
            (s, z, adf)
        }
        None => (Series::default(), Series::default(), None),
    };

    PairStatistics {
        hedge_ratio: hedge,
        spread: spread_series,
        zscore,
        rolling_correlation: rolling_correlation(a, b, window),
        adf_result,
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// The `window` values ending at `end`, if the window is full and gap-free.
fn trailing(values: &[Option<f64>], end: usize, window: usize) -> Option<Vec<f64>> {
    if window == 0 || end + 1 < window {
        return None;
    }
    values[end + 1 - window..=end].iter().copied().collect()
}

fn mean_and_sample_std(xs: &[f64]) -> Option<(f64, f64)> {
    if xs.len() < 2 {
        return None;
    }
    let n = xs.len() as f64;
    let mean = xs.iter().sum::<f64>() / n;
    let var = xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some((mean, var.sqrt()))
}

fn zscore_of_last(window: Vec<f64>) -> Option<f64> {
    let (mean, std) = mean_and_sample_std(&window)?;
    // Spread at rounding-noise level relative to the mean counts as zero.
    if !(std > f64::EPSILON * mean.abs()) || !std.is_finite() {
        return None;
    }
    let last = *window.last()?;
    Some((last - mean) / std)
}

fn returns(values: impl Iterator<Item = f64>) -> Vec<Option<f64>> {
    let mut prev: Option<f64> = None;
    values
        .map(|v| {
            let r = match prev {
                Some(p) if p != 0.0 => Some(v / p - 1.0),
                _ => None,
            };
            prev = Some(v);
            r.filter(|x| x.is_finite())
        })
        .collect()
}

fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() < 2 || xs.len() != ys.len() {
        return None;
    }
    let n = xs.len() as f64;
    let mx = xs.iter().sum::<f64>() / n;
    let my = ys.iter().sum::<f64>() / n;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mx;
        let dy = y - my;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if !(sxx > 0.0 && syy > 0.0) {
        return None;
    }
    let r = sxy / (sxx.sqrt() * syy.sqrt());
    r.is_finite().then(|| r.clamp(-1.0, 1.0))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
