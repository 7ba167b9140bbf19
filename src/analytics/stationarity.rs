// =============================================================================
// Augmented Dickey-Fuller test (constant, no trend)
// =============================================================================
//
// Test regression, for lag order p:
//
//   Δy_t = c + γ · y_{t-1} + Σ_{j=1..p} δ_j · Δy_{t-j} + ε_t
//
// H0: γ = 0 (unit root).  The statistic is the t-value of γ.
//
// Lag selection: every p in 0..=max_lag is fitted on the common sample that
// the largest lag allows, and the order with the lowest AIC wins.  The chosen
// order is then refitted on all rows it can use.
//   max_lag = min(⌈12 · (n/100)^¼⌉, n/2 − 2)
//
// p-values follow MacKinnon (1994) response surfaces; critical values follow
// MacKinnon (2010).  Both for the single-series, constant-only case.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::analytics::regression::{ols, OlsFit};

/// Below this many observations no test is run.
pub const MIN_OBSERVATIONS: usize = 20;
/// Significance level used for the stationarity verdict.
pub const SIGNIFICANCE: f64 = 0.05;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriticalValues {
    pub one_pct: f64,
    pub five_pct: f64,
    pub ten_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdfResult {
    pub statistic: f64,
    pub p_value: f64,
    pub is_stationary: bool,
    pub used_lag: usize,
    /// Rows in the final regression.
    pub nobs: usize,
    pub critical_values: CriticalValues,
}

/// Run the ADF test on `values` (gaps already removed).
///
/// Returns `None` with fewer than [`MIN_OBSERVATIONS`] points, or when no
/// lag order yields a usable regression (e.g. a constant series).
pub fn adf_test(values: &[f64]) -> Option<AdfResult> {
    let n = values.len();
    if n < MIN_OBSERVATIONS {
        trace!(len = n, min = MIN_OBSERVATIONS, "ADF: insufficient data");
        return None;
    }

    let diffs: Vec<f64> = values.windows(2).map(|w| w[1] - w[0]).collect();
    let max_lag = default_max_lag(n);

    let mut best: Option<(f64, usize)> = None;
    for lag in 0..=max_lag {
        let Some(fit) = fit_lag(values, &diffs, lag, max_lag) else {
            continue;
        };
        let aic = fit.aic();
        if !aic.is_finite() {
            continue;
        }
        if best.map_or(true, |(best_aic, _)| aic < best_aic) {
            best = Some((aic, lag));
        }
    }

    let Some((_, used_lag)) = best else {
        trace!("ADF: no lag order produced a regression");
        return None;
    };

    let fit = fit_lag(values, &diffs, used_lag, used_lag)?;
    let statistic = fit.t_value(0)?;
    let p_value = mackinnon_p_value(statistic);
    let nobs = fit.nobs;

    trace!(
        statistic = format!("{:.4}", statistic),
        p_value = format!("{:.4}", p_value),
        used_lag,
        nobs,
        "ADF computed"
    );

    Some(AdfResult {
        statistic,
        p_value,
        is_stationary: p_value < SIGNIFICANCE,
        used_lag,
        nobs,
        critical_values: mackinnon_critical_values(nobs),
    })
}

/// Schwert's rule of thumb, capped so the regression keeps enough rows.
pub fn default_max_lag(n: usize) -> usize {
    let schwert = (12.0 * (n as f64 / 100.0).powf(0.25)).ceil() as usize;
    schwert.min((n / 2).saturating_sub(2))
}

/// Fit the ADF regression with `lag` augmentation terms, using rows from
/// `start` onward (`start >= lag`).
fn fit_lag(levels: &[f64], diffs: &[f64], lag: usize, start: usize) -> Option<OlsFit> {
    if start >= diffs.len() {
        return None;
    }
    let rows = start..diffs.len();
    let y: Vec<f64> = rows.clone().map(|t| diffs[t]).collect();

    let mut columns: Vec<Vec<f64>> = Vec::with_capacity(lag + 1);
    // diffs[t] = levels[t + 1] - levels[t], so the lagged level is levels[t].
    columns.push(rows.clone().map(|t| levels[t]).collect());
    for j in 1..=lag {
        columns.push(rows.clone().map(|t| diffs[t - j]).collect());
    }
    ols(&y, &columns)
}

// ---------------------------------------------------------------------------
// MacKinnon approximations, N = 1, constant only
// ---------------------------------------------------------------------------

const TAU_MAX: f64 = 2.74;
const TAU_MIN: f64 = -18.83;
const TAU_STAR: f64 = -1.61;
const TAU_SMALL_P: [f64; 3] = [2.1659, 1.4412, 0.038269];
const TAU_LARGE_P: [f64; 4] = [1.7339, 0.93202, -0.12745, -0.010368];

/// Asymptotic p-value for an ADF statistic.
pub fn mackinnon_p_value(stat: f64) -> f64 {
    if stat > TAU_MAX {
        return 1.0;
    }
    if stat < TAU_MIN {
        return 0.0;
    }
    let coef: &[f64] = if stat <= TAU_STAR {
        &TAU_SMALL_P
    } else {
        &TAU_LARGE_P
    };
    let z = coef.iter().rev().fold(0.0, |acc, c| acc * stat + c);
    normal_cdf(z)
}

/// Finite-sample critical values: c0 + c1/n + c2/n² + c3/n³.
pub fn mackinnon_critical_values(nobs: usize) -> CriticalValues {
    const ONE: [f64; 4] = [-3.43035, -6.5393, -16.786, -79.433];
    const FIVE: [f64; 4] = [-2.86154, -2.8903, -4.234, -40.040];
    const TEN: [f64; 4] = [-2.56677, -1.5384, -2.809, 0.0];

    let inv = 1.0 / nobs.max(1) as f64;
    let eval = |c: &[f64; 4]| c.iter().rev().fold(0.0, |acc, k| acc * inv + k);
    CriticalValues {
        one_pct: eval(&ONE),
        five_pct: eval(&FIVE),
        ten_pct: eval(&TEN),
    }
}

fn normal_cdf(x: f64) -> f64 {
    0.5 * erfc(-x / std::f64::consts::SQRT_2)
}

/// Complementary error function (Numerical Recipes `erfcc`, |rel err| < 1.2e-7).
fn erfc(x: f64) -> f64 {
    let z = x.abs();
    let t = 1.0 / (1.0 + 0.5 * z);
    let poly = -z * z - 1.265_512_23
        + t * (1.000_023_68
            + t * (0.374_091_96
                + t * (0.096_784_18
                    + t * (-0.186_288_06
                        + t * (0.278_868_07
                            + t * (-1.135_203_98
                                + t * (1.488_515_87 + t * (-0.822_152_23 + t * 0.170_872_77))))))));
    let r = t * poly.exp();
    if x >= 0.0 {
        r
    } else {
        2.0 - r
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// xorshift64 uniform in [-0.5, 0.5]; keeps tests reproducible.
    fn noise(len: usize, seed: u64) -> Vec<f64> {
        let mut state = seed;
        (0..len)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                (state as f64 / u64::MAX as f64) - 0.5
            })
            .collect()
    }

    fn random_walk(len: usize, seed: u64) -> Vec<f64> {
        let mut level = 100.0;
        noise(len, seed)
            .into_iter()
            .map(|e| {
                level += e;
                level
            })
            .collect()
    }

    fn mean_reverting(len: usize, seed: u64) -> Vec<f64> {
        let mut level = 0.0;
        noise(len, seed)
            .into_iter()
            .map(|e| {
                level = 0.3 * level + e;
                level
            })
            .collect()
    }

    #[test]
    fn insufficient_data_returns_none() {
        assert!(adf_test(&noise(19, 7)).is_none());
        assert!(adf_test(&[]).is_none());
    }

    #[test]
    fn constant_series_returns_none() {
        assert!(adf_test(&[5.0; 100]).is_none());
    }

    #[test]
    fn mean_reverting_series_is_stationary() {
        let r = adf_test(&mean_reverting(500, 42)).expect("result");
        assert!(r.statistic < r.critical_values.one_pct, "stat {}", r.statistic);
        assert!(r.p_value < 0.01);
        assert!(r.is_stationary);
    }

    #[test]
    fn random_walk_is_not_stationary() {
        // Cumulative sum of positive-drift noise: clearly non-stationary.
        let mut level = 0.0;
        let trending: Vec<f64> = noise(300, 99)
            .into_iter()
            .map(|e| {
                level += 0.5 + e;
                level
            })
            .collect();
        let r = adf_test(&trending).expect("result");
        assert!(!r.is_stationary, "p = {}", r.p_value);
    }

    #[test]
    fn random_walk_runs_and_is_bounded() {
        let r = adf_test(&random_walk(200, 123_456_789)).expect("result");
        assert!((0.0..=1.0).contains(&r.p_value));
        assert!(r.used_lag <= default_max_lag(200));
        assert_eq!(r.nobs, 199 - r.used_lag);
    }

    #[test]
    fn max_lag_rule() {
        assert_eq!(default_max_lag(20), 8);
        assert_eq!(default_max_lag(100), 12);
        assert_eq!(default_max_lag(10_000), 38);
    }

    #[test]
    fn p_value_matches_reference_points() {
        // Asymptotic 5% and 1% critical values map back to ~0.05 and ~0.01.
        assert!((mackinnon_p_value(-2.8621) - 0.05).abs() < 0.003);
        assert!((mackinnon_p_value(-3.4304) - 0.01).abs() < 0.002);
        assert_eq!(mackinnon_p_value(3.0), 1.0);
        assert_eq!(mackinnon_p_value(-20.0), 0.0);
        assert!(mackinnon_p_value(0.0) > 0.9);
    }

    #[test]
    fn critical_values_approach_asymptotes() {
        let cv = mackinnon_critical_values(1_000_000);
        assert!((cv.one_pct + 3.43035).abs() < 1e-4);
        assert!((cv.five_pct + 2.86154).abs() < 1e-4);
        assert!((cv.ten_pct + 2.56677).abs() < 1e-4);
        let small = mackinnon_critical_values(50);
        assert!(small.five_pct < cv.five_pct);
    }

    #[test]
    fn normal_cdf_sanity() {
        assert!((normal_cdf(0.0) - 0.5).abs() < 1e-7);
        assert!((normal_cdf(1.959_964) - 0.975).abs() < 1e-6);
        assert!((normal_cdf(-1.644_854) - 0.05).abs() < 1e-6);
    }
}
