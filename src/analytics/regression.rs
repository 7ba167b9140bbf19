// =============================================================================
// Ordinary Least Squares with an intercept
// =============================================================================
//
// y = c + Σ β_j · x_j + ε
//
// Regressors are centred on their means before solving (the intercept drops
// out), and the normal-equation matrix is scaled to unit diagonal before
// inversion.  Price levels in the tens of thousands would otherwise swamp the
// pivots.  Any singular or degenerate design returns `None`.

/// Relative standard deviation below which a regressor counts as constant.
const DEGENERATE_REL_STD: f64 = 1e-10;
/// Minimum absolute pivot on the unit-diagonal matrix.
const MIN_PIVOT: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq)]
pub struct OlsFit {
    pub intercept: f64,
    /// One coefficient per regressor column, in input order.
    pub slopes: Vec<f64>,
    /// Standard errors of `slopes`.
    pub std_errors: Vec<f64>,
    /// Sum of squared residuals.
    pub ssr: f64,
    pub nobs: usize,
}

impl OlsFit {
    /// Number of estimated parameters, intercept included.
    pub fn k(&self) -> usize {
        self.slopes.len() + 1
    }

    pub fn t_value(&self, idx: usize) -> Option<f64> {
        let se = *self.std_errors.get(idx)?;
        if se > 0.0 && se.is_finite() {
            Some(self.slopes[idx] / se)
        } else {
            None
        }
    }

    /// Gaussian log-likelihood at the fitted parameters.
    pub fn log_likelihood(&self) -> f64 {
        let n = self.nobs as f64;
        -n / 2.0 * ((2.0 * std::f64::consts::PI).ln() + (self.ssr / n).ln() + 1.0)
    }

    /// Akaike information criterion.
    pub fn aic(&self) -> f64 {
        -2.0 * self.log_likelihood() + 2.0 * self.k() as f64
    }
}

/// Fit `y` on `columns` (each the same length as `y`) plus an intercept.
pub fn ols(y: &[f64], columns: &[Vec<f64>]) -> Option<OlsFit> {
    let n = y.len();
    let p = columns.len();
    if columns.iter().any(|c| c.len() != n) || n <= p + 1 {
        return None;
    }
    if y.iter().chain(columns.iter().flatten()).any(|v| !v.is_finite()) {
        return None;
    }

    let nf = n as f64;
    let y_mean = y.iter().sum::<f64>() / nf;
    let means: Vec<f64> = columns.iter().map(|c| c.iter().sum::<f64>() / nf).collect();
    let yc: Vec<f64> = y.iter().map(|v| v - y_mean).collect();
    let xc: Vec<Vec<f64>> = columns
        .iter()
        .zip(&means)
        .map(|(c, m)| c.iter().map(|v| v - m).collect())
        .collect();

    // X'X and X'y on centred data.
    let mut xtx = vec![vec![0.0_f64; p]; p];
    let mut xty = vec![0.0_f64; p];
    for i in 0..p {
        for j in i..p {
            let s: f64 = xc[i].iter().zip(&xc[j]).map(|(a, b)| a * b).sum();
            xtx[i][j] = s;
            xtx[j][i] = s;
        }
        xty[i] = xc[i].iter().zip(&yc).map(|(a, b)| a * b).sum();
    }

    // Reject constant regressors before scaling.
    let mut scale = vec![0.0_f64; p];
    for j in 0..p {
        let magnitude = columns[j].iter().fold(0.0_f64, |m, v| m.max(v.abs())).max(1.0);
        let std = (xtx[j][j] / nf).sqrt();
        if std <= DEGENERATE_REL_STD * magnitude {
            return None;
        }
        scale[j] = xtx[j][j].sqrt();
    }

    let mut unit = vec![vec![0.0_f64; p]; p];
    for i in 0..p {
        for j in 0..p {
            unit[i][j] = xtx[i][j] / (scale[i] * scale[j]);
        }
    }
    let unit_inv = invert(unit)?;
    let mut inv = vec![vec![0.0_f64; p]; p];
    for i in 0..p {
        for j in 0..p {
            inv[i][j] = unit_inv[i][j] / (scale[i] * scale[j]);
        }
    }

    let slopes: Vec<f64> = (0..p)
        .map(|i| (0..p).map(|j| inv[i][j] * xty[j]).sum())
        .collect();
    let intercept = y_mean - slopes.iter().zip(&means).map(|(b, m)| b * m).sum::<f64>();

    let ssr: f64 = (0..n)
        .map(|t| {
            let fitted: f64 = (0..p).map(|j| slopes[j] * xc[j][t]).sum();
            let r = yc[t] - fitted;
            r * r
        })
        .sum();

    let dof = (n - p - 1) as f64;
    let sigma2 = ssr / dof;
    let std_errors: Vec<f64> = (0..p).map(|i| (sigma2 * inv[i][i]).max(0.0).sqrt()).collect();

    if !intercept.is_finite() || slopes.iter().any(|b| !b.is_finite()) {
        return None;
    }

    Some(OlsFit {
        intercept,
        slopes,
        std_errors,
        ssr,
        nobs: n,
    })
}

/// Gauss-Jordan inversion with partial pivoting.
fn invert(mut a: Vec<Vec<f64>>) -> Option<Vec<Vec<f64>>> {
    let n = a.len();
    let mut inv: Vec<Vec<f64>> = (0..n)
        .map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
        .collect();

    for col in 0..n {
        let pivot_row = (col..n).max_by(|&r1, &r2| a[r1][col].abs().total_cmp(&a[r2][col].abs()))?;
        if a[pivot_row][col].abs() < MIN_PIVOT {
            return None;
        }
        a.swap(col, pivot_row);
        inv.swap(col, pivot_row);

        let pivot = a[col][col];
        for j in 0..n {
            a[col][j] /= pivot;
            inv[col][j] /= pivot;
        }
        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = a[row][col];
            if factor == 0.0 {
                continue;
            }
            for j in 0..n {
                a[row][j] -= factor * a[col][j];
                inv[row][j] -= factor * inv[col][j];
            }
        }
    }
    Some(inv)
}
