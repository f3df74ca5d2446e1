//! Small dense linear algebra for the surrogate fits.

use crate::error::{Result, XaiError};
use ndarray::{Array1, Array2, Axis};

const PIVOT_EPS: f64 = 1e-12;

/// Solve `a * x = b` by Gaussian elimination with partial pivoting.
pub fn solve(mut a: Array2<f64>, mut b: Array1<f64>) -> Result<Array1<f64>> {
    let n = a.nrows();
    if a.ncols() != n || b.len() != n {
        return Err(XaiError::invalid_input(format!(
            "cannot solve a {}x{} system with {} right-hand values",
            a.nrows(),
            a.ncols(),
            b.len()
        )));
    }

    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| a[[i, col]].abs().total_cmp(&a[[j, col]].abs()))
            .unwrap_or(col);
        if a[[pivot, col]].abs() < PIVOT_EPS {
            return Err(XaiError::numerical("singular system"));
        }
        if pivot != col {
            for k in 0..n {
                a.swap([col, k], [pivot, k]);
            }
            b.swap(col, pivot);
        }
        for row in (col + 1)..n {
            let factor = a[[row, col]] / a[[col, col]];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[[row, k]] -= factor * a[[col, k]];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = Array1::zeros(n);
    for row in (0..n).rev() {
        let tail: f64 = ((row + 1)..n).map(|k| a[[row, k]] * x[k]).sum();
        x[row] = (b[row] - tail) / a[[row, row]];
    }
    Ok(x)
}

/// Fitted ridge coefficients.
#[derive(Debug, Clone, PartialEq)]
pub struct RidgeFit {
    pub coefficients: Array1<f64>,
    pub intercept: f64,
}

/// Weighted ridge regression with an unpenalized intercept.
///
/// Inputs are centred on their weighted means, then
/// `(X'WX + alpha I) beta = X'Wy` is solved for the slopes.
pub fn ridge(
    x: &Array2<f64>,
    y: &Array1<f64>,
    weights: Option<&Array1<f64>>,
    alpha: f64,
) -> Result<RidgeFit> {
    let (n, m) = x.dim();
    if y.len() != n {
        return Err(XaiError::invalid_input(format!(
            "{} targets for {} rows",
            y.len(),
            n
        )));
    }
    if n == 0 {
        return Err(XaiError::invalid_input("cannot fit on zero rows"));
    }
    let w = match weights {
        Some(w) if w.len() != n => {
            return Err(XaiError::invalid_input(format!(
                "{} weights for {} rows",
                w.len(),
                n
            )));
        }
        Some(w) => w.clone(),
        None => Array1::ones(n),
    };
    let total = w.sum();
    if total <= 0.0 || !total.is_finite() {
        return Err(XaiError::numerical("weights must have a positive finite sum"));
    }

    let x_mean = x.t().dot(&w) / total;
    let y_mean = y.dot(&w) / total;
    let xc = x - &x_mean.view().insert_axis(Axis(0));
    let yc = y - y_mean;

    let xw = &xc * &w.view().insert_axis(Axis(1));
    let mut gram = xw.t().dot(&xc);
    for j in 0..m {
        gram[[j, j]] += alpha;
    }
    let rhs = xw.t().dot(&yc);
    let coefficients = solve(gram, rhs)?;
    let intercept = y_mean - x_mean.dot(&coefficients);

    Ok(RidgeFit {
        coefficients,
        intercept,
    })
}

/// Coefficient of determination of `predicted` against `actual`.
pub fn r_squared(actual: &Array1<f64>, predicted: &Array1<f64>) -> f64 {
    let Some(mean) = actual.mean() else {
        return 0.0;
    };
    let ss_res: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum();
    let ss_tot: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();
    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}
