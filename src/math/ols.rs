//! Least squares solvers.
//!
//! Two places in the fitter reduce to small linear least squares problems:
//!
//! - the grid stage solves `y ≈ a·s + b` for every candidate shape `s`
//! - each refinement step solves a damped Gauss–Newton system
//!
//! Both are tall, tiny (2–8 columns) and occasionally rank deficient (a
//! receptive field that never sees the stimulus has a flat shape), so we use
//! SVD rather than QR or normal equations.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Fit `y ≈ amplitude·shape + baseline`, keeping `amplitude >= min_amplitude`.
///
/// When the unconstrained amplitude falls below the floor, the amplitude is
/// pinned to the floor and the baseline re-estimated as the mean residual.
/// Returns `None` for empty or mismatched inputs.
pub fn fit_amplitude_baseline(shape: &[f64], y: &[f64], min_amplitude: f64) -> Option<(f64, f64)> {
    let n = y.len();
    if n == 0 || shape.len() != n {
        return None;
    }

    let mut x = DMatrix::<f64>::zeros(n, 2);
    for (i, &s) in shape.iter().enumerate() {
        x[(i, 0)] = s;
        x[(i, 1)] = 1.0;
    }
    let yv = DVector::from_column_slice(y);

    let (mut amplitude, mut baseline) = match solve_least_squares(&x, &yv) {
        Some(beta) => (beta[0], beta[1]),
        None => (min_amplitude, f64::NAN),
    };

    if !(amplitude >= min_amplitude) || !baseline.is_finite() {
        amplitude = min_amplitude;
        baseline = y
            .iter()
            .zip(shape)
            .map(|(&yi, &si)| yi - amplitude * si)
            .sum::<f64>()
            / n as f64;
    }

    if amplitude.is_finite() && baseline.is_finite() {
        Some((amplitude, baseline))
    } else {
        None
    }
}
