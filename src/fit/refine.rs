//! Bounded local refinement (projected Levenberg–Marquardt).
//!
//! Starting from the grid estimate we minimise `Σ r_i(p)²` subject to box
//! constraints:
//!
//! - the Jacobian is built by forward differences (backward when the forward
//!   probe would leave the box)
//! - each step solves the damped system `[J; √λ·D] δ = [-r; 0]` with the SVD
//!   least squares solver, where `D` is Marquardt's diagonal scaling
//! - the trial point is projected back into the box
//! - accepted steps shrink λ, rejected steps grow it
//!
//! The refiner never pretends to have improved: if no step lowers the SSE the
//! caller gets the start point back with [`RefineStatus::NoImprovement`].

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::Bound;
use crate::error::AppError;
use crate::math::solve_least_squares;

/// Outcome of the refinement stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefineStatus {
    /// Relative SSE change or step size fell below tolerance.
    Converged,
    /// No step improved on the starting point; the start point is returned.
    NoImprovement,
    /// Iteration budget exhausted; the best point found is returned.
    MaxIterations,
    /// Refinement disabled (`max_iter == 0`).
    Skipped,
}

impl RefineStatus {
    pub fn label(self) -> &'static str {
        match self {
            RefineStatus::Converged => "converged",
            RefineStatus::NoImprovement => "no improvement on grid estimate",
            RefineStatus::MaxIterations => "iteration limit reached",
            RefineStatus::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RefineOptions {
    pub max_iter: usize,
    /// Relative SSE decrease below which an accepted step counts as converged.
    pub ftol: f64,
    /// Relative step norm below which an accepted step counts as converged.
    pub xtol: f64,
    /// Relative finite-difference step.
    pub fd_step: f64,
    pub lambda_init: f64,
    /// Damping beyond which no descent direction is considered reachable.
    pub lambda_max: f64,
}

impl Default for RefineOptions {
    fn default() -> Self {
        Self {
            max_iter: 200,
            ftol: 1e-10,
            xtol: 1e-10,
            fd_step: 1e-6,
            lambda_init: 1e-3,
            lambda_max: 1e12,
        }
    }
}

impl RefineOptions {
    pub fn validate(&self) -> Result<(), AppError> {
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if !(positive(self.ftol) && positive(self.xtol) && positive(self.fd_step)) {
            return Err(AppError::config("Refinement tolerances and step must be finite and > 0."));
        }
        if !(positive(self.lambda_init) && positive(self.lambda_max) && self.lambda_max > self.lambda_init) {
            return Err(AppError::config("Refinement damping must satisfy 0 < lambda_init < lambda_max."));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Refinement {
    pub params: Vec<f64>,
    pub sse: f64,
    pub start_sse: f64,
    pub iterations: usize,
    pub status: RefineStatus,
}

/// Minimise the sum of squared residuals inside `bounds`.
///
/// `residuals` returns `None` for parameter vectors the model rejects; such
/// trial points are treated as failed steps.
pub fn refine<F>(start: &[f64], bounds: &[Bound], residuals: F, opts: &RefineOptions) -> Result<Refinement, AppError>
where
    F: Fn(&[f64]) -> Option<Vec<f64>>,
{
    if start.len() != bounds.len() {
        return Err(AppError::config(format!(
            "Refinement got {} parameters but {} bounds.",
            start.len(),
            bounds.len()
        )));
    }
    for (i, b) in bounds.iter().enumerate() {
        b.validate(&format!("refinement parameter {i}"))?;
    }
    opts.validate()?;

    let mut x: Vec<f64> = start.iter().zip(bounds).map(|(&v, b)| b.clamp(v)).collect();
    let mut r = residuals(&x).ok_or_else(|| AppError::fit("Refinement start point is not a valid model."))?;
    let mut sse = sum_sq(&r);
    let start_sse = sse;

    let done = |x: Vec<f64>, sse: f64, iterations: usize, status: RefineStatus| Refinement {
        params: x,
        sse,
        start_sse,
        iterations,
        status,
    };

    if opts.max_iter == 0 {
        return Ok(done(x, sse, 0, RefineStatus::Skipped));
    }
    if sse == 0.0 {
        return Ok(done(x, sse, 0, RefineStatus::Converged));
    }

    let n = x.len();
    let m = r.len();
    let mut lambda = opts.lambda_init;
    let mut improved = false;

    for iter in 1..=opts.max_iter {
        let jac = jacobian(&x, &r, bounds, &residuals, opts.fd_step);

        // Marquardt scaling: column norms of J.
        let scale: Vec<f64> = (0..n)
            .map(|j| jac.column(j).norm().max(1e-12))
            .collect();

        let mut accepted = false;
        while lambda <= opts.lambda_max {
            let mut a = DMatrix::<f64>::zeros(m + n, n);
            a.view_mut((0, 0), (m, n)).copy_from(&jac);
            let damping = lambda.sqrt();
            for j in 0..n {
                a[(m + j, j)] = damping * scale[j];
            }
            let mut b = DVector::<f64>::zeros(m + n);
            for i in 0..m {
                b[i] = -r[i];
            }

            let Some(delta) = solve_least_squares(&a, &b) else {
                lambda *= 10.0;
                continue;
            };

            let trial: Vec<f64> = x
                .iter()
                .zip(delta.iter())
                .zip(bounds)
                .map(|((&xi, &di), bd)| bd.clamp(xi + di))
                .collect();

            let trial_r = residuals(&trial).filter(|tr| tr.len() == m);
            let trial_sse = trial_r.as_deref().map(sum_sq).unwrap_or(f64::INFINITY);

            if trial_sse < sse {
                let step: f64 = trial
                    .iter()
                    .zip(&x)
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum::<f64>()
                    .sqrt();
                let x_norm: f64 = x.iter().map(|v| v * v).sum::<f64>().sqrt();
                let rel_drop = (sse - trial_sse) / sse;

                x = trial;
                if let Some(tr) = trial_r {
                    r = tr;
                }
                sse = trial_sse;
                lambda = (lambda / 10.0).max(1e-15);
                accepted = true;
                improved = true;

                if rel_drop < opts.ftol || step < opts.xtol * (x_norm + opts.xtol) || sse == 0.0 {
                    debug!(iter, sse, "refinement converged");
                    return Ok(done(x, sse, iter, RefineStatus::Converged));
                }
                break;
            }
            lambda *= 10.0;
        }

        if !accepted {
            // No damping level yields descent: a numerical stationary point.
            let status = if improved {
                RefineStatus::Converged
            } else {
                RefineStatus::NoImprovement
            };
            debug!(iter, sse, ?status, "refinement stalled");
            return Ok(done(x, sse, iter, status));
        }
    }

    Ok(done(x, sse, opts.max_iter, RefineStatus::MaxIterations))
}

fn jacobian<F>(x: &[f64], r: &[f64], bounds: &[Bound], residuals: &F, fd_step: f64) -> DMatrix<f64>
where
    F: Fn(&[f64]) -> Option<Vec<f64>>,
{
    let n = x.len();
    let m = r.len();
    let mut jac = DMatrix::<f64>::zeros(m, n);
    let mut probe = x.to_vec();

    for j in 0..n {
        let h = fd_step * x[j].abs().max(1.0);
        let mut column = None;
        for signed_h in [h, -h] {
            let v = x[j] + signed_h;
            if !bounds[j].contains(v) {
                continue;
            }
            probe[j] = v;
            let rp = residuals(&probe).filter(|rp| rp.len() == m);
            probe[j] = x[j];
            if let Some(rp) = rp {
                column = Some((rp, signed_h));
                break;
            }
        }
        // A parameter that cannot be probed keeps a zero column and stays put.
        if let Some((rp, signed_h)) = column {
            for i in 0..m {
                jac[(i, j)] = (rp[i] - r[i]) / signed_h;
            }
        }
    }

    jac
}

fn sum_sq(r: &[f64]) -> f64 {
    r.iter().map(|v| v * v).sum()
}
