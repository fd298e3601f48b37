//! Brute-force grid search over a bounded parameter box.
//!
//! The grid is the Cartesian product of evenly spaced samples on every axis.
//! Each candidate is scored independently (in parallel) and the lowest score
//! wins, with ties broken by enumeration order so the result does not depend
//! on thread scheduling.
//!
//! Cost is the product of the per-axis point counts, so every extra free
//! dimension multiplies the work. Keep resolutions small and let the local
//! refinement stage do the rest.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::domain::Bound;
use crate::error::AppError;
use crate::math::linspace;

/// One grid dimension: a closed interval and a number of evenly spaced points.
///
/// Zero or one point evaluates only the interval midpoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridAxis {
    pub bound: Bound,
    pub points: usize,
}

impl GridAxis {
    pub fn new(lower: f64, upper: f64, points: usize) -> Result<Self, AppError> {
        let axis = GridAxis {
            bound: Bound { lower, upper },
            points,
        };
        axis.validate("grid axis")?;
        Ok(axis)
    }

    pub fn validate(&self, name: &str) -> Result<(), AppError> {
        self.bound.validate(name)?;
        if !self.bound.is_finite() {
            return Err(AppError::config(format!("Grid bounds for {name} must be finite.")));
        }
        Ok(())
    }

    pub fn values(&self) -> Vec<f64> {
        linspace(self.bound.lower, self.bound.upper, self.points)
    }
}

/// Cartesian product of grid axes.
#[derive(Debug, Clone)]
pub struct ParamGrid {
    values: Vec<Vec<f64>>,
    len: usize,
}

impl ParamGrid {
    pub fn new(axes: &[GridAxis]) -> Result<Self, AppError> {
        if axes.is_empty() {
            return Err(AppError::config("Parameter grid needs at least one axis."));
        }
        let mut len = 1usize;
        let mut values = Vec::with_capacity(axes.len());
        for (i, axis) in axes.iter().enumerate() {
            axis.validate(&format!("grid axis {i}"))?;
            let v = axis.values();
            len = len
                .checked_mul(v.len())
                .ok_or_else(|| AppError::config("Parameter grid is too large."))?;
            values.push(v);
        }
        Ok(Self { values, len })
    }

    /// Number of candidates in the Cartesian product.
    pub fn n_candidates(&self) -> usize {
        self.len
    }

    pub fn dims(&self) -> usize {
        self.values.len()
    }

    pub fn axis_values(&self, axis: usize) -> &[f64] {
        &self.values[axis]
    }

    /// Candidate at `index`, with the last axis varying fastest.
    pub fn point(&self, index: usize) -> Vec<f64> {
        let mut out = vec![0.0; self.values.len()];
        let mut rest = index;
        for (slot, axis) in out.iter_mut().zip(&self.values).rev() {
            *slot = axis[rest % axis.len()];
            rest /= axis.len();
        }
        out
    }

    pub fn iter(&self) -> impl Iterator<Item = Vec<f64>> + '_ {
        (0..self.len).map(|i| self.point(i))
    }
}

/// Lowest-scoring grid candidate.
#[derive(Debug, Clone)]
pub struct GridMinimum<T> {
    /// Enumeration index of the winner.
    pub index: usize,
    pub point: Vec<f64>,
    /// Whatever the objective computed alongside the score.
    pub payload: T,
    pub sse: f64,
    /// Candidates enumerated.
    pub evaluated: usize,
    /// Candidates the objective accepted.
    pub valid: usize,
}

/// Evaluate every grid candidate and return the one of minimal SSE.
///
/// `objective` returns `None` for candidates that cannot be scored (invalid
/// model parameters, non-finite predictions); those are skipped.
pub fn grid_search<T, F>(grid: &ParamGrid, objective: F) -> Result<GridMinimum<T>, AppError>
where
    T: Send,
    F: Fn(&[f64]) -> Option<(T, f64)> + Sync,
{
    let candidates: Vec<(usize, T, f64)> = (0..grid.n_candidates())
        .into_par_iter()
        .filter_map(|idx| {
            let point = grid.point(idx);
            objective(&point)
                .filter(|(_, sse)| sse.is_finite())
                .map(|(payload, sse)| (idx, payload, sse))
        })
        .collect();

    let valid = candidates.len();
    let mut best: Option<(usize, T, f64)> = None;
    for c in candidates {
        let better = match &best {
            None => true,
            Some((idx, _, sse)) => c.2 < *sse || (c.2 == *sse && c.0 < *idx),
        };
        if better {
            best = Some(c);
        }
    }

    let Some((index, payload, sse)) = best else {
        return Err(AppError::fit(format!(
            "No valid grid candidates among {} evaluated.",
            grid.n_candidates()
        )));
    };

    Ok(GridMinimum {
        index,
        point: grid.point(index),
        payload,
        sse,
        evaluated: grid.n_candidates(),
        valid,
    })
}
