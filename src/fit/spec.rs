//! Per-model search specifications.
//!
//! Each model kind carries its own grid (stage 1, nonlinear parameters only)
//! and refinement box (stage 2, every parameter). Defaults are expressed in
//! terms of the stimulus so they scale with screen size:
//!
//! | parameter             | grid             | refinement        |
//! |-----------------------|------------------|-------------------|
//! | x, y                  | `[-R, R]`        | `[-1.8R, 1.8R]`   |
//! | size                  | `[1/ppd, R]`     | `[1/ppd, 2R]`     |
//! | surround size ratio   | `[1.5, 5]`       | `[1.001, 10]`     |
//! | surround volume ratio | `[0.05, 0.8]`    | `[0, 1]`          |
//! | hrf delay             | `[-1, 1]`        | `[-5, 5]`         |
//! | amplitude             | closed form      | `[1e-8, 1e3]`     |
//! | baseline              | closed form      | unbounded         |
//!
//! where `R` is half the shorter screen side in degrees.

use serde::{Deserialize, Serialize};

use crate::domain::{Bound, ModelKind};
use crate::error::AppError;
use crate::fit::grid::GridAxis;
use crate::fit::refine::RefineOptions;
use crate::stimulus::Stimulus;

/// Refinement extends the position box beyond the screen by this factor.
const REFINE_POSITION_SCALE: f64 = 1.8;

/// Smallest amplitude the fitter will report.
pub const AMPLITUDE_FLOOR: f64 = 1e-8;

const AMPLITUDE_CEILING: f64 = 1e3;

/// User-facing knobs that shape the default specifications.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridOptions {
    /// Points per spatial and surround axis.
    pub points: usize,
    /// Points on the HRF delay axis (1 keeps it at 0 for the grid stage).
    pub delay_points: usize,
    pub refine: RefineOptions,
}

impl Default for GridOptions {
    fn default() -> Self {
        Self {
            points: 5,
            delay_points: 1,
            refine: RefineOptions::default(),
        }
    }
}

/// Grid and bounds for one model kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitSpec {
    pub kind: ModelKind,
    /// One axis per nonlinear parameter.
    pub grid: Vec<GridAxis>,
    /// One bound per parameter.
    pub bounds: Vec<Bound>,
    pub refine: RefineOptions,
}

impl FitSpec {
    pub fn for_kind(kind: ModelKind, stimulus: &Stimulus, opts: &GridOptions) -> Result<Self, AppError> {
        let r = stimulus.radius_deg();
        let min_size = stimulus.min_size();
        if !(r > min_size) {
            return Err(AppError::config(format!(
                "Screen radius {r:.3}° must exceed the minimum pRF size {min_size:.3}°."
            )));
        }
        let n = opts.points;
        let rp = REFINE_POSITION_SCALE * r;

        let mut grid = vec![
            GridAxis::new(-r, r, n)?,
            GridAxis::new(-r, r, n)?,
            GridAxis::new(min_size, r, n)?,
        ];
        let mut bounds = vec![
            Bound::new(-rp, rp)?,
            Bound::new(-rp, rp)?,
            Bound::new(min_size, 2.0 * r)?,
        ];

        match kind {
            ModelKind::Gaussian => {}
            ModelKind::Dog => {
                grid.push(GridAxis::new(1.5, 5.0, n)?);
                grid.push(GridAxis::new(0.05, 0.8, n)?);
                bounds.push(Bound::new(1.001, 10.0)?);
                bounds.push(Bound::new(0.0, 1.0)?);
            }
        }

        grid.push(GridAxis::new(-1.0, 1.0, opts.delay_points)?);
        bounds.push(Bound::new(-5.0, 5.0)?);
        bounds.push(Bound::new(AMPLITUDE_FLOOR, AMPLITUDE_CEILING)?);
        bounds.push(Bound::unbounded());

        let spec = FitSpec {
            kind,
            grid,
            bounds,
            refine: opts.refine,
        };
        spec.validate()?;
        Ok(spec)
    }

    pub fn gaussian(stimulus: &Stimulus, opts: &GridOptions) -> Result<Self, AppError> {
        Self::for_kind(ModelKind::Gaussian, stimulus, opts)
    }

    pub fn dog(stimulus: &Stimulus, opts: &GridOptions) -> Result<Self, AppError> {
        Self::for_kind(ModelKind::Dog, stimulus, opts)
    }

    /// Check shapes and intervals. Runs before any model evaluation.
    pub fn validate(&self) -> Result<(), AppError> {
        let names = self.kind.param_names();
        if self.grid.len() != self.kind.nonlinear_len() {
            return Err(AppError::config(format!(
                "{} grid needs {} axes, got {}.",
                self.kind,
                self.kind.nonlinear_len(),
                self.grid.len()
            )));
        }
        if self.bounds.len() != self.kind.param_len() {
            return Err(AppError::config(format!(
                "{} refinement needs {} bounds, got {}.",
                self.kind,
                self.kind.param_len(),
                self.bounds.len()
            )));
        }
        for (axis, name) in self.grid.iter().zip(names) {
            axis.validate(name)?;
        }
        for (bound, name) in self.bounds.iter().zip(names) {
            bound.validate(name)?;
        }
        // The grid winner is the refinement start, so every axis must lie in its box.
        for ((axis, bound), name) in self.grid.iter().zip(&self.bounds).zip(names) {
            if !(bound.contains(axis.bound.lower) && bound.contains(axis.bound.upper)) {
                return Err(AppError::config(format!(
                    "Grid for {name} [{}, {}] leaves its refinement bounds [{}, {}].",
                    axis.bound.lower, axis.bound.upper, bound.lower, bound.upper
                )));
            }
        }
        let amplitude = self.bounds[self.kind.param_len() - 2];
        if !(amplitude.lower > 0.0) {
            return Err(AppError::config("Amplitude lower bound must be strictly positive."));
        }
        self.refine.validate()
    }

    /// Lower bound on amplitude, shared by both stages.
    pub fn amplitude_floor(&self) -> f64 {
        self.bounds[self.kind.param_len() - 2].lower
    }

    /// Number of grid candidates.
    pub fn grid_size(&self) -> usize {
        self.grid.iter().map(|a| a.points.max(1)).product()
    }
}
