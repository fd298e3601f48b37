//! Forward models for the Gaussian and Difference-of-Gaussians pRFs.
//!
//! The fitter relies on one primitive: the unit-amplitude, zero-baseline
//! response ("shape") for a set of nonlinear parameters. Every prediction is
//! `baseline + amplitude · shape`, which lets the grid stage solve the two
//! linear parameters in closed form.

use nalgebra::DMatrix;

use crate::domain::{ModelKind, PrfParams, validate_shape};
use crate::error::AppError;
use crate::math::{Hrf, convolve_causal};
use crate::stimulus::Stimulus;

/// Anything that can turn pRF parameters into a predicted time series.
pub trait ResponseModel: Sync {
    /// Length of every predicted series.
    fn n_samples(&self) -> usize;

    /// Unit-amplitude, zero-baseline response.
    ///
    /// Returns `None` when `nonlinear` violates the model invariants.
    fn shape(&self, kind: ModelKind, nonlinear: &[f64]) -> Option<Vec<f64>>;

    /// Full prediction `baseline + amplitude · shape`.
    fn predict(&self, params: &PrfParams) -> Result<Vec<f64>, AppError> {
        params.validate()?;
        let shape = self.shape(params.kind(), &params.nonlinear()).ok_or_else(|| {
            AppError::config(format!("{} parameters rejected by the model.", params.kind()))
        })?;
        Ok(compose(&shape, params.amplitude(), params.baseline()))
    }
}

/// `baseline + amplitude · shape`, elementwise.
pub fn compose(shape: &[f64], amplitude: f64, baseline: f64) -> Vec<f64> {
    shape.iter().map(|s| baseline + amplitude * s).collect()
}

/// Receptive field model over a fixed stimulus, convolved with the canonical HRF.
#[derive(Debug, Clone)]
pub struct PrfModel<'a> {
    stimulus: &'a Stimulus,
    hrf: Hrf,
}

impl<'a> PrfModel<'a> {
    pub fn new(stimulus: &'a Stimulus) -> Result<Self, AppError> {
        let hrf = Hrf::canonical(stimulus.tr())?;
        Ok(Self { stimulus, hrf })
    }

    pub fn stimulus(&self) -> &Stimulus {
        self.stimulus
    }

    pub fn hrf(&self) -> &Hrf {
        &self.hrf
    }

    /// Receptive field weights on the stimulus pixel grid.
    ///
    /// Each Gaussian has unit volume over visual space, so a field that lies
    /// entirely on screen sums to ~1 (Gaussian) or ~`1 - surround_volume_ratio` (DoG).
    pub fn receptive_field(&self, kind: ModelKind, nonlinear: &[f64]) -> Option<DMatrix<f64>> {
        validate_shape(kind, nonlinear).ok()?;
        if nonlinear.iter().any(|v| !v.is_finite()) {
            return None;
        }

        let (x0, y0, size) = (nonlinear[0], nonlinear[1], nonlinear[2]);
        let pixel_area = 1.0 / (self.stimulus.pixels_per_degree() * self.stimulus.pixels_per_degree());
        let xs = self.stimulus.x_coords();
        let ys = self.stimulus.y_coords();

        let rf = match kind {
            ModelKind::Gaussian => DMatrix::from_fn(self.stimulus.height(), self.stimulus.width(), |r, c| {
                gaussian_2d(xs[c] - x0, ys[r] - y0, size) * pixel_area
            }),
            ModelKind::Dog => {
                let surround_size = size * nonlinear[3];
                let surround_volume = nonlinear[4];
                DMatrix::from_fn(self.stimulus.height(), self.stimulus.width(), |r, c| {
                    let (dx, dy) = (xs[c] - x0, ys[r] - y0);
                    (gaussian_2d(dx, dy, size) - surround_volume * gaussian_2d(dx, dy, surround_size))
                        * pixel_area
                })
            }
        };
        Some(rf)
    }

    /// Stimulus-weighted receptive field sum per frame (before the HRF).
    pub fn neural_response(&self, rf: &DMatrix<f64>) -> Vec<f64> {
        let weights = rf.as_slice();
        (0..self.stimulus.n_frames())
            .map(|t| {
                self.stimulus
                    .active_pixels(t)
                    .iter()
                    .map(|&(idx, v)| weights[idx] * v)
                    .sum()
            })
            .collect()
    }

    fn hrf_delay(kind: ModelKind, nonlinear: &[f64]) -> f64 {
        match kind {
            ModelKind::Gaussian => nonlinear[3],
            ModelKind::Dog => nonlinear[5],
        }
    }
}

impl ResponseModel for PrfModel<'_> {
    fn n_samples(&self) -> usize {
        self.stimulus.n_frames()
    }

    fn shape(&self, kind: ModelKind, nonlinear: &[f64]) -> Option<Vec<f64>> {
        let rf = self.receptive_field(kind, nonlinear)?;
        let neural = self.neural_response(&rf);
        let kernel = self.hrf.kernel(Self::hrf_delay(kind, nonlinear));
        let out = convolve_causal(&neural, &kernel);
        out.iter().all(|v| v.is_finite()).then_some(out)
    }
}

/// Unit-volume isotropic Gaussian density at offset `(dx, dy)`.
fn gaussian_2d(dx: f64, dy: f64, sigma: f64) -> f64 {
    let var = sigma * sigma;
    (-(dx * dx + dy * dy) / (2.0 * var)).exp() / (2.0 * std::f64::consts::PI * var)
}
