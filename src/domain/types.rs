use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::fit::GridOptions;
use crate::stimulus::BarDesign;

/// Receptive field model family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    /// Single isotropic 2-D Gaussian (excitatory centre only).
    Gaussian,
    /// Difference of Gaussians: excitatory centre minus a wider inhibitory surround.
    Dog,
}

impl ModelKind {
    pub const ALL: [ModelKind; 2] = [ModelKind::Gaussian, ModelKind::Dog];

    /// Human-readable label for terminal output.
    pub fn display_name(self) -> &'static str {
        match self {
            ModelKind::Gaussian => "Gaussian",
            ModelKind::Dog => "DoG",
        }
    }

    /// Names of the flat parameter vector entries, in order.
    pub fn param_names(self) -> &'static [&'static str] {
        match self {
            ModelKind::Gaussian => &["x", "y", "size", "hrf_delay", "amplitude", "baseline"],
            ModelKind::Dog => &[
                "x",
                "y",
                "size",
                "surround_size_ratio",
                "surround_volume_ratio",
                "hrf_delay",
                "amplitude",
                "baseline",
            ],
        }
    }

    /// Total parameter count (nonlinear + amplitude + baseline).
    pub fn param_len(self) -> usize {
        self.param_names().len()
    }

    /// Number of leading parameters that enter the model nonlinearly.
    ///
    /// Amplitude and baseline always trail the vector.
    pub fn nonlinear_len(self) -> usize {
        self.param_len() - 2
    }
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Parameters of the Gaussian pRF model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GaussianParams {
    /// Horizontal centre (degrees).
    pub x: f64,
    /// Vertical centre (degrees).
    pub y: f64,
    /// Gaussian sigma (degrees).
    pub size: f64,
    /// Weight of the HRF temporal derivative.
    pub hrf_delay: f64,
    pub amplitude: f64,
    pub baseline: f64,
}

/// Parameters of the Difference-of-Gaussians pRF model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DogParams {
    pub x: f64,
    pub y: f64,
    /// Centre sigma (degrees).
    pub size: f64,
    /// Surround sigma relative to the centre sigma; must exceed 1.
    pub surround_size_ratio: f64,
    /// Surround volume relative to the centre volume.
    pub surround_volume_ratio: f64,
    pub hrf_delay: f64,
    pub amplitude: f64,
    pub baseline: f64,
}

/// A parameter vector for one of the supported model kinds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "lowercase")]
pub enum PrfParams {
    Gaussian(GaussianParams),
    Dog(DogParams),
}

impl PrfParams {
    pub fn kind(&self) -> ModelKind {
        match self {
            PrfParams::Gaussian(_) => ModelKind::Gaussian,
            PrfParams::Dog(_) => ModelKind::Dog,
        }
    }

    pub fn amplitude(&self) -> f64 {
        match self {
            PrfParams::Gaussian(p) => p.amplitude,
            PrfParams::Dog(p) => p.amplitude,
        }
    }

    pub fn baseline(&self) -> f64 {
        match self {
            PrfParams::Gaussian(p) => p.baseline,
            PrfParams::Dog(p) => p.baseline,
        }
    }

    /// Flat vector in the order given by [`ModelKind::param_names`].
    pub fn to_vec(&self) -> Vec<f64> {
        match *self {
            PrfParams::Gaussian(p) => vec![p.x, p.y, p.size, p.hrf_delay, p.amplitude, p.baseline],
            PrfParams::Dog(p) => vec![
                p.x,
                p.y,
                p.size,
                p.surround_size_ratio,
                p.surround_volume_ratio,
                p.hrf_delay,
                p.amplitude,
                p.baseline,
            ],
        }
    }

    /// The leading nonlinear entries of [`PrfParams::to_vec`].
    pub fn nonlinear(&self) -> Vec<f64> {
        let mut v = self.to_vec();
        v.truncate(self.kind().nonlinear_len());
        v
    }

    /// Rebuild parameters from a flat vector.
    pub fn from_slice(kind: ModelKind, values: &[f64]) -> Result<Self, AppError> {
        if values.len() != kind.param_len() {
            return Err(AppError::config(format!(
                "{kind} expects {} parameters, got {}.",
                kind.param_len(),
                values.len()
            )));
        }
        let params = match kind {
            ModelKind::Gaussian => PrfParams::Gaussian(GaussianParams {
                x: values[0],
                y: values[1],
                size: values[2],
                hrf_delay: values[3],
                amplitude: values[4],
                baseline: values[5],
            }),
            ModelKind::Dog => PrfParams::Dog(DogParams {
                x: values[0],
                y: values[1],
                size: values[2],
                surround_size_ratio: values[3],
                surround_volume_ratio: values[4],
                hrf_delay: values[5],
                amplitude: values[6],
                baseline: values[7],
            }),
        };
        Ok(params)
    }

    /// Check the model invariants.
    pub fn validate(&self) -> Result<(), AppError> {
        let kind = self.kind();
        for (name, v) in kind.param_names().iter().zip(self.to_vec()) {
            if !v.is_finite() {
                return Err(AppError::config(format!("{kind} parameter {name} must be finite, got {v}.")));
            }
        }
        validate_shape(kind, &self.nonlinear())
    }
}

/// Check the invariants that only involve the nonlinear parameters.
pub fn validate_shape(kind: ModelKind, nonlinear: &[f64]) -> Result<(), AppError> {
    if nonlinear.len() != kind.nonlinear_len() {
        return Err(AppError::config(format!(
            "{kind} expects {} nonlinear parameters, got {}.",
            kind.nonlinear_len(),
            nonlinear.len()
        )));
    }
    if !(nonlinear[2] > 0.0) {
        return Err(AppError::config(format!("size must be > 0, got {}.", nonlinear[2])));
    }
    if kind == ModelKind::Dog {
        if !(nonlinear[3] > 1.0) {
            return Err(AppError::config(format!(
                "surround_size_ratio must be > 1, got {}.",
                nonlinear[3]
            )));
        }
        if !(nonlinear[4] >= 0.0) {
            return Err(AppError::config(format!(
                "surround_volume_ratio must be >= 0, got {}.",
                nonlinear[4]
            )));
        }
    }
    Ok(())
}

/// Closed interval used for grid axes and refinement boxes.
///
/// Infinite ends are allowed (unconstrained parameters); NaN ends are not.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bound {
    pub lower: f64,
    pub upper: f64,
}

impl Bound {
    pub fn new(lower: f64, upper: f64) -> Result<Self, AppError> {
        let bound = Bound { lower, upper };
        bound.validate("bound")?;
        Ok(bound)
    }

    pub const fn unbounded() -> Self {
        Bound {
            lower: f64::NEG_INFINITY,
            upper: f64::INFINITY,
        }
    }

    /// Fail unless `lower < upper`.
    pub fn validate(&self, name: &str) -> Result<(), AppError> {
        if self.lower.is_nan() || self.upper.is_nan() || self.lower >= self.upper {
            return Err(AppError::config(format!(
                "Invalid {name} bounds: lower={}, upper={} (need lower < upper).",
                self.lower, self.upper
            )));
        }
        Ok(())
    }

    pub fn is_finite(&self) -> bool {
        self.lower.is_finite() && self.upper.is_finite()
    }

    pub fn contains(&self, v: f64) -> bool {
        v >= self.lower && v <= self.upper
    }

    pub fn clamp(&self, v: f64) -> f64 {
        v.max(self.lower).min(self.upper)
    }

    pub fn midpoint(&self) -> f64 {
        0.5 * (self.lower + self.upper)
    }
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct ExperimentConfig {
    pub design: BarDesign,
    pub grid: GridOptions,
    /// Ground-truth parameters used to synthesise the data.
    pub truth: PrfParams,
    /// Noise standard deviation as a multiple of the clean series' std.
    pub noise_level: f64,
    /// `None` means entropy-seeded (non-reproducible) noise.
    pub seed: Option<u64>,

    pub sweep_min: f64,
    pub sweep_max: f64,
    pub sweep_count: usize,
    pub trials: usize,

    pub export_csv: Option<PathBuf>,
    pub export_json: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dog() -> PrfParams {
        PrfParams::Dog(DogParams {
            x: 1.0,
            y: -2.0,
            size: 2.0,
            surround_size_ratio: 2.5,
            surround_volume_ratio: 0.4,
            hrf_delay: 0.1,
            amplitude: 0.8,
            baseline: -0.2,
        })
    }

    #[test]
    fn flat_vector_preserves_order() {
        let p = dog();
        let v = p.to_vec();
        assert_eq!(v, vec![1.0, -2.0, 2.0, 2.5, 0.4, 0.1, 0.8, -0.2]);
        assert_eq!(p.nonlinear(), vec![1.0, -2.0, 2.0, 2.5, 0.4, 0.1]);
        assert_eq!(PrfParams::from_slice(ModelKind::Dog, &v).unwrap(), p);
    }

    #[test]
    fn from_slice_rejects_wrong_length() {
        assert!(PrfParams::from_slice(ModelKind::Gaussian, &[0.0; 8]).is_err());
    }

    #[test]
    fn surround_must_be_wider_than_centre() {
        let PrfParams::Dog(mut p) = dog() else { unreachable!() };
        p.surround_size_ratio = 1.0;
        assert!(PrfParams::Dog(p).validate().is_err());
        p.surround_size_ratio = 1.2;
        p.size = 0.0;
        assert!(PrfParams::Dog(p).validate().is_err());
    }

    #[test]
    fn bounds_require_lower_below_upper() {
        assert!(Bound::new(1.0, 1.0).is_err());
        assert!(Bound::new(2.0, 1.0).is_err());
        assert!(Bound::new(f64::NAN, 1.0).is_err());
        let b = Bound::new(-1.0, 3.0).unwrap();
        assert_eq!(b.clamp(5.0), 3.0);
        assert_eq!(b.midpoint(), 1.0);
        assert!(Bound::unbounded().validate("baseline").is_ok());
    }
}
