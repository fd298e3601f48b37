//! Synthetic measurements: calibrated Gaussian noise on top of a clean prediction.
//!
//! Randomness is always passed in. Reproducible runs construct their RNG with
//! [`seeded_rng`]; parallel workers each get their own stream from
//! [`derive_seed`] so draws stay independent of scheduling.

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::error::AppError;
use crate::math::std_dev;

/// Two independent noisy draws over the same clean series.
#[derive(Debug, Clone)]
pub struct NoisyPair {
    /// Data handed to the fitter.
    pub fit: Vec<f64>,
    /// Held-out data, only used for cross-validated scoring.
    pub test: Vec<f64>,
}

/// `Some(seed)` gives a reproducible generator, `None` an entropy-seeded one.
pub fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Seed for an independent stream (e.g. one per noise level).
///
/// Uses a fixed SplitMix64 mix so a `--seed` reproduces across toolchains.
pub fn derive_seed(seed: u64, stream: u64) -> u64 {
    splitmix64(seed ^ splitmix64(stream))
}

fn splitmix64(x: u64) -> u64 {
    let mut z = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Add i.i.d. `N(0, (noise_level · std(series))²)` noise to every sample.
pub fn add_noise<R: Rng + ?Sized>(series: &[f64], noise_level: f64, rng: &mut R) -> Result<Vec<f64>, AppError> {
    if !(noise_level.is_finite() && noise_level >= 0.0) {
        return Err(AppError::config(format!(
            "Noise level must be finite and >= 0, got {noise_level}."
        )));
    }
    if series.iter().any(|v| !v.is_finite()) {
        return Err(AppError::invalid_data("Cannot add noise to a series with non-finite samples."));
    }
    if series.is_empty() {
        return Ok(Vec::new());
    }

    let sigma = noise_level * std_dev(series);
    if sigma == 0.0 {
        return Ok(series.to_vec());
    }

    let normal = Normal::new(0.0, sigma)
        .map_err(|e| AppError::config(format!("Noise distribution error: {e}")))?;
    Ok(series.iter().map(|&v| v + normal.sample(rng)).collect())
}

/// Draw the fit set and the held-out test set.
pub fn draw_pair<R: Rng + ?Sized>(series: &[f64], noise_level: f64, rng: &mut R) -> Result<NoisyPair, AppError> {
    let fit = add_noise(series, noise_level, rng)?;
    let test = add_noise(series, noise_level, rng)?;
    Ok(NoisyPair { fit, test })
}
