//! Hemodynamic response function and causal convolution.
//!
//! The canonical HRF is the SPM double gamma:
//!
//! ```text
//! h(t) = g(t; 6) - g(t; 16) / 6,   g(t; a) = t^(a-1) e^(-t) / Γ(a)
//! ```
//!
//! sampled every `tr` seconds over 32 s and scaled to unit sum. The delay
//! parameter of the models weights the temporal derivative `h(t) - h(t - 1s)`,
//! which shifts the peak earlier (positive) or later (negative).

use crate::error::AppError;

/// Duration of the sampled kernel.
pub const HRF_LENGTH_SECS: f64 = 32.0;

const PEAK_SHAPE: u32 = 6;
const UNDERSHOOT_SHAPE: u32 = 16;
const UNDERSHOOT_RATIO: f64 = 1.0 / 6.0;

/// Canonical HRF and its temporal derivative, sampled at a fixed TR.
#[derive(Debug, Clone)]
pub struct Hrf {
    tr: f64,
    canonical: Vec<f64>,
    derivative: Vec<f64>,
}

impl Hrf {
    pub fn canonical(tr: f64) -> Result<Self, AppError> {
        if !(tr.is_finite() && tr > 0.0 && tr < HRF_LENGTH_SECS / 2.0) {
            return Err(AppError::config(format!(
                "TR must be finite and in (0, {}) seconds, got {tr}.",
                HRF_LENGTH_SECS / 2.0
            )));
        }

        let n = (HRF_LENGTH_SECS / tr).ceil() as usize;
        let mut canonical = Vec::with_capacity(n);
        let mut derivative = Vec::with_capacity(n);
        for k in 0..n {
            let t = k as f64 * tr;
            let h = double_gamma(t);
            canonical.push(h);
            derivative.push(h - double_gamma(t - 1.0));
        }

        let total: f64 = canonical.iter().sum();
        if !(total.is_finite() && total > 0.0) {
            return Err(AppError::config(format!("HRF sampled at TR={tr} has no mass.")));
        }
        for v in canonical.iter_mut().chain(derivative.iter_mut()) {
            *v /= total;
        }

        Ok(Self {
            tr,
            canonical,
            derivative,
        })
    }

    pub fn tr(&self) -> f64 {
        self.tr
    }

    /// Kernel length in samples.
    pub fn n_taps(&self) -> usize {
        self.canonical.len()
    }

    pub fn canonical_kernel(&self) -> &[f64] {
        &self.canonical
    }

    pub fn derivative_kernel(&self) -> &[f64] {
        &self.derivative
    }

    /// `canonical + delay * derivative`.
    pub fn kernel(&self, delay: f64) -> Vec<f64> {
        self.canonical
            .iter()
            .zip(&self.derivative)
            .map(|(&h, &d)| h + delay * d)
            .collect()
    }
}

fn double_gamma(t: f64) -> f64 {
    if t <= 0.0 {
        return 0.0;
    }
    gamma_pdf(t, PEAK_SHAPE) - UNDERSHOOT_RATIO * gamma_pdf(t, UNDERSHOOT_SHAPE)
}

/// Unit-scale gamma density for an integer shape.
fn gamma_pdf(t: f64, shape: u32) -> f64 {
    let ln_fact: f64 = (2..shape).map(|k| (k as f64).ln()).sum();
    ((shape as f64 - 1.0) * t.ln() - t - ln_fact).exp()
}

/// Causal convolution truncated to the signal length.
///
/// `out[t] = Σ_k kernel[k] · signal[t - k]`.
pub fn convolve_causal(signal: &[f64], kernel: &[f64]) -> Vec<f64> {
    let mut out = vec![0.0; signal.len()];
    for (t, slot) in out.iter_mut().enumerate() {
        let taps = kernel.len().min(t + 1);
        let mut acc = 0.0;
        for (k, &h) in kernel[..taps].iter().enumerate() {
            acc += h * signal[t - k];
        }
        *slot = acc;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_hrf_has_unit_sum_and_peaks_near_five_seconds() {
        let hrf = Hrf::canonical(1.0).unwrap();
        assert_eq!(hrf.n_taps(), 32);
        let total: f64 = hrf.canonical_kernel().iter().sum();
        assert!((total - 1.0).abs() < 1e-12);

        let (peak, _) = hrf
            .canonical_kernel()
            .iter()
            .enumerate()
            .fold((0, f64::MIN), |acc, (i, &v)| if v > acc.1 { (i, v) } else { acc });
        assert_eq!(peak, 5);
    }

    #[test]
    fn hrf_has_post_stimulus_undershoot() {
        let hrf = Hrf::canonical(1.0).unwrap();
        assert!(hrf.canonical_kernel()[15] < 0.0);
    }

    #[test]
    fn zero_delay_kernel_is_canonical() {
        let hrf = Hrf::canonical(1.5).unwrap();
        assert_eq!(hrf.kernel(0.0), hrf.canonical_kernel().to_vec());
    }

    #[test]
    fn invalid_tr_is_rejected() {
        assert!(Hrf::canonical(0.0).is_err());
        assert!(Hrf::canonical(f64::NAN).is_err());
        assert!(Hrf::canonical(40.0).is_err());
    }

    #[test]
    fn convolution_with_impulse_returns_kernel() {
        let signal = [1.0, 0.0, 0.0, 0.0, 0.0];
        let kernel = [0.5, 0.3, 0.2];
        let out = convolve_causal(&signal, &kernel);
        assert_eq!(out, vec![0.5, 0.3, 0.2, 0.0, 0.0]);
    }

    #[test]
    fn convolution_is_truncated_to_signal_length() {
        let signal = [1.0, 1.0];
        let kernel = [1.0, 1.0, 1.0, 1.0];
        assert_eq!(convolve_causal(&signal, &kernel), vec![1.0, 2.0]);
    }
}
