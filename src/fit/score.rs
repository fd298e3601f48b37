//! Goodness of fit: within-sample and cross-validated variance explained.
//!
//! Within-sample R² is measured on the series the fitter saw and therefore
//! overstates how well a model generalises; extra parameters (the DoG
//! surround) inflate it further. Cross-validated R² scores the same
//! prediction against an independent noisy draw of the same clean signal and
//! is the number to use when comparing models.

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::fit::fitter::FitResult;
use crate::math::{sum_squared_error, total_sum_of_squares};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub r_squared: f64,
    pub cv_r_squared: f64,
}

/// `1 - SSE(predicted, observed) / SS(observed)`.
///
/// Fails when `observed` has no variance: the ratio would be meaningless.
pub fn r_squared(observed: &[f64], predicted: &[f64]) -> Result<f64, AppError> {
    if observed.is_empty() {
        return Err(AppError::invalid_data("Cannot score an empty series."));
    }
    if observed.len() != predicted.len() {
        return Err(AppError::invalid_data(format!(
            "Observed ({}) and predicted ({}) series differ in length.",
            observed.len(),
            predicted.len()
        )));
    }

    let ss = total_sum_of_squares(observed);
    let scale: f64 = observed.iter().map(|v| v * v).sum();
    if !ss.is_finite() || ss <= f64::EPSILON * scale {
        return Err(AppError::degenerate(
            "Observed series has zero variance; R² is undefined.",
        ));
    }

    let sse = sum_squared_error(predicted, observed);
    if !sse.is_finite() {
        return Err(AppError::invalid_data("Prediction contains non-finite samples."));
    }
    Ok(1.0 - sse / ss)
}

/// Score a fit on its own data and on an independent held-out draw.
pub fn score(fit: &FitResult, held_out: &[f64]) -> Result<Score, AppError> {
    let cv_r_squared = r_squared(held_out, &fit.prediction)?;
    Ok(Score {
        r_squared: fit.r_squared,
        cv_r_squared,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{GaussianParams, PrfParams};
    use crate::error::ErrorKind;
    use crate::fit::refine::RefineStatus;

    fn fake_fit(prediction: Vec<f64>, data: Vec<f64>) -> FitResult {
        let params = PrfParams::Gaussian(GaussianParams {
            x: 0.0,
            y: 0.0,
            size: 1.0,
            hrf_delay: 0.0,
            amplitude: 1.0,
            baseline: 0.0,
        });
        let r2 = r_squared(&data, &prediction).unwrap();
        FitResult {
            params,
            grid_params: params,
            sse: sum_squared_error(&prediction, &data),
            grid_sse: 0.0,
            r_squared: r2,
            prediction,
            data,
            status: RefineStatus::Converged,
            iterations: 0,
            grid_candidates: 1,
        }
    }

    #[test]
    fn perfect_prediction_scores_one() {
        let y = [1.0, 2.0, 3.0, 4.0];
        assert!((r_squared(&y, &y).unwrap() - 1.0).abs() < 1e-15);
    }

    #[test]
    fn mean_prediction_scores_zero() {
        let y = [1.0, 2.0, 3.0, 4.0];
        assert!(r_squared(&y, &[2.5; 4]).unwrap().abs() < 1e-15);
    }

    #[test]
    fn cross_validated_score_uses_held_out_series() {
        let fit = fake_fit(vec![0.0, 1.0, 2.0, 3.0], vec![0.1, 0.9, 2.1, 2.9]);
        let s = score(&fit, &[0.0, 1.0, 2.0, 3.0]).unwrap();
        assert_eq!(s.cv_r_squared, 1.0);
        assert!(s.r_squared < 1.0);
    }

    #[test]
    fn zero_variance_held_out_is_flagged() {
        let fit = fake_fit(vec![0.0, 1.0, 2.0], vec![0.0, 1.0, 2.0]);
        let err = score(&fit, &[0.0, 0.0, 0.0]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DegenerateVariance);
        let err = r_squared(&[0.3; 5], &[0.0; 5]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DegenerateVariance);
    }

    #[test]
    fn length_mismatch_is_rejected() {
        assert!(r_squared(&[1.0, 2.0], &[1.0]).is_err());
    }
}
