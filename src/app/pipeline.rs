//! Shared experiment logic used by every CLI subcommand.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! truth -> clean prediction -> noisy fit/test draws -> fit -> score
//!
//! The CLI can then focus on presentation (tables, CSV, JSON).

use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::data::{NoisyPair, derive_seed, draw_pair, seeded_rng};
use crate::domain::{ModelKind, PrfParams};
use crate::error::AppError;
use crate::fit::{FitResult, FitSpec, RefineStatus, Score, fit, score};
use crate::math::linspace;
use crate::models::ResponseModel;

/// One simulated measurement, its fit and its scores.
#[derive(Debug, Clone)]
pub struct ExperimentRun {
    pub truth: PrfParams,
    pub noise_level: f64,
    pub clean: Vec<f64>,
    pub noisy: NoisyPair,
    pub fit: FitResult,
    pub score: Score,
}

/// Search specifications for both model kinds.
#[derive(Debug, Clone)]
pub struct ModelSpecs {
    pub gaussian: FitSpec,
    pub dog: FitSpec,
}

impl ModelSpecs {
    pub fn get(&self, kind: ModelKind) -> &FitSpec {
        match kind {
            ModelKind::Gaussian => &self.gaussian,
            ModelKind::Dog => &self.dog,
        }
    }
}

/// Simulate, fit and score once.
pub fn run_experiment<M, R>(
    model: &M,
    spec: &FitSpec,
    truth: &PrfParams,
    noise_level: f64,
    rng: &mut R,
) -> Result<ExperimentRun, AppError>
where
    M: ResponseModel + ?Sized,
    R: Rng + ?Sized,
{
    let clean = model.predict(truth)?;
    let noisy = draw_pair(&clean, noise_level, rng)?;
    let result = fit(&noisy.fit, spec, model)?;
    let score = score(&result, &noisy.test)?;
    debug!(
        truth = %truth.kind(),
        fitted = %spec.kind,
        noise_level,
        r2 = score.r_squared,
        cv_r2 = score.cv_r_squared,
        "experiment done"
    );
    Ok(ExperimentRun {
        truth: *truth,
        noise_level,
        clean,
        noisy,
        fit: result,
        score,
    })
}

/// `count` evenly spaced noise levels over `[min, max]`.
pub fn noise_levels(min: f64, max: f64, count: usize) -> Result<Vec<f64>, AppError> {
    if !(min.is_finite() && max.is_finite() && min >= 0.0 && max >= min) {
        return Err(AppError::config(format!(
            "Invalid noise range: min={min}, max={max} (need 0 <= min <= max)."
        )));
    }
    if count == 0 {
        return Err(AppError::config("Noise sweep needs at least one level."));
    }
    if count == 1 {
        return Ok(vec![min]);
    }
    Ok(linspace(min, max, count))
}

/// One row of a noise sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepRow {
    pub noise_level: f64,
    pub model: ModelKind,
    pub r_squared: f64,
    pub cv_r_squared: f64,
    pub status: RefineStatus,
    pub params: PrfParams,
}

/// Fit both model kinds at every noise level.
///
/// Levels run in parallel; each level owns an RNG stream derived from `seed`
/// and its index, so results do not depend on scheduling. Both model kinds at
/// a level see the same noisy draws. Rows come back in level order, Gaussian
/// before DoG.
pub fn run_noise_sweep<M>(
    model: &M,
    specs: &ModelSpecs,
    truth: &PrfParams,
    levels: &[f64],
    seed: u64,
) -> Result<Vec<SweepRow>, AppError>
where
    M: ResponseModel + ?Sized,
{
    info!(levels = levels.len(), truth = %truth.kind(), "running noise sweep");
    let clean = model.predict(truth)?;

    let per_level: Vec<Result<Vec<SweepRow>, AppError>> = levels
        .par_iter()
        .enumerate()
        .map(|(i, &level)| -> Result<Vec<SweepRow>, AppError> {
            let mut rng = seeded_rng(Some(derive_seed(seed, i as u64)));
            let noisy = draw_pair(&clean, level, &mut rng)?;
            ModelKind::ALL
                .iter()
                .map(|&kind| -> Result<SweepRow, AppError> {
                    let result = fit(&noisy.fit, specs.get(kind), model)?;
                    let s = score(&result, &noisy.test)?;
                    Ok(SweepRow {
                        noise_level: level,
                        model: kind,
                        r_squared: s.r_squared,
                        cv_r_squared: s.cv_r_squared,
                        status: result.status,
                        params: result.params,
                    })
                })
                .collect()
        })
        .collect();

    let mut rows = Vec::with_capacity(levels.len() * ModelKind::ALL.len());
    for level_rows in per_level {
        rows.extend(level_rows?);
    }
    Ok(rows)
}

/// Mean scores of one fitted model kind across comparison trials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub model: ModelKind,
    pub mean_r_squared: f64,
    pub mean_cv_r_squared: f64,
    /// Fraction of trials whose refinement did not converge.
    pub unconverged: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comparison {
    /// Model that generated the data.
    pub truth: PrfParams,
    pub noise_level: f64,
    pub trials: usize,
    pub rows: Vec<ComparisonRow>,
}

/// Fit both model kinds to repeated noisy draws of `truth` and average the scores.
///
/// Trials run in parallel with one RNG stream per trial.
pub fn run_model_comparison<M>(
    model: &M,
    specs: &ModelSpecs,
    truth: &PrfParams,
    noise_level: f64,
    trials: usize,
    seed: u64,
) -> Result<Comparison, AppError>
where
    M: ResponseModel + ?Sized,
{
    if trials == 0 {
        return Err(AppError::config("Model comparison needs at least one trial."));
    }
    info!(trials, noise_level, truth = %truth.kind(), "running model comparison");
    let clean = model.predict(truth)?;

    let per_trial: Vec<Result<Vec<(Score, RefineStatus)>, AppError>> = (0..trials)
        .into_par_iter()
        .map(|t| -> Result<Vec<(Score, RefineStatus)>, AppError> {
            let mut rng = seeded_rng(Some(derive_seed(seed, t as u64)));
            let noisy = draw_pair(&clean, noise_level, &mut rng)?;
            ModelKind::ALL
                .iter()
                .map(|&kind| -> Result<(Score, RefineStatus), AppError> {
                    let result = fit(&noisy.fit, specs.get(kind), model)?;
                    Ok((score(&result, &noisy.test)?, result.status))
                })
                .collect()
        })
        .collect();

    let mut sums = [(0.0, 0.0, 0usize); 2];
    for trial in per_trial {
        for (slot, (s, status)) in sums.iter_mut().zip(trial?) {
            slot.0 += s.r_squared;
            slot.1 += s.cv_r_squared;
            if !matches!(status, RefineStatus::Converged | RefineStatus::Skipped) {
                slot.2 += 1;
            }
        }
    }

    let n = trials as f64;
    let rows = ModelKind::ALL
        .iter()
        .zip(sums)
        .map(|(&kind, (r2, cv, bad))| ComparisonRow {
            model: kind,
            mean_r_squared: r2 / n,
            mean_cv_r_squared: cv / n,
            unconverged: bad as f64 / n,
        })
        .collect();

    Ok(Comparison {
        truth: *truth,
        noise_level,
        trials,
        rows,
    })
}
