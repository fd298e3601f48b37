//! JSON reports.
//!
//! A fit report is the portable record of one simulate/fit/score run:
//! - generating and fitted parameters (plus the grid-stage estimate)
//! - scores and refinement outcome
//! - the series involved, for plotting elsewhere

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::app::pipeline::{Comparison, ExperimentRun};
use crate::domain::{ExperimentConfig, PrfParams};
use crate::error::AppError;
use crate::fit::{RefineStatus, Score};
use crate::io::export::create;
use crate::stimulus::BarDesign;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitReport {
    pub tool: String,
    pub generated_at: DateTime<Utc>,
    pub design: BarDesign,
    pub seed: Option<u64>,
    pub noise_level: f64,
    pub truth: PrfParams,
    pub grid: PrfParams,
    pub fitted: PrfParams,
    pub status: RefineStatus,
    pub iterations: usize,
    pub grid_candidates: usize,
    pub score: Score,
    pub series: FitSeries,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitSeries {
    pub tr: f64,
    pub clean: Vec<f64>,
    pub fit: Vec<f64>,
    pub test: Vec<f64>,
    pub prediction: Vec<f64>,
}

impl FitReport {
    pub fn new(run: &ExperimentRun, config: &ExperimentConfig) -> Self {
        Self {
            tool: "prf".to_string(),
            generated_at: Utc::now(),
            design: config.design,
            seed: config.seed,
            noise_level: run.noise_level,
            truth: run.truth,
            grid: run.fit.grid_params,
            fitted: run.fit.params,
            status: run.fit.status,
            iterations: run.fit.iterations,
            grid_candidates: run.fit.grid_candidates,
            score: run.score,
            series: FitSeries {
                tr: config.design.tr,
                clean: run.clean.clone(),
                fit: run.noisy.fit.clone(),
                test: run.noisy.test.clone(),
                prediction: run.fit.prediction.clone(),
            },
        }
    }
}

/// Write a fit report.
pub fn write_fit_json(path: &Path, run: &ExperimentRun, config: &ExperimentConfig) -> Result<(), AppError> {
    let file = create(path)?;
    serde_json::to_writer_pretty(file, &FitReport::new(run, config))
        .map_err(|e| AppError::io(format!("Failed to write fit JSON: {e}")))?;
    Ok(())
}

/// Read a fit report back.
pub fn read_fit_json(path: &Path) -> Result<FitReport, AppError> {
    let file = std::fs::File::open(path)
        .map_err(|e| AppError::io(format!("Failed to open fit JSON '{}': {e}", path.display())))?;
    serde_json::from_reader(file).map_err(|e| AppError::invalid_data(format!("Invalid fit JSON: {e}")))
}

/// Write a model comparison, stamped with the generation time.
pub fn write_comparison_json(path: &Path, comparison: &Comparison) -> Result<(), AppError> {
    #[derive(Serialize)]
    struct Stamped<'a> {
        tool: &'static str,
        generated_at: DateTime<Utc>,
        #[serde(flatten)]
        comparison: &'a Comparison,
    }

    let file = create(path)?;
    let stamped = Stamped {
        tool: "prf",
        generated_at: Utc::now(),
        comparison,
    };
    serde_json::to_writer_pretty(file, &stamped)
        .map_err(|e| AppError::io(format!("Failed to write comparison JSON: {e}")))?;
    Ok(())
}
