//! Command-line parsing for the pRF simulation and fitting tool.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the modeling/math code.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::ModelKind;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "prf",
    version,
    about = "Population receptive field simulation and parameter recovery"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the clean series and two independent noisy draws for the ground truth.
    Simulate(SimulateArgs),
    /// Simulate one measurement, fit it and report within-sample and cross-validated R².
    Fit(FitArgs),
    /// Sweep the noise level and fit both models at every level.
    Sweep(SweepArgs),
    /// Fit both models to repeated draws from one generating model and average the scores.
    Compare(CompareArgs),
}

/// Bar-sweep stimulus geometry.
#[derive(Debug, Args, Clone)]
pub struct StimulusArgs {
    /// Screen side length in pixels.
    #[arg(long, default_value_t = 40)]
    pub size_px: usize,

    /// Pixels per degree of visual angle.
    #[arg(long, default_value_t = 2.0)]
    pub ppd: f64,

    /// Bar width in pixels.
    #[arg(long, default_value_t = 4)]
    pub bar_width: usize,

    /// Bar displacement per frame in pixels.
    #[arg(long, default_value_t = 2)]
    pub step: usize,

    /// Blank frames before the first sweep and after every sweep.
    #[arg(long, default_value_t = 8)]
    pub blank: usize,

    /// Repetition time (seconds per frame).
    #[arg(long, default_value_t = 1.5)]
    pub tr: f64,
}

/// Grid-search resolution and refinement budget.
#[derive(Debug, Args, Clone)]
pub struct GridArgs {
    /// Grid points per spatial and surround parameter.
    #[arg(long, default_value_t = 5)]
    pub grid_points: usize,

    /// Grid points on the HRF delay axis (1 = fixed at 0 during the grid stage).
    #[arg(long, default_value_t = 1)]
    pub delay_points: usize,

    /// Maximum refinement iterations (0 disables refinement).
    #[arg(long, default_value_t = 200)]
    pub max_iter: usize,
}

/// Ground-truth parameters used to synthesise data.
#[derive(Debug, Args, Clone)]
pub struct TruthArgs {
    /// Generating model.
    #[arg(long, value_enum, default_value_t = ModelKind::Gaussian)]
    pub model: ModelKind,

    /// Horizontal centre (degrees).
    #[arg(long, default_value_t = -2.24, allow_negative_numbers = true)]
    pub x: f64,

    /// Vertical centre (degrees).
    #[arg(long, default_value_t = 2.58, allow_negative_numbers = true)]
    pub y: f64,

    /// Centre sigma (degrees).
    #[arg(long, default_value_t = 3.74)]
    pub size: f64,

    /// Surround sigma / centre sigma (DoG only).
    #[arg(long, default_value_t = 2.5)]
    pub surround_ratio: f64,

    /// Surround volume / centre volume (DoG only).
    #[arg(long, default_value_t = 0.4)]
    pub surround_volume: f64,

    /// Weight of the HRF temporal derivative.
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub delay: f64,

    /// Response amplitude.
    #[arg(long, default_value_t = 0.55)]
    pub amplitude: f64,

    /// Response baseline.
    #[arg(long, default_value_t = -0.28, allow_negative_numbers = true)]
    pub baseline: f64,
}

#[derive(Debug, Parser, Clone)]
pub struct SimulateArgs {
    #[command(flatten)]
    pub stimulus: StimulusArgs,

    #[command(flatten)]
    pub truth: TruthArgs,

    /// Noise std as a multiple of the clean series' std.
    #[arg(long, default_value_t = 1.0)]
    pub noise: f64,

    /// Random seed (omit for non-reproducible noise).
    #[arg(long)]
    pub seed: Option<u64>,

    /// Write the series to CSV instead of stdout.
    #[arg(long)]
    pub export: Option<PathBuf>,
}

#[derive(Debug, Parser, Clone)]
pub struct FitArgs {
    #[command(flatten)]
    pub stimulus: StimulusArgs,

    #[command(flatten)]
    pub grid: GridArgs,

    #[command(flatten)]
    pub truth: TruthArgs,

    /// Model to fit (defaults to the generating model).
    #[arg(long, value_enum)]
    pub fit_model: Option<ModelKind>,

    /// Noise std as a multiple of the clean series' std.
    #[arg(long, default_value_t = 1.0)]
    pub noise: f64,

    /// Random seed (omit for non-reproducible noise).
    #[arg(long)]
    pub seed: Option<u64>,

    /// Export the fit (parameters, scores, series) to JSON.
    #[arg(long = "export-json")]
    pub export_json: Option<PathBuf>,
}

#[derive(Debug, Parser, Clone)]
pub struct SweepArgs {
    #[command(flatten)]
    pub stimulus: StimulusArgs,

    #[command(flatten)]
    pub grid: GridArgs,

    #[command(flatten)]
    pub truth: TruthArgs,

    /// Lowest noise level.
    #[arg(long, default_value_t = 1.0)]
    pub noise_min: f64,

    /// Highest noise level.
    #[arg(long, default_value_t = 3.5)]
    pub noise_max: f64,

    /// Number of evenly spaced noise levels.
    #[arg(long, default_value_t = 10)]
    pub levels: usize,

    /// Random seed (omit to draw one; it is logged).
    #[arg(long)]
    pub seed: Option<u64>,

    /// Export sweep rows to CSV.
    #[arg(long)]
    pub export: Option<PathBuf>,
}

#[derive(Debug, Parser, Clone)]
pub struct CompareArgs {
    #[command(flatten)]
    pub stimulus: StimulusArgs,

    #[command(flatten)]
    pub grid: GridArgs,

    #[command(flatten)]
    pub truth: TruthArgs,

    /// Noise std as a multiple of the clean series' std.
    #[arg(long, default_value_t = 1.0)]
    pub noise: f64,

    /// Number of independent noisy draws.
    #[arg(long, default_value_t = 20)]
    pub trials: usize,

    /// Random seed (omit to draw one; it is logged).
    #[arg(long)]
    pub seed: Option<u64>,

    /// Export the comparison to JSON.
    #[arg(long = "export-json")]
    pub export_json: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse() {
        let cli = Cli::parse_from(["prf", "fit"]);
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        assert_eq!(args.truth.model, ModelKind::Gaussian);
        assert_eq!(args.truth.x, -2.24);
        assert_eq!(args.grid.grid_points, 5);
        assert!(args.seed.is_none());
    }

    #[test]
    fn sweep_flags_parse() {
        let cli = Cli::parse_from([
            "prf", "sweep", "--model", "dog", "--levels", "4", "--seed", "9", "--x", "-1.5",
        ]);
        let Command::Sweep(args) = cli.command else {
            panic!("expected sweep");
        };
        assert_eq!(args.truth.model, ModelKind::Dog);
        assert_eq!(args.levels, 4);
        assert_eq!(args.seed, Some(9));
        assert_eq!(args.truth.x, -1.5);
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
