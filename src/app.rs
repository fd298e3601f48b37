//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and sets up logging
//! - parses CLI arguments into an `ExperimentConfig`
//! - builds the stimulus and forward model
//! - runs the requested experiment
//! - prints reports and writes optional exports

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::{Command, CompareArgs, FitArgs, GridArgs, SimulateArgs, StimulusArgs, SweepArgs, TruthArgs};
use crate::data::{draw_pair, seeded_rng};
use crate::domain::{DogParams, ExperimentConfig, GaussianParams, ModelKind, PrfParams};
use crate::error::AppError;
use crate::fit::{FitSpec, GridOptions, RefineOptions};
use crate::models::{PrfModel, ResponseModel};
use crate::stimulus::BarDesign;

pub mod pipeline;

use pipeline::ModelSpecs;

/// Entry point for the `prf` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = crate::cli::Cli::parse();
    match cli.command {
        Command::Simulate(args) => handle_simulate(args),
        Command::Fit(args) => handle_fit(args),
        Command::Sweep(args) => handle_sweep(args),
        Command::Compare(args) => handle_compare(args),
    }
}

/// Log to stderr so stdout stays clean for tables and CSV.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn handle_simulate(args: SimulateArgs) -> Result<(), AppError> {
    let config = ExperimentConfig {
        noise_level: args.noise,
        seed: args.seed,
        export_csv: args.export.clone(),
        ..base_config(&args.stimulus, None, &args.truth)?
    };

    let stimulus = config.design.build()?;
    let model = PrfModel::new(&stimulus)?;
    let clean = model.predict(&config.truth)?;
    let mut rng = seeded_rng(config.seed);
    let noisy = draw_pair(&clean, config.noise_level, &mut rng)?;

    let columns = [
        ("clean", clean.as_slice()),
        ("fit", noisy.fit.as_slice()),
        ("test", noisy.test.as_slice()),
    ];
    match &config.export_csv {
        Some(path) => {
            crate::io::write_series_csv(path, stimulus.tr(), &columns)?;
            info!(path = %path.display(), "series written");
        }
        None => print!("{}", crate::report::format_series(stimulus.tr(), &columns)),
    }
    Ok(())
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let config = ExperimentConfig {
        noise_level: args.noise,
        seed: args.seed,
        export_json: args.export_json.clone(),
        ..base_config(&args.stimulus, Some(&args.grid), &args.truth)?
    };
    let fit_kind = args.fit_model.unwrap_or(config.truth.kind());

    let stimulus = config.design.build()?;
    let model = PrfModel::new(&stimulus)?;
    let spec = FitSpec::for_kind(fit_kind, &stimulus, &config.grid)?;
    info!(
        truth = %config.truth.kind(),
        fitted = %fit_kind,
        candidates = spec.grid_size(),
        noise_level = config.noise_level,
        "fitting"
    );

    let mut rng = seeded_rng(config.seed);
    let run = pipeline::run_experiment(&model, &spec, &config.truth, config.noise_level, &mut rng)?;
    println!("{}", crate::report::format_fit_summary(&run));

    if let Some(path) = &config.export_json {
        crate::io::write_fit_json(path, &run, &config)?;
        info!(path = %path.display(), "fit report written");
    }
    Ok(())
}

fn handle_sweep(args: SweepArgs) -> Result<(), AppError> {
    let config = ExperimentConfig {
        seed: args.seed,
        sweep_min: args.noise_min,
        sweep_max: args.noise_max,
        sweep_count: args.levels,
        export_csv: args.export.clone(),
        ..base_config(&args.stimulus, Some(&args.grid), &args.truth)?
    };

    let stimulus = config.design.build()?;
    let model = PrfModel::new(&stimulus)?;
    let specs = model_specs(&stimulus, &config.grid)?;
    let levels = pipeline::noise_levels(config.sweep_min, config.sweep_max, config.sweep_count)?;
    let seed = resolve_seed(config.seed);

    let rows = pipeline::run_noise_sweep(&model, &specs, &config.truth, &levels, seed)?;
    println!("{}", crate::report::format_sweep(&rows));

    if let Some(path) = &config.export_csv {
        crate::io::write_sweep_csv(path, &rows)?;
        info!(path = %path.display(), "sweep written");
    }
    Ok(())
}

fn handle_compare(args: CompareArgs) -> Result<(), AppError> {
    let config = ExperimentConfig {
        noise_level: args.noise,
        seed: args.seed,
        trials: args.trials,
        export_json: args.export_json.clone(),
        ..base_config(&args.stimulus, Some(&args.grid), &args.truth)?
    };

    let stimulus = config.design.build()?;
    let model = PrfModel::new(&stimulus)?;
    let specs = model_specs(&stimulus, &config.grid)?;
    let seed = resolve_seed(config.seed);

    let comparison =
        pipeline::run_model_comparison(&model, &specs, &config.truth, config.noise_level, config.trials, seed)?;
    println!("{}", crate::report::format_comparison(&comparison));

    if let Some(path) = &config.export_json {
        crate::io::write_comparison_json(path, &comparison)?;
        info!(path = %path.display(), "comparison written");
    }
    Ok(())
}

fn model_specs(stimulus: &crate::stimulus::Stimulus, grid: &GridOptions) -> Result<ModelSpecs, AppError> {
    Ok(ModelSpecs {
        gaussian: FitSpec::gaussian(stimulus, grid)?,
        dog: FitSpec::dog(stimulus, grid)?,
    })
}

/// Sweeps and comparisons always run on explicit streams; draw a seed when none is given.
fn resolve_seed(seed: Option<u64>) -> u64 {
    match seed {
        Some(seed) => seed,
        None => {
            let seed = rand::random::<u64>();
            info!(seed, "no seed given; drew one");
            seed
        }
    }
}

/// Config fields shared by every subcommand; the rest take their defaults.
pub fn base_config(
    stimulus: &StimulusArgs,
    grid: Option<&GridArgs>,
    truth: &TruthArgs,
) -> Result<ExperimentConfig, AppError> {
    let design = BarDesign {
        size_px: stimulus.size_px,
        pixels_per_degree: stimulus.ppd,
        bar_width_px: stimulus.bar_width,
        step_px: stimulus.step,
        blank_frames: stimulus.blank,
        tr: stimulus.tr,
    };
    let grid = match grid {
        Some(g) => GridOptions {
            points: g.grid_points,
            delay_points: g.delay_points,
            refine: RefineOptions {
                max_iter: g.max_iter,
                ..RefineOptions::default()
            },
        },
        None => GridOptions::default(),
    };

    Ok(ExperimentConfig {
        design,
        grid,
        truth: truth_params(truth)?,
        noise_level: 1.0,
        seed: None,
        sweep_min: 1.0,
        sweep_max: 3.5,
        sweep_count: 10,
        trials: 20,
        export_csv: None,
        export_json: None,
    })
}

pub fn truth_params(args: &TruthArgs) -> Result<PrfParams, AppError> {
    let params = match args.model {
        ModelKind::Gaussian => PrfParams::Gaussian(GaussianParams {
            x: args.x,
            y: args.y,
            size: args.size,
            hrf_delay: args.delay,
            amplitude: args.amplitude,
            baseline: args.baseline,
        }),
        ModelKind::Dog => PrfParams::Dog(DogParams {
            x: args.x,
            y: args.y,
            size: args.size,
            surround_size_ratio: args.surround_ratio,
            surround_volume_ratio: args.surround_volume,
            hrf_delay: args.delay,
            amplitude: args.amplitude,
            baseline: args.baseline,
        }),
    };
    params.validate()?;
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;

    #[test]
    fn config_follows_flags() {
        let cli = Cli::parse_from(["prf", "fit", "--model", "dog", "--grid-points", "3", "--tr", "2.0"]);
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        let config = base_config(&args.stimulus, Some(&args.grid), &args.truth).unwrap();
        assert_eq!(config.truth.kind(), ModelKind::Dog);
        assert_eq!(config.grid.points, 3);
        assert_eq!(config.design.tr, 2.0);
    }

    #[test]
    fn invalid_truth_is_rejected() {
        let cli = Cli::parse_from(["prf", "simulate", "--model", "dog", "--surround-ratio", "0.8"]);
        let Command::Simulate(args) = cli.command else {
            panic!("expected simulate");
        };
        assert!(truth_params(&args.truth).is_err());
    }
}
