//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the math/fitting code stays clean and testable
//! - output changes are localized

use crate::app::pipeline::{Comparison, ExperimentRun, SweepRow};
use crate::domain::{ModelKind, PrfParams};

/// Series as a CSV-style table with a time column.
pub fn format_series(tr: f64, columns: &[(&str, &[f64])]) -> String {
    let mut out = String::from("time");
    for (name, _) in columns {
        out.push(',');
        out.push_str(name);
    }
    out.push('\n');

    let n = columns.iter().map(|(_, v)| v.len()).max().unwrap_or(0);
    for t in 0..n {
        out.push_str(&format!("{:.3}", t as f64 * tr));
        for (_, values) in columns {
            match values.get(t) {
                Some(v) => out.push_str(&format!(",{v:.6}")),
                None => out.push(','),
            }
        }
        out.push('\n');
    }
    out
}

/// Summary of a single simulate/fit/score run.
pub fn format_fit_summary(run: &ExperimentRun) -> String {
    let fit = &run.fit;
    let mut out = String::new();

    out.push_str("=== prf - pRF parameter recovery ===\n");
    out.push_str(&format!(
        "Truth: {} | fitted: {} | noise level: {:.3} | samples: {}\n",
        run.truth.kind(),
        fit.params.kind(),
        run.noise_level,
        fit.data.len()
    ));
    out.push_str(&format!(
        "Grid: {} candidates, SSE={:.6}\n",
        fit.grid_candidates, fit.grid_sse
    ));
    out.push_str(&format!(
        "Refinement: {} after {} iterations, SSE={:.6}\n",
        fit.status.label(),
        fit.iterations,
        fit.sse
    ));

    out.push('\n');
    out.push_str(&format_params_table(&run.truth, &fit.grid_params, &fit.params));

    out.push('\n');
    out.push_str(&format!("R² (within sample, optimistic): {:.4}\n", run.score.r_squared));
    out.push_str(&format!("R² (cross-validated):           {:.4}\n", run.score.cv_r_squared));
    out
}

fn format_params_table(truth: &PrfParams, grid: &PrfParams, fitted: &PrfParams) -> String {
    let mut out = String::new();
    out.push_str(&format!("{:<22} {:>10} {:>10} {:>10}\n", "parameter", "truth", "grid", "fitted"));
    out.push_str(&format!("{:-<22} {:-<10} {:-<10} {:-<10}\n", "", "", "", ""));

    let truth_v = truth.to_vec();
    let names = fitted.kind().param_names();
    for ((name, g), f) in names.iter().zip(grid.to_vec()).zip(fitted.to_vec()) {
        // Truth and fit may use different model kinds; only show matching names.
        let t = truth
            .kind()
            .param_names()
            .iter()
            .position(|n| n == name)
            .map(|j| format!("{:>10.4}", truth_v[j]))
            .unwrap_or_else(|| format!("{:>10}", "-"));
        out.push_str(&format!("{name:<22} {t} {g:>10.4} {f:>10.4}\n"));
    }
    out
}

/// Noise sweep table: one line per level, both models side by side.
pub fn format_sweep(rows: &[SweepRow]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:>8} {:>12} {:>12} {:>12} {:>12}\n",
        "noise", "gauss R²", "gauss cvR²", "dog R²", "dog cvR²"
    ));
    out.push_str(&format!("{:-<8} {:-<12} {:-<12} {:-<12} {:-<12}\n", "", "", "", "", ""));

    let mut levels: Vec<f64> = rows.iter().map(|r| r.noise_level).collect();
    levels.dedup();
    for level in levels {
        let cell = |kind: ModelKind| {
            rows.iter()
                .find(|r| r.noise_level == level && r.model == kind)
                .map(|r| (format!("{:>12.4}", r.r_squared), format!("{:>12.4}", r.cv_r_squared)))
                .unwrap_or_else(|| (format!("{:>12}", "-"), format!("{:>12}", "-")))
        };
        let (g_r2, g_cv) = cell(ModelKind::Gaussian);
        let (d_r2, d_cv) = cell(ModelKind::Dog);
        out.push_str(&format!("{level:>8.3} {g_r2} {g_cv} {d_r2} {d_cv}\n"));
    }
    out
}

pub fn format_comparison(c: &Comparison) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Data generated by the {} model, noise level {:.3}, {} trials\n\n",
        c.truth.kind(),
        c.noise_level,
        c.trials
    ));
    out.push_str(&format!(
        "{:<10} {:>14} {:>14} {:>12}\n",
        "fitted", "mean R²", "mean cvR²", "unconverged"
    ));
    out.push_str(&format!("{:-<10} {:-<14} {:-<14} {:-<12}\n", "", "", "", ""));
    for row in &c.rows {
        out.push_str(&format!(
            "{:<10} {:>14.4} {:>14.4} {:>11.0}%\n",
            row.model.display_name(),
            row.mean_r_squared,
            row.mean_cv_r_squared,
            row.unconverged * 100.0
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::pipeline::ComparisonRow;
    use crate::domain::GaussianParams;
    use crate::fit::RefineStatus;

    fn params() -> PrfParams {
        PrfParams::Gaussian(GaussianParams {
            x: 1.0,
            y: 2.0,
            size: 3.0,
            hrf_delay: 0.0,
            amplitude: 0.5,
            baseline: 0.1,
        })
    }

    #[test]
    fn series_table_has_header_and_rows() {
        let a = [1.0, 2.0];
        let b = [3.0, 4.0];
        let out = format_series(1.5, &[("clean", a.as_slice()), ("fit", b.as_slice())]);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "time,clean,fit");
        assert_eq!(lines[2], "1.500,2.000000,4.000000");
    }

    #[test]
    fn sweep_table_pairs_models_by_level() {
        let row = |level: f64, model: ModelKind, cv: f64| SweepRow {
            noise_level: level,
            model,
            r_squared: cv + 0.1,
            cv_r_squared: cv,
            status: RefineStatus::Converged,
            params: params(),
        };
        let rows = vec![
            row(1.0, ModelKind::Gaussian, 0.5),
            row(1.0, ModelKind::Dog, 0.4),
            row(2.0, ModelKind::Gaussian, 0.2),
            row(2.0, ModelKind::Dog, 0.1),
        ];
        let out = format_sweep(&rows);
        assert_eq!(out.lines().count(), 4);
        assert!(out.lines().nth(2).unwrap().contains("0.4000"));
    }

    #[test]
    fn comparison_lists_both_models() {
        let c = Comparison {
            truth: params(),
            noise_level: 1.0,
            trials: 3,
            rows: vec![
                ComparisonRow {
                    model: ModelKind::Gaussian,
                    mean_r_squared: 0.5,
                    mean_cv_r_squared: 0.4,
                    unconverged: 0.0,
                },
                ComparisonRow {
                    model: ModelKind::Dog,
                    mean_r_squared: 0.52,
                    mean_cv_r_squared: 0.39,
                    unconverged: 1.0 / 3.0,
                },
            ],
        };
        let out = format_comparison(&c);
        assert!(out.contains("Gaussian"));
        assert!(out.contains("DoG"));
        assert!(out.contains("33%"));
    }
}
