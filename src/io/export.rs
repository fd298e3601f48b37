//! Export series and sweep results to CSV.
//!
//! The exports are meant to be easy to consume in spreadsheets or downstream scripts.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::app::pipeline::SweepRow;
use crate::error::AppError;

/// Write named series side by side with a leading `time` column (seconds).
pub fn write_series_csv(path: &Path, tr: f64, columns: &[(&str, &[f64])]) -> Result<(), AppError> {
    let mut file = create(path)?;
    file.write_all(crate::report::format_series(tr, columns).as_bytes())
        .map_err(|e| AppError::io(format!("Failed to write series CSV '{}': {e}", path.display())))?;
    Ok(())
}

/// Write one row per (noise level, model kind).
///
/// Parameter columns use the DoG layout; surround columns stay empty for Gaussian rows.
pub fn write_sweep_csv(path: &Path, rows: &[SweepRow]) -> Result<(), AppError> {
    let mut file = create(path)?;

    writeln!(
        file,
        "noise_level,model,r_squared,cv_r_squared,status,x,y,size,surround_size_ratio,surround_volume_ratio,hrf_delay,amplitude,baseline"
    )
    .map_err(|e| AppError::io(format!("Failed to write sweep CSV header: {e}")))?;

    for r in rows {
        let p = r.params.to_vec();
        let n = p.len();
        let surround = if n == 8 {
            format!("{:.6},{:.6}", p[3], p[4])
        } else {
            ",".to_string()
        };
        writeln!(
            file,
            "{:.6},{},{:.6},{:.6},{},{:.6},{:.6},{:.6},{},{:.6},{:.6},{:.6}",
            r.noise_level,
            r.model,
            r.r_squared,
            r.cv_r_squared,
            r.status.label(),
            p[0],
            p[1],
            p[2],
            surround,
            p[n - 3],
            p[n - 2],
            p[n - 1],
        )
        .map_err(|e| AppError::io(format!("Failed to write sweep CSV row: {e}")))?;
    }

    Ok(())
}

pub(crate) fn create(path: &Path) -> Result<File, AppError> {
    File::create(path).map_err(|e| AppError::io(format!("Failed to create '{}': {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DogParams, GaussianParams, ModelKind, PrfParams};
    use crate::fit::RefineStatus;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("prf-fit-{}-{name}", std::process::id()))
    }

    #[test]
    fn sweep_csv_has_one_line_per_row() {
        let rows = vec![
            SweepRow {
                noise_level: 1.0,
                model: ModelKind::Gaussian,
                r_squared: 0.6,
                cv_r_squared: 0.5,
                status: RefineStatus::Converged,
                params: PrfParams::Gaussian(GaussianParams {
                    x: 1.0,
                    y: 2.0,
                    size: 3.0,
                    hrf_delay: 0.0,
                    amplitude: 0.5,
                    baseline: 0.1,
                }),
            },
            SweepRow {
                noise_level: 1.0,
                model: ModelKind::Dog,
                r_squared: 0.62,
                cv_r_squared: 0.48,
                status: RefineStatus::MaxIterations,
                params: PrfParams::Dog(DogParams {
                    x: 1.0,
                    y: 2.0,
                    size: 3.0,
                    surround_size_ratio: 2.0,
                    surround_volume_ratio: 0.3,
                    hrf_delay: 0.0,
                    amplitude: 0.5,
                    baseline: 0.1,
                }),
            },
        ];
        let path = temp_path("sweep.csv");
        write_sweep_csv(&path, &rows).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        let header_cols = lines[0].split(',').count();
        assert!(lines.iter().all(|l| l.split(',').count() == header_cols));
        assert!(lines[1].starts_with("1.000000,Gaussian,"));
        assert!(lines[2].contains("2.000000,0.300000"));
    }

    #[test]
    fn series_csv_matches_printed_table() {
        let clean = [0.0, 1.0, 2.0];
        let path = temp_path("series.csv");
        write_series_csv(&path, 2.0, &[("clean", clean.as_slice())]).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(text.lines().nth(3), Some("4.000,2.000000"));
    }

    #[test]
    fn missing_directory_is_an_io_error() {
        let path = std::env::temp_dir().join("prf-fit-no-such-dir").join("out.csv");
        let err = write_series_csv(&path, 1.0, &[]).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Io);
    }
}
