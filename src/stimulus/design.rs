use nalgebra::DMatrix;

use crate::error::AppError;

/// Visual stimulus: one aperture frame (height × width) per acquisition.
///
/// Frames are immutable once built. Each frame's non-zero pixels are indexed
/// up front so model evaluation only touches the part of the screen the
/// aperture uncovers.
#[derive(Debug, Clone)]
pub struct Stimulus {
    width: usize,
    height: usize,
    pixels_per_degree: f64,
    tr: f64,
    frames: Vec<DMatrix<f64>>,
    /// Per frame: (column-major pixel index, intensity) for every non-zero pixel.
    active: Vec<Vec<(usize, f64)>>,
    x_deg: Vec<f64>,
    y_deg: Vec<f64>,
}

impl Stimulus {
    pub fn new(frames: Vec<DMatrix<f64>>, pixels_per_degree: f64, tr: f64) -> Result<Self, AppError> {
        let Some(first) = frames.first() else {
            return Err(AppError::config("Stimulus has no frames."));
        };
        let (height, width) = first.shape();
        if width == 0 || height == 0 {
            return Err(AppError::config("Stimulus frames must be at least 1x1 pixels."));
        }
        if !(pixels_per_degree.is_finite() && pixels_per_degree > 0.0) {
            return Err(AppError::config(format!(
                "pixels_per_degree must be finite and > 0, got {pixels_per_degree}."
            )));
        }
        if !(tr.is_finite() && tr > 0.0) {
            return Err(AppError::config(format!("TR must be finite and > 0, got {tr}.")));
        }

        let mut active = Vec::with_capacity(frames.len());
        for (t, frame) in frames.iter().enumerate() {
            if frame.shape() != (height, width) {
                return Err(AppError::config(format!(
                    "Stimulus frame {t} is {:?}, expected {:?}.",
                    frame.shape(),
                    (height, width)
                )));
            }
            let mut on = Vec::new();
            for (idx, &v) in frame.as_slice().iter().enumerate() {
                if !v.is_finite() {
                    return Err(AppError::config(format!("Stimulus frame {t} has a non-finite pixel.")));
                }
                if v != 0.0 {
                    on.push((idx, v));
                }
            }
            active.push(on);
        }

        let x_deg = (0..width)
            .map(|c| (c as f64 + 0.5 - width as f64 / 2.0) / pixels_per_degree)
            .collect();
        // Row 0 is the top of the screen.
        let y_deg = (0..height)
            .map(|r| (height as f64 / 2.0 - r as f64 - 0.5) / pixels_per_degree)
            .collect();

        Ok(Self {
            width,
            height,
            pixels_per_degree,
            tr,
            frames,
            active,
            x_deg,
            y_deg,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn n_frames(&self) -> usize {
        self.frames.len()
    }

    pub fn pixels_per_degree(&self) -> f64 {
        self.pixels_per_degree
    }

    /// Seconds per frame.
    pub fn tr(&self) -> f64 {
        self.tr
    }

    pub fn frame(&self, t: usize) -> Option<&DMatrix<f64>> {
        self.frames.get(t)
    }

    pub fn active_pixels(&self, t: usize) -> &[(usize, f64)] {
        self.active.get(t).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Horizontal position (degrees) of each column's centre.
    pub fn x_coords(&self) -> &[f64] {
        &self.x_deg
    }

    /// Vertical position (degrees) of each row's centre.
    pub fn y_coords(&self) -> &[f64] {
        &self.y_deg
    }

    /// Half the shorter screen side, in degrees.
    pub fn radius_deg(&self) -> f64 {
        self.width.min(self.height) as f64 / (2.0 * self.pixels_per_degree)
    }

    /// Smallest resolvable receptive field size: one pixel.
    pub fn min_size(&self) -> f64 {
        1.0 / self.pixels_per_degree
    }
}
