//! Moving-bar aperture design.
//!
//! A bar sweeps across a square screen in four directions (left→right,
//! bottom→top, right→left, top→bottom). A blank period precedes the first
//! sweep and follows every sweep so the response can return to baseline.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::stimulus::Stimulus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sweep {
    LeftToRight,
    BottomToTop,
    RightToLeft,
    TopToBottom,
}

const SWEEPS: [Sweep; 4] = [
    Sweep::LeftToRight,
    Sweep::BottomToTop,
    Sweep::RightToLeft,
    Sweep::TopToBottom,
];

/// Geometry and timing of a bar-sweep experiment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BarDesign {
    /// Screen side length in pixels.
    pub size_px: usize,
    pub pixels_per_degree: f64,
    pub bar_width_px: usize,
    /// Bar displacement between consecutive frames.
    pub step_px: usize,
    /// Blank frames before the first sweep and after each sweep.
    pub blank_frames: usize,
    /// Seconds per frame.
    pub tr: f64,
}

impl Default for BarDesign {
    /// 20° screen (±10°) at 2 px/deg, 116 frames at TR 1.5 s.
    fn default() -> Self {
        Self {
            size_px: 40,
            pixels_per_degree: 2.0,
            bar_width_px: 4,
            step_px: 2,
            blank_frames: 8,
            tr: 1.5,
        }
    }
}

impl BarDesign {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.size_px == 0 || self.bar_width_px == 0 || self.step_px == 0 {
            return Err(AppError::config("Screen size, bar width and step must be > 0 pixels."));
        }
        if self.bar_width_px >= self.size_px {
            return Err(AppError::config(format!(
                "Bar width ({}) must be smaller than the screen ({}).",
                self.bar_width_px, self.size_px
            )));
        }
        Ok(())
    }

    /// Frames per sweep.
    pub fn sweep_len(&self) -> usize {
        (self.size_px - self.bar_width_px) / self.step_px + 1
    }

    pub fn n_frames(&self) -> usize {
        self.blank_frames + SWEEPS.len() * (self.sweep_len() + self.blank_frames)
    }

    pub fn build(&self) -> Result<Stimulus, AppError> {
        self.validate()?;

        let n = self.size_px;
        let blank = DMatrix::<f64>::zeros(n, n);
        let mut frames = Vec::with_capacity(self.n_frames());
        frames.extend(std::iter::repeat_n(blank.clone(), self.blank_frames));

        for sweep in SWEEPS {
            for i in 0..self.sweep_len() {
                let offset = i * self.step_px;
                let lo = match sweep {
                    Sweep::LeftToRight | Sweep::TopToBottom => offset,
                    Sweep::RightToLeft | Sweep::BottomToTop => n - offset - self.bar_width_px,
                };
                let hi = lo + self.bar_width_px;

                let mut frame = blank.clone();
                match sweep {
                    Sweep::LeftToRight | Sweep::RightToLeft => {
                        frame.columns_mut(lo, hi - lo).fill(1.0);
                    }
                    Sweep::BottomToTop | Sweep::TopToBottom => {
                        frame.rows_mut(lo, hi - lo).fill(1.0);
                    }
                }
                frames.push(frame);
            }
            frames.extend(std::iter::repeat_n(blank.clone(), self.blank_frames));
        }

        Stimulus::new(frames, self.pixels_per_degree, self.tr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> BarDesign {
        BarDesign {
            size_px: 10,
            pixels_per_degree: 1.0,
            bar_width_px: 2,
            step_px: 2,
            blank_frames: 3,
            tr: 1.0,
        }
    }

    #[test]
    fn frame_count_matches_design() {
        let d = small();
        assert_eq!(d.sweep_len(), 5);
        let s = d.build().unwrap();
        assert_eq!(s.n_frames(), d.n_frames());
        assert_eq!(s.n_frames(), 3 + 4 * (5 + 3));
    }

    #[test]
    fn first_sweep_moves_left_to_right() {
        let s = small().build().unwrap();
        let first = s.frame(3).unwrap();
        assert_eq!(first.column(0).sum(), 10.0);
        assert_eq!(first.column(1).sum(), 10.0);
        assert_eq!(first.column(2).sum(), 0.0);

        let last = s.frame(7).unwrap();
        assert_eq!(last.column(9).sum(), 10.0);
    }

    #[test]
    fn second_sweep_starts_at_the_bottom() {
        let s = small().build().unwrap();
        // 3 blank + 5 sweep + 3 blank
        let f = s.frame(11).unwrap();
        assert_eq!(f.row(9).sum(), 10.0);
        assert_eq!(f.row(0).sum(), 0.0);
    }

    #[test]
    fn every_sweep_frame_shows_a_full_bar() {
        let s = small().build().unwrap();
        let lit: Vec<usize> = (0..s.n_frames()).map(|t| s.active_pixels(t).len()).collect();
        assert_eq!(lit.iter().filter(|&&c| c == 20).count(), 20);
        assert_eq!(lit.iter().filter(|&&c| c == 0).count(), 15);
    }

    #[test]
    fn invalid_geometry_is_rejected() {
        let mut d = small();
        d.bar_width_px = 10;
        assert!(d.build().is_err());
        d.bar_width_px = 2;
        d.step_px = 0;
        assert!(d.build().is_err());
    }
}
