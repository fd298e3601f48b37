//! Mathematical utilities: HRF convolution, summary statistics and least squares.

pub mod hrf;
pub mod ols;
pub mod stats;

pub use hrf::*;
pub use ols::*;
pub use stats::*;
