//! Input/output helpers.
//!
//! - CSV exports of series and sweeps (`export`)
//! - JSON reports of single fits and model comparisons (`report`)

pub mod export;
pub mod report;

pub use export::*;
pub use report::*;
