//! Parameter recovery.
//!
//! Responsibilities:
//!
//! - build per-model grids and refinement boxes (`spec`)
//! - enumerate grid candidates in parallel (`grid`)
//! - refine the best candidate inside its bounds (`refine`)
//! - score fits within-sample and on held-out data (`score`)

pub mod fitter;
pub mod grid;
pub mod refine;
pub mod score;
pub mod spec;

pub use fitter::*;
pub use grid::*;
pub use refine::*;
pub use score::*;
pub use spec::*;
