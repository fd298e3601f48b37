//! Stimulus apertures.
//!
//! - `Stimulus`: the immutable width × height × time aperture shared by every
//!   model evaluation
//! - `BarDesign`: builder for the classic moving-bar sweep

pub mod bar;
pub mod design;

pub use bar::*;
pub use design::*;
