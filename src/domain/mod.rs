//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the closed model set (`ModelKind`) and its parameter vectors (`PrfParams`)
//! - parameter intervals (`Bound`)
//! - the run configuration (`ExperimentConfig`)

pub mod types;

pub use types::*;
