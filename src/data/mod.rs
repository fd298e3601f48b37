//! Synthetic data generation.

pub mod noise;

pub use noise::*;
