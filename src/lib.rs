//! `prf-fit` library crate.
//!
//! Population receptive field (pRF) simulation and parameter recovery:
//! Gaussian and Difference-of-Gaussians forward models, additive noise,
//! a two-stage fitter (grid search, then bounded refinement) and
//! within-sample plus cross-validated R².
//!
//! The binary (`prf`) is a thin wrapper around this library so that the
//! experiments are testable without spawning processes.

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod report;
pub mod stimulus;
