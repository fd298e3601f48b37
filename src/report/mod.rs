//! Reporting utilities: formatted terminal output for runs, sweeps and comparisons.

pub mod format;

pub use format::*;
