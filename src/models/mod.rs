//! pRF forward models.
//!
//! Models are exposed through the `ResponseModel` trait so fitting code stays
//! generic over the evaluator.

pub mod model;

pub use model::*;
