//! Curve fitting orchestration.
//!
//! Responsibilities:
//!
//! - validate the time axis against every peak
//! - seed and fit each peak independently (parallel)
//! - reassemble results in peak order

pub mod fitter;

pub use fitter::*;
