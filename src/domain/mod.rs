//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the relaxation law selector (`RelaxationModel`)
//! - peak tables and peak sets (`PeakTable`, `PeakSet`)
//! - fit outputs (`RelaxParams`, `PeakFit`)
//! - plot configuration (`PlotOptions`)

pub mod types;

pub use types::*;
