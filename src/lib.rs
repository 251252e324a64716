//! `relax-curves` library crate.
//!
//! Fits T1 / T1rho / T2 relaxation curves to per-peak intensity series, plots
//! them on a two-column panel grid, and exports selected peak slices.
//!
//! The binary (`relax`) is a thin wrapper around this library so that core
//! logic is testable without spawning processes.

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod plot;
pub mod report;

pub use domain::{PeakFit, PeakSet, PeakTable, PlotOptions, RelaxParams, RelaxationModel};
pub use error::AppError;
pub use fit::fit_all;
pub use io::export_slices;
pub use plot::plot_all;
