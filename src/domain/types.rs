//! Shared domain types.
//!
//! These types are intentionally kept small and free of any tabular library so
//! the fitter, the plotter and the exporter only depend on:
//!
//! - the time axis (`&[f64]`)
//! - the peak tables (`PeakTable` / `PeakSet`)
//! - the per-peak fit outputs (`PeakFit`)

use std::path::PathBuf;

use clap::ValueEnum;
use nalgebra::Matrix2;
use serde::{Deserialize, Serialize};

/// Which relaxation law to fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RelaxationModel {
    /// Longitudinal recovery: `c0 * (1 - exp(-t / t1))`.
    T1,
    /// Spin-lock decay: `c0 * exp(-t / t1rho)`.
    #[value(name = "t1rho")]
    T1rho,
    /// Transverse decay: `c0 * exp(-t / t2)`.
    T2,
}

impl RelaxationModel {
    /// Human-readable label for terminal output.
    pub fn display_name(self) -> &'static str {
        match self {
            RelaxationModel::T1 => "T1 recovery",
            RelaxationModel::T1rho => "T1rho decay",
            RelaxationModel::T2 => "T2 decay",
        }
    }

    /// Name of the fitted time constant.
    pub fn tau_name(self) -> &'static str {
        match self {
            RelaxationModel::T1 => "T1",
            RelaxationModel::T1rho => "T1rho",
            RelaxationModel::T2 => "T2",
        }
    }
}

/// One resonance peak: an ordered list of labelled intensity rows.
///
/// Labels may repeat. In pseudo-2D dumps every time point of a peak usually
/// carries the same label (the peak location), so `get(label)` returns the
/// whole buildup curve.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PeakTable {
    name: String,
    keys: Vec<String>,
    values: Vec<f64>,
}

impl PeakTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            keys: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Build a table whose rows all share the label `key`.
    pub fn with_key(name: impl Into<String>, key: &str, values: impl IntoIterator<Item = f64>) -> Self {
        let mut table = Self::new(name);
        for v in values {
            table.push(key, v);
        }
        table
    }

    pub fn push(&mut self, key: impl Into<String>, val: f64) {
        self.keys.push(key.into());
        self.values.push(val);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// All intensities in row order (the `val` column).
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Intensities of every row labelled `key`, in row order.
    pub fn get(&self, key: &str) -> Vec<f64> {
        self.keys
            .iter()
            .zip(self.values.iter())
            .filter(|(k, _)| k.as_str() == key)
            .map(|(_, &v)| v)
            .collect()
    }

    /// Largest intensity, ignoring NaNs. `None` for an empty table.
    pub fn max(&self) -> Option<f64> {
        let max = self
            .values
            .iter()
            .copied()
            .filter(|v| !v.is_nan())
            .fold(f64::NEG_INFINITY, f64::max);
        if max == f64::NEG_INFINITY && self.values.iter().all(|v| v.is_nan()) {
            None
        } else {
            Some(max)
        }
    }

    pub fn rows(&self) -> impl Iterator<Item = (&str, f64)> {
        self.keys.iter().map(String::as_str).zip(self.values.iter().copied())
    }
}

/// Ordered collection of peaks. Order drives subplot placement and slice numbering.
pub type PeakSet = Vec<PeakTable>;

/// Fitted (or seed) parameters of a two-parameter relaxation curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RelaxParams {
    /// Amplitude.
    pub c0: f64,
    /// Time constant (T1, T1rho or T2 depending on the model).
    pub tau: f64,
}

impl RelaxParams {
    pub fn new(c0: f64, tau: f64) -> Self {
        Self { c0, tau }
    }
}

/// Fit output for a single peak.
#[derive(Debug, Clone)]
pub struct PeakFit {
    pub params: RelaxParams,
    /// Parameter covariance, ordered `[c0, tau]`.
    pub covariance: Matrix2<f64>,
    pub sse: f64,
    pub rmse: f64,
    pub iterations: usize,
}

impl PeakFit {
    /// One-sigma uncertainties from the covariance diagonal.
    pub fn std_errors(&self) -> RelaxParams {
        RelaxParams {
            c0: self.covariance[(0, 0)].sqrt(),
            tau: self.covariance[(1, 1)].sqrt(),
        }
    }
}

/// Layout and output settings for the batch plotter.
///
/// Defaults reproduce the classic figure: shared x axes over 0..15 s, a
/// 10 x 20 inch page, nothing written unless asked.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotOptions {
    /// Every panel uses the first panel's x range.
    pub share_x_axis: bool,
    /// Every panel uses one common y range.
    pub share_y_axis: bool,
    /// Figure width and height in inches (rendered at `PIXELS_PER_INCH`).
    pub figure_size: (f64, f64),
    /// Unit appended to the fitted time constant in panel titles.
    pub x_axis_unit_label: String,
    pub x_display_range: (f64, f64),
    /// Range applied to the panels listed in `y_display_range_targets`.
    pub y_display_range: (f64, f64),
    pub y_display_range_targets: Vec<usize>,
    pub write_to_file: bool,
    /// `.svg` selects the SVG backend; anything else is a bitmap.
    pub output_filename: PathBuf,
    /// Also print every panel as an ASCII plot on stdout.
    pub show_in_terminal: bool,
}

/// Bitmap resolution used to turn `figure_size` into pixels.
pub const PIXELS_PER_INCH: f64 = 100.0;

impl Default for PlotOptions {
    fn default() -> Self {
        Self {
            share_x_axis: true,
            share_y_axis: false,
            figure_size: (10.0, 20.0),
            x_axis_unit_label: "s".to_string(),
            x_display_range: (0.0, 15.0),
            y_display_range: (0.0, 60000.0),
            y_display_range_targets: Vec::new(),
            write_to_file: false,
            output_filename: PathBuf::from("demo.png"),
            show_in_terminal: false,
        }
    }
}

impl PlotOptions {
    /// Figure size in pixels, never smaller than 100 x 100.
    pub fn pixel_size(&self) -> (u32, u32) {
        let to_px = |inches: f64| {
            let px = (inches * PIXELS_PER_INCH).round();
            if px.is_finite() { px.max(100.0) as u32 } else { 100 }
        };
        (to_px(self.figure_size.0), to_px(self.figure_size.1))
    }
}
