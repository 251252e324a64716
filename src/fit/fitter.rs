//! Batch fitting of relaxation curves.
//!
//! Given:
//! - a time axis `t_i` shared by every peak
//! - a peak set, each peak holding one intensity per time point
//! - a two-parameter curve model
//!
//! we run, for each peak independently:
//! - seed `[max(intensity), 1.0]`
//! - a Levenberg–Marquardt minimisation of the squared residuals
//!
//! and return one `PeakFit` per peak, in peak order.

use log::{debug, info, warn};
use nalgebra::Vector2;
use rayon::prelude::*;

use crate::domain::{PeakFit, PeakTable, RelaxParams};
use crate::error::AppError;
use crate::math::{SolverOptions, levenberg_marquardt};
use crate::models::CurveModel;

/// Seed for the time constant, in time-axis units.
pub const DEFAULT_TAU_GUESS: f64 = 1.0;

/// Trial points with `tau` at or below this are never evaluated. The seed is
/// positive, so the search never crosses to a negative time constant.
const TAU_FLOOR: f64 = 1e-12;

/// Fits with `tau` above this multiple of the largest time point get a warning.
const IMPLAUSIBLE_TAU_FACTOR: f64 = 100.0;

/// Fit every peak with the default solver settings.
pub fn fit_all<M>(model: &M, time_axis: &[f64], peaks: &[PeakTable]) -> Result<Vec<PeakFit>, AppError>
where
    M: CurveModel + Sync + ?Sized,
{
    fit_all_with(model, time_axis, peaks, &SolverOptions::default())
}

/// Fit every peak independently and return the results in peak order.
///
/// Shape checks run first, in order, so a length mismatch is always reported
/// for the first offending peak. Fits then run in parallel; if several fail,
/// the error of the lowest peak index is returned.
pub fn fit_all_with<M>(
    model: &M,
    time_axis: &[f64],
    peaks: &[PeakTable],
    opts: &SolverOptions,
) -> Result<Vec<PeakFit>, AppError>
where
    M: CurveModel + Sync + ?Sized,
{
    if time_axis.is_empty() {
        return Err(AppError::invalid("Time axis is empty."));
    }
    for (idx, peak) in peaks.iter().enumerate() {
        if peak.len() != time_axis.len() {
            return Err(AppError::ShapeMismatch {
                peak: idx,
                expected: time_axis.len(),
                actual: peak.len(),
            });
        }
    }

    let results: Vec<Result<PeakFit, AppError>> = peaks
        .par_iter()
        .enumerate()
        .map(|(idx, peak)| fit_peak(model, time_axis, peak, idx, opts))
        .collect();
    let fits = results.into_iter().collect::<Result<Vec<_>, _>>()?;

    info!("Fitted {} peak(s) over {} time points.", fits.len(), time_axis.len());
    Ok(fits)
}

/// Seed used for a peak: its own maximum intensity and `DEFAULT_TAU_GUESS`.
pub fn initial_guess(peak: &PeakTable) -> Option<RelaxParams> {
    peak.max().map(|c0| RelaxParams::new(c0, DEFAULT_TAU_GUESS))
}

/// Fit a single peak. `idx` is only used to label errors and logs.
pub fn fit_peak<M>(
    model: &M,
    time_axis: &[f64],
    peak: &PeakTable,
    idx: usize,
    opts: &SolverOptions,
) -> Result<PeakFit, AppError>
where
    M: CurveModel + ?Sized,
{
    let non_convergence = |reason: String| AppError::NonConvergence { peak: idx, reason };

    let y = peak.values();
    if let Some(bad) = y.iter().position(|v| !v.is_finite()) {
        return Err(non_convergence(format!("non-finite intensity at row {bad}")));
    }
    if let Some(bad) = time_axis.iter().position(|t| !t.is_finite()) {
        return Err(non_convergence(format!("non-finite time at row {bad}")));
    }
    let seed = initial_guess(peak).ok_or_else(|| non_convergence("peak has no intensities".to_string()))?;
    debug!("peak {idx} ({}): seed c0={:.6} {}={:.6}", peak.name(), seed.c0, model.tau_name(), seed.tau);

    let point = |p: &Vector2<f64>, i: usize| {
        if !(p[1] > TAU_FLOOR) {
            return None;
        }
        let params = RelaxParams::new(p[0], p[1]);
        let t = time_axis[i];
        let [d_c0, d_tau] = model.gradient(t, params);
        Some((y[i] - model.eval(t, params), Vector2::new(d_c0, d_tau)))
    };

    let solution = levenberg_marquardt(y.len(), Vector2::new(seed.c0, seed.tau), point, opts)
        .map_err(|e| non_convergence(e.to_string()))?;

    let params = RelaxParams::new(solution.params[0], solution.params[1]);
    let rmse = (solution.sse / y.len() as f64).sqrt();
    debug!(
        "peak {idx} ({}): c0={:.6} {}={:.6} rmse={:.6} after {} iteration(s)",
        peak.name(),
        params.c0,
        model.tau_name(),
        params.tau,
        rmse,
        solution.iterations
    );
    let span = time_axis.iter().fold(0.0f64, |acc, t| acc.max(t.abs()));
    if span > 0.0 && params.tau > IMPLAUSIBLE_TAU_FACTOR * span {
        warn!(
            "peak {idx} ({}): fitted {}={} is far beyond the sampled span ({span})",
            peak.name(),
            model.tau_name(),
            params.tau
        );
    }

    Ok(PeakFit {
        params,
        covariance: solution.covariance,
        sse: solution.sse,
        rmse,
        iterations: solution.iterations,
    })
}
