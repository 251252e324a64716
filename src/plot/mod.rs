//! Batch plotting of fitted relaxation curves.
//!
//! Panel geometry, ranges and titles are computed up front into plain `Panel`
//! values; the renderers only draw them:
//!
//! - `figure`: Plotters PNG/SVG figure on a 2-column grid
//! - `ascii`: fixed-size terminal plot, one per panel

use log::info;

use crate::domain::{PeakFit, PeakTable, PlotOptions};
use crate::error::AppError;
use crate::models::{CurveModel, sample_curve};

pub mod ascii;
pub mod figure;

/// Panels per figure row.
pub const GRID_COLUMNS: usize = 2;

/// Number of samples along each fitted curve.
const CURVE_SAMPLES: usize = 50;

/// The fitted curve extends this far below the display minimum ...
const CURVE_PAD_LOW: f64 = 0.1;
/// ... and this far above the display maximum.
const CURVE_PAD_HIGH: f64 = 0.5;

/// Headroom factor applied to the fitted curve's extremes.
const Y_HEADROOM: f64 = 1.1;

/// Everything needed to draw one peak's subplot.
#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    pub index: usize,
    pub row: usize,
    pub col: usize,
    pub title: String,
    pub curve: Vec<(f64, f64)>,
    pub points: Vec<(f64, f64)>,
    pub x_range: (f64, f64),
    pub y_range: (f64, f64),
}

/// Rows needed to hold `n` panels on the 2-column grid.
pub fn grid_rows(n: usize) -> usize {
    n.div_ceil(GRID_COLUMNS)
}

/// `(row, col)` of panel `i`.
pub fn grid_position(i: usize) -> (usize, usize) {
    (i / GRID_COLUMNS, i % GRID_COLUMNS)
}

/// Default y range for a fitted curve.
///
/// The curve's own extremes are widened to include zero and then scaled by
/// 1.1, so the baseline stays in view for a decay that levels off above zero.
/// A degenerate range is widened by 1 on each side.
pub fn auto_y_range(curve: &[(f64, f64)]) -> (f64, f64) {
    let (lo, hi) = finite_extent(curve.iter().map(|&(_, y)| y)).unwrap_or((0.0, 1.0));
    let lo = lo.min(0.0) * Y_HEADROOM;
    let hi = hi.max(0.0) * Y_HEADROOM;
    if hi - lo > f64::EPSILON * hi.abs().max(1.0) {
        (lo, hi)
    } else {
        (lo - 1.0, hi + 1.0)
    }
}

/// Plot every peak with its fitted curve.
///
/// Prints ASCII panels when `show_in_terminal` is set and writes the figure
/// when `write_to_file` is set. With neither set this only validates inputs.
pub fn plot_all<M>(
    model: &M,
    time_axis: &[f64],
    peaks: &[PeakTable],
    fits: &[PeakFit],
    opts: &PlotOptions,
) -> Result<(), AppError>
where
    M: CurveModel + ?Sized,
{
    let panels = build_panels(model, time_axis, peaks, fits, opts)?;

    if opts.show_in_terminal {
        for panel in &panels {
            println!("{}", ascii::render_panel(panel, ascii::DEFAULT_WIDTH, ascii::DEFAULT_HEIGHT));
        }
    }

    if opts.write_to_file {
        figure::write_figure(&panels, opts)?;
        info!(
            "Wrote {} panel(s) to '{}'.",
            panels.len(),
            opts.output_filename.display()
        );
    }

    Ok(())
}

/// Compute titles, samples and ranges for every panel.
pub fn build_panels<M>(
    model: &M,
    time_axis: &[f64],
    peaks: &[PeakTable],
    fits: &[PeakFit],
    opts: &PlotOptions,
) -> Result<Vec<Panel>, AppError>
where
    M: CurveModel + ?Sized,
{
    if peaks.len() != fits.len() {
        return Err(AppError::invalid(format!(
            "Got {} peak(s) but {} fit result(s).",
            peaks.len(),
            fits.len()
        )));
    }
    if peaks.is_empty() {
        return Err(AppError::invalid("No peaks to plot."));
    }
    let (x_min, x_max) = opts.x_display_range;
    if !valid_range(opts.x_display_range) {
        return Err(AppError::invalid(format!("Invalid x display range: {x_min}..{x_max}.")));
    }
    if !opts.y_display_range_targets.is_empty() && !valid_range(opts.y_display_range) {
        let (lo, hi) = opts.y_display_range;
        return Err(AppError::invalid(format!("Invalid y display range: {lo}..{hi}.")));
    }

    let mut panels: Vec<Panel> = peaks
        .iter()
        .zip(fits.iter())
        .enumerate()
        .map(|(index, (peak, fit))| {
            let curve = sample_curve(
                model,
                fit.params,
                x_min - CURVE_PAD_LOW,
                x_max + CURVE_PAD_HIGH,
                CURVE_SAMPLES,
            );
            let points: Vec<(f64, f64)> = time_axis
                .iter()
                .copied()
                .zip(peak.values().iter().copied())
                .collect();

            let x_range = if opts.share_x_axis || index == 0 {
                opts.x_display_range
            } else {
                unshared_x_range(&curve, &points)
            };
            let y_range = if opts.y_display_range_targets.contains(&index) {
                opts.y_display_range
            } else {
                auto_y_range(&curve)
            };
            let (row, col) = grid_position(index);

            Panel {
                index,
                row,
                col,
                title: format!("{} {}", fit.params.tau, opts.x_axis_unit_label),
                curve,
                points,
                x_range,
                y_range,
            }
        })
        .collect();

    if opts.share_y_axis {
        let common = if opts.y_display_range_targets.is_empty() {
            panels
                .iter()
                .map(|p| p.y_range)
                .reduce(|a, b| (a.0.min(b.0), a.1.max(b.1)))
                .unwrap_or((0.0, 1.0))
        } else {
            opts.y_display_range
        };
        for panel in &mut panels {
            panel.y_range = common;
        }
    }

    Ok(panels)
}

fn unshared_x_range(curve: &[(f64, f64)], points: &[(f64, f64)]) -> (f64, f64) {
    let xs = curve.iter().chain(points.iter()).map(|&(x, _)| x);
    match finite_extent(xs) {
        Some((lo, hi)) if hi > lo => (lo, hi),
        Some((lo, _)) => (lo - 1.0, lo + 1.0),
        None => (0.0, 1.0),
    }
}

fn valid_range((lo, hi): (f64, f64)) -> bool {
    lo.is_finite() && hi.is_finite() && hi > lo
}

fn finite_extent(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for v in values.filter(|v| v.is_finite()) {
        lo = lo.min(v);
        hi = hi.max(v);
    }
    (lo <= hi).then_some((lo, hi))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RelaxParams, RelaxationModel};
    use nalgebra::Matrix2;

    fn fit(c0: f64, tau: f64) -> PeakFit {
        PeakFit {
            params: RelaxParams::new(c0, tau),
            covariance: Matrix2::zeros(),
            sse: 0.0,
            rmse: 0.0,
            iterations: 1,
        }
    }

    fn peaks(n: usize) -> (Vec<f64>, Vec<PeakTable>, Vec<PeakFit>) {
        let t = vec![0.0, 1.0, 2.0, 4.0];
        let tables = (0..n)
            .map(|i| PeakTable::with_key(format!("p{i}"), "k", [100.0, 60.0, 37.0, 13.0]))
            .collect();
        let fits = (0..n).map(|i| fit(100.0 * (i + 1) as f64, 2.0)).collect();
        (t, tables, fits)
    }

    #[test]
    fn grid_rows_round_up() {
        assert_eq!(grid_rows(1), 1);
        assert_eq!(grid_rows(2), 1);
        assert_eq!(grid_rows(3), 2);
        assert_eq!(grid_rows(5), 3);
        assert_eq!(grid_position(4), (2, 0));
        assert_eq!(grid_position(3), (1, 1));
    }

    #[test]
    fn auto_range_keeps_the_zero_baseline() {
        // A curve that never approaches zero still gets a zero lower bound.
        let (lo, hi) = auto_y_range(&[(0.0, 900.0), (1.0, 700.0), (2.0, 600.0)]);
        assert_eq!(lo, 0.0);
        assert!((hi - 990.0).abs() < 1e-9);

        // Non-finite samples are ignored.
        let (lo, hi) = auto_y_range(&[(0.0, f64::NAN), (1.0, 10.0)]);
        assert_eq!(lo, 0.0);
        assert!((hi - 11.0).abs() < 1e-9);
    }

    #[test]
    fn auto_range_scales_curve_extremes() {
        let (lo, hi) = auto_y_range(&[(0.0, 1000.0), (1.0, 400.0)]);
        assert_eq!(lo, 0.0);
        assert!((hi - 1100.0).abs() < 1e-9);

        let (lo, hi) = auto_y_range(&[(0.0, -50.0), (1.0, 20.0)]);
        assert!((lo + 55.0).abs() < 1e-9);
        assert!((hi - 22.0).abs() < 1e-9);

        assert_eq!(auto_y_range(&[(0.0, 0.0)]), (-1.0, 1.0));
    }

    #[test]
    fn panels_follow_layout_and_titles() {
        let (t, tables, fits) = peaks(3);
        let opts = PlotOptions::default();
        let panels = build_panels(&RelaxationModel::T2, &t, &tables, &fits, &opts).unwrap();

        assert_eq!(panels.len(), 3);
        assert_eq!((panels[2].row, panels[2].col), (1, 0));
        assert_eq!(panels[0].title, "2 s");
        assert_eq!(panels[1].curve.len(), 50);
        assert!((panels[1].curve[0].0 + 0.1).abs() < 1e-12);
        assert!((panels[1].curve[49].0 - 15.5).abs() < 1e-12);
        assert_eq!(panels[1].points, vec![(0.0, 100.0), (1.0, 60.0), (2.0, 37.0), (4.0, 13.0)]);
        assert!(panels.iter().all(|p| p.x_range == (0.0, 15.0)));
        // The curve starts at t = -0.1, so its maximum sits slightly above c0 = 200.
        let expected = 200.0 * (0.1f64 / 2.0).exp() * 1.1;
        assert!((panels[1].y_range.1 - expected).abs() < 1e-6);
    }

    #[test]
    fn y_override_only_hits_targets() {
        let (t, tables, fits) = peaks(3);
        let opts = PlotOptions {
            y_display_range: (0.0, 500.0),
            y_display_range_targets: vec![1],
            ..PlotOptions::default()
        };
        let panels = build_panels(&RelaxationModel::T2, &t, &tables, &fits, &opts).unwrap();
        assert_ne!(panels[0].y_range, (0.0, 500.0));
        assert_eq!(panels[1].y_range, (0.0, 500.0));
        assert_ne!(panels[2].y_range, (0.0, 500.0));
    }

    #[test]
    fn shared_y_uses_union_of_auto_ranges() {
        let (t, tables, fits) = peaks(2);
        let opts = PlotOptions {
            share_y_axis: true,
            ..PlotOptions::default()
        };
        let panels = build_panels(&RelaxationModel::T2, &t, &tables, &fits, &opts).unwrap();
        assert_eq!(panels[0].y_range, panels[1].y_range);
        let expected = 200.0 * (0.1f64 / 2.0).exp() * 1.1;
        assert!((panels[0].y_range.1 - expected).abs() < 1e-6);
    }

    #[test]
    fn unshared_x_only_pins_the_first_panel() {
        let (t, tables, fits) = peaks(2);
        let opts = PlotOptions {
            share_x_axis: false,
            x_display_range: (0.0, 3.0),
            ..PlotOptions::default()
        };
        let panels = build_panels(&RelaxationModel::T2, &t, &tables, &fits, &opts).unwrap();
        assert_eq!(panels[0].x_range, (0.0, 3.0));
        // Observed points reach t = 4, past the padded curve end at 3.5.
        assert!((panels[1].x_range.0 + 0.1).abs() < 1e-12);
        assert_eq!(panels[1].x_range.1, 4.0);
    }

    #[test]
    fn mismatched_fit_count_is_rejected() {
        let (t, tables, mut fits) = peaks(2);
        fits.pop();
        let err = build_panels(&RelaxationModel::T2, &t, &tables, &fits, &PlotOptions::default()).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[test]
    fn plot_all_without_outputs_only_validates() {
        let (t, tables, fits) = peaks(1);
        plot_all(&RelaxationModel::T1, &t, &tables, &fits, &PlotOptions::default()).unwrap();
    }
}
