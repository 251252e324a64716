//! Plotters-powered multi-panel figure.
//!
//! The figure is split into a `rows x 2` grid; each cell gets a chart with the
//! fitted curve as a line and the observed intensities as markers. An odd panel
//! count leaves the last cell blank.
//!
//! The backend is chosen from the output extension: `.svg` uses `SVGBackend`,
//! everything else goes through `BitMapBackend` (PNG, JPEG, BMP by extension).

use plotters::coord::Shift;
use plotters::prelude::*;

use crate::domain::PlotOptions;
use crate::error::AppError;
use crate::plot::{GRID_COLUMNS, Panel, grid_rows};

/// Matplotlib's default line and marker colours, so figures look familiar.
const CURVE_COLOR: RGBColor = RGBColor(31, 119, 180);
const POINT_COLOR: RGBColor = RGBColor(255, 127, 14);

/// Render `panels` and write the figure to `opts.output_filename`.
pub fn write_figure(panels: &[Panel], opts: &PlotOptions) -> Result<(), AppError> {
    let path = opts.output_filename.as_path();
    let size = opts.pixel_size();
    let is_svg = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("svg"));

    if is_svg {
        let root = SVGBackend::new(path, size).into_drawing_area();
        draw_panels(&root, panels)?;
        root.present()?;
    } else {
        let root = BitMapBackend::new(path, size).into_drawing_area();
        draw_panels(&root, panels)?;
        root.present()?;
    }
    Ok(())
}

/// Draw every panel into its grid cell of `root`.
pub fn draw_panels<DB>(root: &DrawingArea<DB, Shift>, panels: &[Panel]) -> Result<(), AppError>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    root.fill(&WHITE)?;
    let cells = root.split_evenly((grid_rows(panels.len()).max(1), GRID_COLUMNS));
    for panel in panels {
        let cell = cells
            .get(panel.row * GRID_COLUMNS + panel.col)
            .ok_or_else(|| AppError::Plot(format!("no grid cell for panel {}", panel.index)))?;
        draw_panel(cell, panel)?;
    }
    Ok(())
}

fn draw_panel<DB>(area: &DrawingArea<DB, Shift>, panel: &Panel) -> Result<(), AppError>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let (x0, x1) = panel.x_range;
    let (y0, y1) = panel.y_range;

    let mut chart = ChartBuilder::on(area)
        .caption(&panel.title, ("sans-serif", 18))
        .margin(10)
        .x_label_area_size(30)
        .y_label_area_size(60)
        .build_cartesian_2d(x0..x1, y0..y1)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .disable_y_mesh()
        .x_labels(6)
        .y_labels(6)
        .draw()?;

    // Plotters does not clip series to the chart area; draw only the visible runs.
    for run in clip_curve(&panel.curve, panel.x_range, panel.y_range) {
        chart.draw_series(LineSeries::new(run, &CURVE_COLOR))?;
    }

    chart.draw_series(
        panel
            .points
            .iter()
            .filter(|&&(x, y)| within(x, panel.x_range) && within(y, panel.y_range))
            .map(|&(x, y)| Circle::new((x, y), 3, POINT_COLOR.filled())),
    )?;

    Ok(())
}

/// Clip the polyline to the chart rectangle.
///
/// Each segment is cut at the rectangle edges, so a curve leaving the chart
/// ends at the boundary crossing instead of running along the edge. The result
/// is one polyline per visible run; non-finite samples also break a run.
fn clip_curve(curve: &[(f64, f64)], x_range: (f64, f64), y_range: (f64, f64)) -> Vec<Vec<(f64, f64)>> {
    let mut runs = Vec::new();
    let mut current: Vec<(f64, f64)> = Vec::new();
    for pair in curve.windows(2) {
        match clip_segment(pair[0], pair[1], x_range, y_range) {
            Some((from, to)) => {
                if current.last() != Some(&from) {
                    flush_run(&mut runs, &mut current);
                    current.push(from);
                }
                current.push(to);
            }
            None => flush_run(&mut runs, &mut current),
        }
    }
    flush_run(&mut runs, &mut current);
    runs
}

fn flush_run(runs: &mut Vec<Vec<(f64, f64)>>, current: &mut Vec<(f64, f64)>) {
    let run = std::mem::take(current);
    if run.len() >= 2 {
        runs.push(run);
    }
}

/// Liang–Barsky clip of the segment `a -> b`; `None` when nothing is visible.
fn clip_segment(
    a: (f64, f64),
    b: (f64, f64),
    (x0, x1): (f64, f64),
    (y0, y1): (f64, f64),
) -> Option<((f64, f64), (f64, f64))> {
    if ![a.0, a.1, b.0, b.1].iter().all(|v| v.is_finite()) {
        return None;
    }
    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let (mut t0, mut t1) = (0.0f64, 1.0f64);
    for (p, q) in [(-dx, a.0 - x0), (dx, x1 - a.0), (-dy, a.1 - y0), (dy, y1 - a.1)] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
        } else if p < 0.0 {
            t0 = t0.max(q / p);
        } else {
            t1 = t1.min(q / p);
        }
        if t0 > t1 {
            return None;
        }
    }
    let at = |t: f64| {
        if t <= 0.0 {
            a
        } else if t >= 1.0 {
            b
        } else {
            (a.0 + t * dx, a.1 + t * dy)
        }
    };
    Some((at(t0), at(t1)))
}

fn within(v: f64, (lo, hi): (f64, f64)) -> bool {
    (lo..=hi).contains(&v)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn panel(index: usize) -> Panel {
        let (row, col) = crate::plot::grid_position(index);
        Panel {
            index,
            row,
            col,
            title: format!("{index}.5 s"),
            curve: (0..20).map(|i| (i as f64 * 0.5, 100.0 * (-(i as f64) * 0.25).exp())).collect(),
            points: vec![(0.0, 98.0), (2.0, 61.0), (4.0, 36.0), (30.0, 1.0)],
            x_range: (0.0, 8.0),
            y_range: (0.0, 110.0),
        }
    }

    #[test]
    fn clip_curve_cuts_segments_at_the_chart_edges() {
        let curve = vec![(-0.1, 120.0), (1.0, 50.0), (9.0, 1.0), (2.0, f64::NAN)];
        let runs = clip_curve(&curve, (0.0, 8.0), (0.0, 110.0));
        assert_eq!(runs.len(), 1);
        let run = &runs[0];
        assert_eq!(run.len(), 3);
        assert!((run[0].1 - 110.0).abs() < 1e-9 && run[0].0 > 0.0 && run[0].0 < 1.0, "{run:?}");
        assert_eq!(run[1], (1.0, 50.0));
        assert!((run[2].0 - 8.0).abs() < 1e-9 && (run[2].1 - 7.125).abs() < 1e-9, "{run:?}");
    }

    #[test]
    fn curve_above_the_range_is_not_drawn_along_the_edge() {
        let curve: Vec<(f64, f64)> = (0..50)
            .map(|i| {
                let x = 5.0 * i as f64 / 49.0;
                (x, 50000.0 * (-x / 2.0).exp())
            })
            .collect();

        // The whole curve lies above 500, so nothing is visible.
        assert!(clip_curve(&curve, (0.0, 5.0), (0.0, 500.0)).is_empty());

        // With a taller range the curve enters through the top edge once.
        let runs = clip_curve(&curve, (0.0, 5.0), (0.0, 20000.0));
        assert_eq!(runs.len(), 1);
        let crossing = 2.0 * 2.5f64.ln();
        assert!((runs[0][0].1 - 20000.0).abs() < 1e-6);
        assert!((runs[0][0].0 - crossing).abs() < 0.05, "{:?}", runs[0][0]);
        assert!(runs[0][1..].iter().all(|&(_, y)| y < 20000.0));
    }

    #[test]
    fn non_finite_samples_split_the_curve() {
        let curve = vec![(0.0, 1.0), (1.0, 2.0), (2.0, f64::NAN), (3.0, 2.0), (4.0, 1.0)];
        let runs = clip_curve(&curve, (0.0, 5.0), (0.0, 5.0));
        assert_eq!(runs, vec![vec![(0.0, 1.0), (1.0, 2.0)], vec![(3.0, 2.0), (4.0, 1.0)]]);
    }

    #[test]
    fn writes_an_svg_grid_with_a_blank_cell() {
        let path = std::env::temp_dir().join(format!("relax_curves_figure_{}.svg", std::process::id()));
        let opts = PlotOptions {
            figure_size: (6.0, 6.0),
            write_to_file: true,
            output_filename: path.clone(),
            ..PlotOptions::default()
        };
        let panels: Vec<Panel> = (0..3).map(panel).collect();

        match write_figure(&panels, &opts) {
            Ok(()) => {
                let svg = std::fs::read_to_string(&path).unwrap();
                assert!(svg.contains("<svg"));
                assert!(svg.contains("2.5 s"));
            }
            // Hosts without any system font cannot lay out the captions.
            Err(AppError::Plot(msg)) => eprintln!("skipping figure check: {msg}"),
            Err(other) => panic!("unexpected error: {other}"),
        }
        let _ = std::fs::remove_file(&path);
    }
}
