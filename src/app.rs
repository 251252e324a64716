//! Top-level application orchestration.
//!
//! `src/main.rs` stays tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - loads the time axis and peaks
//! - runs the batch fit
//! - prints the summary and plots
//! - writes optional exports

use clap::Parser;
use log::info;

use crate::cli::{Cli, Command, DemoArgs, ExportArgs, FitArgs};
use crate::data::SampleConfig;
use crate::domain::PlotOptions;
use crate::error::AppError;
use crate::math::SolverOptions;

/// Entry point for the `relax` binary.
pub fn run() -> Result<(), AppError> {
    let cli = Cli::parse();

    match cli.command {
        Command::Fit(args) => handle_fit(&args),
        Command::Export(args) => handle_export(&args),
        Command::Demo(args) => handle_demo(&args),
    }
}

fn handle_fit(args: &FitArgs) -> Result<(), AppError> {
    let plot_opts = plot_options_from_args(args)?;
    let solver = solver_options_from_args(args)?;

    let time_axis = crate::io::load_time_axis(&args.input.times)?;
    let peaks = crate::io::load_peaks(&args.input.peaks)?;

    let fits = crate::fit::fit_all_with(&args.model, &time_axis, &peaks, &solver)?;
    println!("{}", crate::report::format_fit_summary(args.model, &peaks, &fits));

    if plot_opts.write_to_file || plot_opts.show_in_terminal {
        crate::plot::plot_all(&args.model, &time_axis, &peaks, &fits, &plot_opts)?;
    }
    if let Some(path) = &args.summary {
        crate::io::write_fit_csv(path, args.model, &peaks, &fits)?;
        info!("Wrote fit summary to '{}'.", path.display());
    }

    Ok(())
}

fn handle_export(args: &ExportArgs) -> Result<(), AppError> {
    let time_axis = crate::io::load_time_axis(&args.input.times)?;
    let peaks = crate::io::load_peaks(&args.input.peaks)?;
    crate::io::export_slices(&args.selection, &time_axis, &peaks, &args.out)
}

fn handle_demo(args: &DemoArgs) -> Result<(), AppError> {
    let config = sample_config_from_args(args);
    let (time_axis, peaks) = crate::data::generate_peaks(&config)?;

    std::fs::create_dir_all(&args.out_dir).map_err(|e| AppError::io(&args.out_dir, e))?;
    let times_path = args.out_dir.join("times.csv");
    let peaks_path = args.out_dir.join("peaks.csv");
    crate::data::write_time_csv(&times_path, &time_axis)?;
    crate::data::write_peaks_csv(&peaks_path, &peaks)?;

    println!(
        "Wrote {} {} peak(s) x {} point(s): {} {}",
        peaks.len(),
        config.model.tau_name(),
        time_axis.len(),
        times_path.display(),
        peaks_path.display()
    );
    Ok(())
}

/// Build plot options from `fit` arguments, starting from the defaults.
pub fn plot_options_from_args(args: &FitArgs) -> Result<PlotOptions, AppError> {
    let defaults = PlotOptions::default();

    if !(args.width.is_finite() && args.height.is_finite() && args.width > 0.0 && args.height > 0.0) {
        return Err(AppError::invalid("Figure width and height must be positive."));
    }
    if !args.y_range_panels.is_empty() && args.y_range.is_none() {
        return Err(AppError::invalid("`--y-range-panel` needs `--y-range`."));
    }

    Ok(PlotOptions {
        share_x_axis: !args.no_share_x,
        share_y_axis: args.share_y,
        figure_size: (args.width, args.height),
        x_axis_unit_label: args.unit.clone(),
        x_display_range: pair(args.x_range.as_deref()).unwrap_or(defaults.x_display_range),
        y_display_range: pair(args.y_range.as_deref()).unwrap_or(defaults.y_display_range),
        y_display_range_targets: args.y_range_panels.clone(),
        write_to_file: args.figure.is_some(),
        output_filename: args.figure.clone().unwrap_or(defaults.output_filename),
        show_in_terminal: args.show,
    })
}

pub fn solver_options_from_args(args: &FitArgs) -> Result<SolverOptions, AppError> {
    if args.max_iter == 0 {
        return Err(AppError::invalid("`--max-iter` must be > 0."));
    }
    Ok(SolverOptions {
        max_iterations: args.max_iter,
        ..SolverOptions::default()
    })
}

pub fn sample_config_from_args(args: &DemoArgs) -> SampleConfig {
    SampleConfig {
        model: args.model,
        n_peaks: args.n_peaks,
        n_points: args.n_points,
        t_max: args.t_max,
        noise_frac: args.noise,
        seed: args.seed,
        ..SampleConfig::default()
    }
}

fn pair(values: Option<&[f64]>) -> Option<(f64, f64)> {
    match values {
        Some(&[lo, hi]) => Some((lo, hi)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fit_args(extra: &[&str]) -> FitArgs {
        let mut argv = vec!["relax", "fit", "--model", "t2", "--times", "t.csv", "--peaks", "p.csv"];
        argv.extend_from_slice(extra);
        match Cli::try_parse_from(argv).unwrap().command {
            Command::Fit(args) => args,
            other => panic!("expected fit, got {other:?}"),
        }
    }

    #[test]
    fn defaults_match_plot_options_default() {
        let opts = plot_options_from_args(&fit_args(&[])).unwrap();
        assert_eq!(opts, PlotOptions::default());
    }

    #[test]
    fn flags_map_onto_plot_options() {
        let opts = plot_options_from_args(&fit_args(&[
            "--figure", "out.svg", "--no-share-x", "--unit", "ms", "--x-range", "0", "3", "--y-range", "-5",
            "50", "--y-range-panel", "1", "--show",
        ]))
        .unwrap();
        assert!(opts.write_to_file);
        assert!(opts.show_in_terminal);
        assert!(!opts.share_x_axis);
        assert_eq!(opts.output_filename, std::path::PathBuf::from("out.svg"));
        assert_eq!(opts.x_axis_unit_label, "ms");
        assert_eq!(opts.x_display_range, (0.0, 3.0));
        assert_eq!(opts.y_display_range, (-5.0, 50.0));
        assert_eq!(opts.y_display_range_targets, vec![1]);
    }

    #[test]
    fn y_range_panels_need_a_range() {
        let err = plot_options_from_args(&fit_args(&["--y-range-panel", "0"])).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn zero_iterations_are_rejected() {
        assert!(solver_options_from_args(&fit_args(&["--max-iter", "0"])).is_err());
        assert_eq!(solver_options_from_args(&fit_args(&[])).unwrap().max_iterations, 200);
    }
}
