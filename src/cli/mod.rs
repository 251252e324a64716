//! Command-line parsing for the relaxation curve fitter.
//!
//! Argument parsing and command dispatch stay separate from the fitting and
//! plotting code; `app` turns these structs into library configuration.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::domain::RelaxationModel;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "relax", version, about = "T1 / T1rho / T2 relaxation curve fitter")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit every peak, print the summary table, and optionally plot/export.
    Fit(FitArgs),
    /// Write selected peak slices to a text report.
    Export(ExportArgs),
    /// Generate a synthetic time axis and peak set.
    Demo(DemoArgs),
}

/// Input files shared by `fit` and `export`.
#[derive(Debug, Parser, Clone)]
pub struct InputArgs {
    /// Time axis CSV (one value per row, optionally under a `time` header).
    #[arg(long, value_name = "CSV")]
    pub times: PathBuf,

    /// Peak CSV in long `peak,key,val` format.
    #[arg(long, value_name = "CSV")]
    pub peaks: PathBuf,
}

#[derive(Debug, Parser, Clone)]
pub struct FitArgs {
    /// Relaxation law to fit.
    #[arg(short = 'm', long, value_enum)]
    pub model: RelaxationModel,

    #[command(flatten)]
    pub input: InputArgs,

    /// Write the figure to this file (`.svg` for SVG, otherwise PNG).
    #[arg(long, value_name = "FILE")]
    pub figure: Option<PathBuf>,

    /// Print ASCII panels to the terminal.
    #[arg(long)]
    pub show: bool,

    /// Write per-peak fit results to CSV.
    #[arg(long, value_name = "CSV")]
    pub summary: Option<PathBuf>,

    /// Give every panel after the first its own x range.
    #[arg(long)]
    pub no_share_x: bool,

    /// Use one y range for every panel.
    #[arg(long)]
    pub share_y: bool,

    /// Figure width (inches).
    #[arg(long, default_value_t = 10.0)]
    pub width: f64,

    /// Figure height (inches).
    #[arg(long, default_value_t = 20.0)]
    pub height: f64,

    /// Unit appended to each panel title.
    #[arg(long, default_value = "s")]
    pub unit: String,

    /// Shared x display range.
    #[arg(long, num_args = 2, value_names = ["MIN", "MAX"], allow_negative_numbers = true)]
    pub x_range: Option<Vec<f64>>,

    /// Y display range for the panels named by `--y-range-panel`.
    #[arg(long, num_args = 2, value_names = ["MIN", "MAX"], allow_negative_numbers = true)]
    pub y_range: Option<Vec<f64>>,

    /// Zero-based panel indices that use `--y-range`.
    #[arg(long = "y-range-panel", value_name = "I", num_args = 1..)]
    pub y_range_panels: Vec<usize>,

    /// Solver iteration cap per peak.
    #[arg(long, default_value_t = 200)]
    pub max_iter: usize,
}

#[derive(Debug, Parser, Clone)]
pub struct ExportArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Row label to export, one per peak, in peak order.
    #[arg(long = "select", value_name = "KEY", num_args = 1.., required = true)]
    pub selection: Vec<String>,

    /// Output text file.
    #[arg(long, value_name = "TXT")]
    pub out: PathBuf,
}

#[derive(Debug, Parser, Clone)]
pub struct DemoArgs {
    /// Relaxation law used to generate the curves.
    #[arg(short = 'm', long, value_enum, default_value_t = RelaxationModel::T2)]
    pub model: RelaxationModel,

    /// Directory receiving `times.csv` and `peaks.csv`.
    #[arg(long, value_name = "DIR")]
    pub out_dir: PathBuf,

    /// Number of peaks.
    #[arg(long = "peaks", default_value_t = 4)]
    pub n_peaks: usize,

    /// Time points per peak.
    #[arg(long = "points", default_value_t = 12)]
    pub n_points: usize,

    /// Last time point.
    #[arg(long, default_value_t = 10.0)]
    pub t_max: f64,

    /// Noise standard deviation as a fraction of amplitude.
    #[arg(long, default_value_t = 0.01)]
    pub noise: f64,

    /// Random seed.
    #[arg(long, default_value_t = 7)]
    pub seed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_fit_with_ranges() {
        let cli = Cli::try_parse_from([
            "relax", "fit", "--model", "t1rho", "--times", "t.csv", "--peaks", "p.csv", "--x-range", "-1", "12",
            "--y-range", "0", "900", "--y-range-panel", "0", "2", "--share-y",
        ])
        .unwrap();
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        assert_eq!(args.model, RelaxationModel::T1rho);
        assert_eq!(args.x_range, Some(vec![-1.0, 12.0]));
        assert_eq!(args.y_range, Some(vec![0.0, 900.0]));
        assert_eq!(args.y_range_panels, vec![0, 2]);
        assert!(args.share_y);
        assert!(!args.no_share_x);
        assert_eq!(args.unit, "s");
    }

    #[test]
    fn export_requires_a_selection() {
        let err = Cli::try_parse_from(["relax", "export", "--times", "t", "--peaks", "p", "--out", "o.txt"]);
        assert!(err.is_err());

        let cli = Cli::try_parse_from([
            "relax", "export", "--times", "t", "--peaks", "p", "--out", "o.txt", "--select", "42", "43",
        ])
        .unwrap();
        let Command::Export(args) = cli.command else {
            panic!("expected export");
        };
        assert_eq!(args.selection, vec!["42", "43"]);
    }
}
