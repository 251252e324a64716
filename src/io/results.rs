//! Export per-peak fit results to CSV.
//!
//! One row per peak, in peak order, meant for spreadsheets or downstream scripts.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::domain::{PeakFit, PeakTable, RelaxationModel};
use crate::error::AppError;

#[derive(Debug, Serialize)]
struct FitRow<'a> {
    peak: &'a str,
    model: RelaxationModel,
    c0: f64,
    c0_sd: f64,
    tau: f64,
    tau_sd: f64,
    sse: f64,
    rmse: f64,
    iterations: usize,
}

/// Write fit results to any writer.
pub fn write_fit_rows<W: Write>(
    out: W,
    model: RelaxationModel,
    peaks: &[PeakTable],
    fits: &[PeakFit],
) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_writer(out);
    for (peak, fit) in peaks.iter().zip(fits.iter()) {
        let sd = fit.std_errors();
        writer.serialize(FitRow {
            peak: peak.name(),
            model,
            c0: fit.params.c0,
            c0_sd: sd.c0,
            tau: fit.params.tau,
            tau_sd: sd.tau,
            sse: fit.sse,
            rmse: fit.rmse,
            iterations: fit.iterations,
        })?;
    }
    writer.flush()?;
    Ok(())
}

/// Write fit results to `path`.
pub fn write_fit_csv(
    path: &Path,
    model: RelaxationModel,
    peaks: &[PeakTable],
    fits: &[PeakFit],
) -> Result<(), AppError> {
    if peaks.len() != fits.len() {
        return Err(AppError::invalid(format!(
            "Got {} peak(s) but {} fit result(s).",
            peaks.len(),
            fits.len()
        )));
    }
    let file = File::create(path).map_err(|e| AppError::io(path, e))?;
    write_fit_rows(file, model, peaks, fits).map_err(|e| match e.into_kind() {
        csv::ErrorKind::Io(source) => AppError::io(path, source),
        other => AppError::invalid(format!("Failed to write '{}': {other:?}", path.display())),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RelaxParams;
    use nalgebra::Matrix2;

    #[test]
    fn rows_follow_peak_order() {
        let peaks = vec![
            PeakTable::with_key("A", "k", [1.0, 2.0]),
            PeakTable::with_key("B", "k", [3.0, 4.0]),
        ];
        let fits: Vec<PeakFit> = [(100.0, 2.0), (50.0, 0.5)]
            .iter()
            .map(|&(c0, tau)| PeakFit {
                params: RelaxParams::new(c0, tau),
                covariance: Matrix2::new(4.0, 0.0, 0.0, 0.25),
                sse: 1.0,
                rmse: 0.5,
                iterations: 7,
            })
            .collect();

        let mut buf = Vec::new();
        write_fit_rows(&mut buf, RelaxationModel::T1rho, &peaks, &fits).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "peak,model,c0,c0_sd,tau,tau_sd,sse,rmse,iterations");
        assert_eq!(lines[1], "A,t1rho,100.0,2.0,2.0,0.5,1.0,0.5,7");
        assert!(lines[2].starts_with("B,t1rho,50.0,"));
        assert_eq!(lines.len(), 3);
    }
}
