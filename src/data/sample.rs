//! Synthetic relaxation data for demos and tests.
//!
//! Peaks are generated from the chosen relaxation law with uniformly drawn
//! amplitudes and time constants, plus Gaussian noise proportional to each
//! peak's amplitude. The RNG is seeded so a given config always yields the
//! same data.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use log::info;
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::{PeakSet, PeakTable, RelaxParams, RelaxationModel};
use crate::error::AppError;
use crate::models::predict;

#[derive(Debug, Clone, PartialEq)]
pub struct SampleConfig {
    pub model: RelaxationModel,
    pub n_peaks: usize,
    pub n_points: usize,
    /// Last time point; the axis runs linearly from 0.
    pub t_max: f64,
    pub amplitude_range: (f64, f64),
    pub tau_range: (f64, f64),
    /// Noise standard deviation as a fraction of each peak's amplitude.
    pub noise_frac: f64,
    pub seed: u64,
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            model: RelaxationModel::T2,
            n_peaks: 4,
            n_points: 12,
            t_max: 10.0,
            amplitude_range: (10_000.0, 50_000.0),
            tau_range: (0.5, 4.0),
            noise_frac: 0.01,
            seed: 7,
        }
    }
}

/// Generate a time axis and a peak set.
///
/// Peak `i` is named `peak{i+1}`; all its rows carry the same label, the peak's
/// pseudo chemical-shift position, so an export selection can pick it whole.
pub fn generate_peaks(config: &SampleConfig) -> Result<(Vec<f64>, PeakSet), AppError> {
    if config.n_peaks == 0 {
        return Err(AppError::invalid("Peak count must be > 0."));
    }
    if config.n_points < 3 {
        return Err(AppError::invalid("Need at least 3 time points per peak."));
    }
    if !(config.t_max.is_finite() && config.t_max > 0.0) {
        return Err(AppError::invalid("Time span must be positive."));
    }
    let (a_lo, a_hi) = config.amplitude_range;
    let (t_lo, t_hi) = config.tau_range;
    if !(a_lo.is_finite() && a_hi.is_finite() && a_hi >= a_lo) {
        return Err(AppError::invalid("Invalid amplitude range for sample generation."));
    }
    if !(t_lo.is_finite() && t_hi.is_finite() && t_lo > 0.0 && t_hi >= t_lo) {
        return Err(AppError::invalid("Invalid time-constant range for sample generation."));
    }
    if !(config.noise_frac.is_finite() && config.noise_frac >= 0.0) {
        return Err(AppError::invalid("Noise fraction must be >= 0."));
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let normal = Normal::new(0.0, 1.0).map_err(|e| AppError::invalid(format!("Noise distribution error: {e}")))?;

    let step = config.t_max / (config.n_points - 1) as f64;
    let time_axis: Vec<f64> = (0..config.n_points).map(|i| i as f64 * step).collect();

    let mut peaks = Vec::with_capacity(config.n_peaks);
    for i in 0..config.n_peaks {
        let params = RelaxParams::new(rng.gen_range(a_lo..=a_hi), rng.gen_range(t_lo..=t_hi));
        let sigma = config.noise_frac * params.c0;
        let label = format!("{:.3}", 8.0 + 0.125 * i as f64);

        let mut peak = PeakTable::new(format!("peak{}", i + 1));
        for &t in &time_axis {
            let noise = sigma * normal.sample(&mut rng);
            peak.push(label.as_str(), predict(config.model, t, params) + noise);
        }
        peaks.push(peak);
    }

    Ok((time_axis, peaks))
}

/// Write a time axis as a headed one-column CSV.
pub fn write_time_csv(path: &Path, time_axis: &[f64]) -> Result<(), AppError> {
    let file = File::create(path).map_err(|e| AppError::io(path, e))?;
    let mut out = BufWriter::new(file);
    let write = |out: &mut BufWriter<File>| -> std::io::Result<()> {
        writeln!(out, "time")?;
        for t in time_axis {
            writeln!(out, "{t}")?;
        }
        out.flush()
    };
    write(&mut out).map_err(|e| AppError::io(path, e))?;
    info!("Wrote {} time point(s) to '{}'.", time_axis.len(), path.display());
    Ok(())
}

/// Write a peak set in long `peak,key,val` format.
pub fn write_peaks_csv(path: &Path, peaks: &[PeakTable]) -> Result<(), AppError> {
    let file = File::create(path).map_err(|e| AppError::io(path, e))?;
    let mut writer = csv::Writer::from_writer(BufWriter::new(file));
    let to_app = |e: csv::Error| match e.into_kind() {
        csv::ErrorKind::Io(source) => AppError::io(path, source),
        other => AppError::invalid(format!("Failed to write '{}': {other:?}", path.display())),
    };

    writer.write_record(["peak", "key", "val"]).map_err(to_app)?;
    for peak in peaks {
        for (key, val) in peak.rows() {
            writer
                .write_record([peak.name(), key, val.to_string().as_str()])
                .map_err(to_app)?;
        }
    }
    writer.flush().map_err(|e| AppError::io(path, e))?;
    info!("Wrote {} peak(s) to '{}'.", peaks.len(), path.display());
    Ok(())
}
