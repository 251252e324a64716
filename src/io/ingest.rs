//! CSV ingest for time axes and peak sets.
//!
//! Two layouts are accepted:
//!
//! - **Time axis**: one value per row. Either headerless (every row is a number)
//!   or with a header row that names a `time` column.
//! - **Peaks**: long format with `peak,key,val` columns (any order, any case).
//!   Rows are grouped by `peak` in order of first appearance; within a peak the
//!   row order is kept.
//!
//! Any row that cannot be parsed fails the whole load with its 1-based line
//! number, since a silently dropped row would desynchronise the peak from the
//! time axis.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;
use log::{debug, info};

use crate::domain::{PeakSet, PeakTable};
use crate::error::AppError;

/// Load a time axis from `path`.
pub fn load_time_axis(path: &Path) -> Result<Vec<f64>, AppError> {
    let file = File::open(path).map_err(|e| AppError::io(path, e))?;
    let times = read_time_axis(file, path)?;
    info!("Read {} time point(s) from '{}'.", times.len(), path.display());
    Ok(times)
}

/// Load a peak set from `path`.
pub fn load_peaks(path: &Path) -> Result<PeakSet, AppError> {
    let file = File::open(path).map_err(|e| AppError::io(path, e))?;
    let peaks = read_peaks(file, path)?;
    info!("Read {} peak(s) from '{}'.", peaks.len(), path.display());
    Ok(peaks)
}

/// Parse a time axis from any reader. `path` only labels errors.
pub fn read_time_axis<R: Read>(reader: R, path: &Path) -> Result<Vec<f64>, AppError> {
    let mut reader = csv_reader(reader, false);
    let mut times = Vec::new();
    let mut column: Option<usize> = None;

    for (idx, result) in reader.records().enumerate() {
        let record = result.map_err(|e| parse_error(path, csv_line(&e, idx), format!("CSV parse error: {e}")))?;
        let line = record.position().map_or(idx + 1, |p| p.line() as usize);

        if record.iter().all(|f| f.is_empty()) {
            continue;
        }

        // The first non-blank row is either data or a header naming `time`.
        if column.is_none() {
            let first = record.get(0).unwrap_or("").trim_start_matches('\u{feff}');
            if first.parse::<f64>().is_err() {
                let map = build_header_map(&record);
                let col = map
                    .get("time")
                    .copied()
                    .ok_or_else(|| parse_error(path, line, "expected a number or a header with a `time` column"))?;
                column = Some(col);
                continue;
            }
            column = Some(0);
        }

        let col = column.unwrap_or(0);
        let field = record.get(col).unwrap_or("");
        times.push(parse_f64(field, "time", path, line)?);
    }

    if times.is_empty() {
        return Err(AppError::invalid(format!("No time points in '{}'.", path.display())));
    }
    Ok(times)
}

/// Parse a long-format peak set from any reader. `path` only labels errors.
pub fn read_peaks<R: Read>(reader: R, path: &Path) -> Result<PeakSet, AppError> {
    let mut reader = csv_reader(reader, true);

    let headers = reader
        .headers()
        .map_err(|e| parse_error(path, 1, format!("Failed to read CSV headers: {e}")))?
        .clone();
    let map = build_header_map(&headers);
    let column = |name: &str| {
        map.get(name)
            .copied()
            .ok_or_else(|| parse_error(path, 1, format!("missing required column `{name}`")))
    };
    let (peak_col, key_col, val_col) = (column("peak")?, column("key")?, column("val")?);

    let mut peaks: PeakSet = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for (idx, result) in reader.records().enumerate() {
        // Records start on line 2, after the header.
        let record = result.map_err(|e| parse_error(path, csv_line(&e, idx + 1), format!("CSV parse error: {e}")))?;
        let line = record.position().map_or(idx + 2, |p| p.line() as usize);

        if record.iter().all(|f| f.is_empty()) {
            continue;
        }

        let name = record.get(peak_col).unwrap_or("");
        if name.is_empty() {
            return Err(parse_error(path, line, "empty `peak` field"));
        }
        let key = record.get(key_col).unwrap_or("");
        let val = parse_f64(record.get(val_col).unwrap_or(""), "val", path, line)?;

        let slot = match index.get(name) {
            Some(&slot) => slot,
            None => {
                peaks.push(PeakTable::new(name));
                index.insert(name.to_string(), peaks.len() - 1);
                peaks.len() - 1
            }
        };
        peaks[slot].push(key, val);
    }

    if peaks.is_empty() {
        return Err(AppError::invalid(format!("No peak rows in '{}'.", path.display())));
    }
    for peak in &peaks {
        debug!("peak '{}': {} row(s)", peak.name(), peak.len());
    }
    Ok(peaks)
}

fn csv_reader<R: Read>(reader: R, has_headers: bool) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .has_headers(has_headers)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader)
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports often prefix the first header with a UTF-8 BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn parse_f64(field: &str, column: &str, path: &Path, line: usize) -> Result<f64, AppError> {
    let field = field.trim_start_matches('\u{feff}');
    field
        .parse::<f64>()
        .map_err(|_| parse_error(path, line, format!("invalid `{column}` value '{field}'")))
}

fn csv_line(err: &csv::Error, fallback: usize) -> usize {
    err.position().map_or(fallback, |p| p.line() as usize)
}

fn parse_error(path: &Path, line: usize, message: impl Into<String>) -> AppError {
    AppError::Parse {
        path: path.to_path_buf(),
        line,
        message: message.into(),
    }
}
