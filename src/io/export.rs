//! Export selected peak slices to a plain-text report.
//!
//! Report layout, one block per selected peak:
//!
//! ```text
//! The 1st slice:
//! 0.000000,100.000000
//! 1.000000,50.000000
//! ---------------------
//! ```

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use log::info;

use crate::domain::PeakTable;
use crate::error::AppError;

pub const SLICE_SEPARATOR: &str = "---------------------";

/// Ordinal suffix for the slice at zero-based `index`.
///
/// Only the first three slices get `st`/`nd`/`rd`; every later one is `th`.
pub fn ordinal_suffix(index: usize) -> &'static str {
    match index {
        0 => "st",
        1 => "nd",
        2 => "rd",
        _ => "th",
    }
}

/// Header line (without newline) for the slice at zero-based `index`.
pub fn slice_header(index: usize) -> String {
    format!("The {}{} slice:", index + 1, ordinal_suffix(index))
}

/// Write one block per `(selection[i], peaks[i])` pair to `out`.
///
/// Intensities of every row labelled `selection[i]` are paired with the time
/// axis in order; pairing stops at the shorter of the two. A label with no rows
/// produces a block with no lines between header and separator.
pub fn write_slices<W: Write>(
    out: &mut W,
    selection: &[String],
    time_axis: &[f64],
    peaks: &[PeakTable],
) -> std::io::Result<()> {
    for (i, (key, peak)) in selection.iter().zip(peaks.iter()).enumerate() {
        writeln!(out, "{}", slice_header(i))?;
        for (t, v) in time_axis.iter().zip(peak.get(key)) {
            writeln!(out, "{t:.6},{v:.6}")?;
        }
        writeln!(out, "{SLICE_SEPARATOR}")?;
    }
    Ok(())
}

/// Write the slice report to `path`.
///
/// The selection must name exactly one label per peak; this is checked before
/// the file is created.
pub fn export_slices(
    selection: &[String],
    time_axis: &[f64],
    peaks: &[PeakTable],
    path: &Path,
) -> Result<(), AppError> {
    if selection.len() != peaks.len() {
        return Err(AppError::invalid(format!(
            "Got {} slice selector(s) for {} peak(s).",
            selection.len(),
            peaks.len()
        )));
    }

    let file = File::create(path).map_err(|e| AppError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    write_slices(&mut writer, selection, time_axis, peaks).map_err(|e| AppError::io(path, e))?;
    writer.flush().map_err(|e| AppError::io(path, e))?;

    info!("Wrote {} slice(s) to '{}'.", selection.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(selection: &[&str], time_axis: &[f64], peaks: &[PeakTable]) -> String {
        let selection: Vec<String> = selection.iter().map(|s| s.to_string()).collect();
        let mut buf = Vec::new();
        write_slices(&mut buf, &selection, time_axis, peaks).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn single_slice_exact_format() {
        let peak = PeakTable::with_key("p", "42", [100.0, 50.0, 25.0]);
        let txt = render(&["42"], &[0.0, 1.0, 2.0], &[peak]);
        assert_eq!(
            txt,
            concat!(
                "The 1st slice:\n",
                "0.000000,100.000000\n",
                "1.000000,50.000000\n",
                "2.000000,25.000000\n",
                "---------------------\n",
            )
        );
    }

    #[test]
    fn ordinal_suffixes() {
        let rendered: Vec<String> = [0, 1, 2, 3, 10, 20].iter().map(|&i| slice_header(i)).collect();
        assert_eq!(
            rendered,
            vec![
                "The 1st slice:",
                "The 2nd slice:",
                "The 3rd slice:",
                "The 4th slice:",
                "The 11th slice:",
                "The 21th slice:",
            ]
        );
    }

    #[test]
    fn missing_label_gives_empty_block() {
        let peak = PeakTable::with_key("p", "42", [1.0, 2.0]);
        let txt = render(&["7"], &[0.0, 1.0], &[peak]);
        assert_eq!(txt, "The 1st slice:\n---------------------\n");
    }

    #[test]
    fn only_rows_with_the_label_are_paired_in_order() {
        let mut peak = PeakTable::new("p");
        peak.push("a", 10.0);
        peak.push("b", 99.0);
        peak.push("a", 5.0);
        let other = PeakTable::with_key("q", "b", [1.5]);
        let txt = render(&["a", "b"], &[0.5, 1.0, 2.0], &[peak, other]);
        assert_eq!(
            txt,
            concat!(
                "The 1st slice:\n",
                "0.500000,10.000000\n",
                "1.000000,5.000000\n",
                "---------------------\n",
                "The 2nd slice:\n",
                "0.500000,1.500000\n",
                "---------------------\n",
            )
        );
    }

    #[test]
    fn selection_count_is_checked_before_creating_the_file() {
        let path = std::env::temp_dir().join(format!("relax_curves_never_{}.txt", std::process::id()));
        let peaks = vec![PeakTable::with_key("p", "k", [1.0])];
        let err = export_slices(&[], &[0.0], &peaks, &path).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
        assert!(!path.exists());
    }

    #[test]
    fn unwritable_path_is_an_io_error() {
        let path = std::env::temp_dir()
            .join(format!("relax_curves_missing_dir_{}", std::process::id()))
            .join("slices.txt");
        let peaks = vec![PeakTable::with_key("p", "k", [1.0])];
        let err = export_slices(&["k".to_string()], &[0.0], &peaks, &path).unwrap_err();
        assert!(matches!(err, AppError::Io { .. }));
    }
}
