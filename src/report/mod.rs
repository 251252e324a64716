//! Formatted terminal output for fit results.
//!
//! Formatting lives here so the fitting code stays free of presentation
//! concerns and output changes stay localized.

use crate::domain::{PeakFit, PeakTable, RelaxationModel};

/// Format the run header and one table row per fitted peak.
pub fn format_fit_summary(model: RelaxationModel, peaks: &[PeakTable], fits: &[PeakFit]) -> String {
    let mut out = String::new();

    out.push_str("=== relax - relaxation curve fit ===\n");
    out.push_str(&format!("Model: {} | peaks={}\n\n", model.display_name(), fits.len()));

    let tau = model.tau_name();
    push_line(
        &mut out,
        format!(
            "{:<16} {:>14} {:>12} {:>12} {:>12} {:>12} {:>6}",
            "peak",
            "c0",
            "sd(c0)",
            tau,
            format!("sd({tau})"),
            "rmse",
            "iters"
        ),
    );
    push_line(
        &mut out,
        format!(
            "{:-<16} {:-<14} {:-<12} {:-<12} {:-<12} {:-<12} {:-<6}",
            "", "", "", "", "", "", ""
        ),
    );

    for (peak, fit) in peaks.iter().zip(fits.iter()) {
        let sd = fit.std_errors();
        push_line(
            &mut out,
            format!(
                "{:<16} {:>14.3} {:>12} {:>12.6} {:>12} {:>12.3} {:>6}",
                truncate(peak.name(), 16),
                fit.params.c0,
                fmt_sd(sd.c0, 3),
                fit.params.tau,
                fmt_sd(sd.tau, 6),
                fit.rmse,
                fit.iterations,
            ),
        );
    }

    out
}

fn push_line(out: &mut String, line: String) {
    out.push_str(line.trim_end());
    out.push('\n');
}

fn fmt_sd(v: f64, precision: usize) -> String {
    if v.is_finite() {
        format!("{v:.precision$}")
    } else {
        "n/a".to_string()
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}
