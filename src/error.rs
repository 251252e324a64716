use std::path::PathBuf;

use thiserror::Error;

/// Every failure the library and the `relax` binary can report.
///
/// Each variant maps to a process exit code so the binary can stay a thin
/// wrapper (`main` prints the message and exits with `exit_code()`).
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("I/O error on '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}:{line}: {message}", .path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("peak {peak}: expected {expected} intensities to match the time axis, got {actual}")]
    ShapeMismatch {
        peak: usize,
        expected: usize,
        actual: usize,
    },

    #[error("peak {peak}: fit did not converge ({reason})")]
    NonConvergence { peak: usize, reason: String },

    #[error("failed to render plot: {0}")]
    Plot(String),
}

impl AppError {
    pub fn invalid(message: impl Into<String>) -> Self {
        AppError::InvalidInput(message.into())
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AppError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::InvalidInput(_) | AppError::Io { .. } | AppError::Parse { .. } => 2,
            AppError::ShapeMismatch { .. } => 3,
            AppError::NonConvergence { .. } => 4,
            AppError::Plot(_) => 5,
        }
    }
}

impl<E: std::error::Error + Send + Sync + 'static> From<plotters::drawing::DrawingAreaErrorKind<E>>
    for AppError
{
    fn from(value: plotters::drawing::DrawingAreaErrorKind<E>) -> Self {
        AppError::Plot(format!("{value:?}"))
    }
}
