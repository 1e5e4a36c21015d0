//! Error types for the MAT-file waveform converter.

use thiserror::Error;

/// Result type alias for matwave operations.
pub type Result<T> = std::result::Result<T, MatWaveError>;

/// Errors that can occur when loading MAT files or converting waveforms.
#[derive(Error, Debug)]
pub enum MatWaveError {
    /// Not a MAT v5 file (e.g., bad endian indicator, truncated header)
    #[error("Invalid MAT-file format: {0}")]
    InvalidFormat(String),

    /// A valid MAT file that uses a feature this reader does not handle
    #[error("Unsupported MAT-file content: {0}")]
    Unsupported(String),

    /// I/O error occurred while reading or writing
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Data element parsing error (e.g., truncated element, bad sub-element type)
    #[error("Parse error: {0}")]
    ParseError(String),

    /// zlib stream inside a compressed element could not be inflated
    #[error("Decompression error: {0}")]
    Decompress(String),

    /// A waveform record lacks a required field
    #[error("Missing field '{0}' in waveform record")]
    MissingField(String),

    /// A waveform record field is present but has the wrong shape or type
    #[error("Invalid field '{field}': {reason}")]
    InvalidField { field: String, reason: String },

    /// Start ordinal cannot be turned into a calendar timestamp
    #[error("Invalid start time {0}: not a representable calendar ordinal")]
    StartTime(f64),

    /// Polars error during DataFrame construction or export
    #[error("Polars error: {0}")]
    PolarsError(#[from] polars::error::PolarsError),
}

impl MatWaveError {
    pub(crate) fn invalid_field(field: &str, reason: impl Into<String>) -> Self {
        MatWaveError::InvalidField {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}
