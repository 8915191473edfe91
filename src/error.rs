use std::path::PathBuf;

/// Everything that can go wrong while clustering connections or filtering clusters.
#[derive(Debug, thiserror::Error)]
pub enum SolarMapError {
    /// A file produced by an upstream step does not exist yet.
    #[error("{} not found at {}. {}", .what, .path.display(), .hint)]
    MissingInput {
        what: &'static str,
        path: PathBuf,
        hint: &'static str,
    },

    /// A record is missing a required value or the value isn't usable.
    #[error("malformed record at row {row}, column {column}: {reason}")]
    MalformedRecord {
        /// 1-based data row, not counting the header. Zero means the header itself.
        row: usize,
        column: &'static str,
        reason: String,
    },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("unsupported cluster summary format '{found}' version {version}")]
    UnsupportedFormat { found: String, version: u32 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SolarMapError {
    /// Missing upstream files are reported to users as information, not as a failure.
    pub fn is_missing_input(&self) -> bool {
        matches!(self, SolarMapError::MissingInput { .. })
    }
}

pub type SolarMapResult<T> = Result<T, SolarMapError>;
