use thiserror::Error;

/// Errors that can occur while loading data, fitting, or exporting a pipeline.
#[derive(Debug, Error)]
pub enum SieveError {
    /// The input could not be read or the output could not be written.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The training table is missing required columns or is malformed.
    #[error("data format error: {0}")]
    DataFormat(String),

    /// The training data is degenerate, empty, or inconsistent.
    #[error("fit error: {0}")]
    Fit(String),

    /// A vectorizer or classifier parameter is out of range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The pipeline cannot be expressed as an ONNX graph.
    #[error("conversion error: {0}")]
    Conversion(String),

    /// A regex pattern failed to compile (should not happen with static patterns).
    #[error("regex compilation error: {0}")]
    Regex(#[from] regex::Error),
}

impl From<csv::Error> for SieveError {
    fn from(err: csv::Error) -> Self {
        if !err.is_io_error() {
            return Self::DataFormat(err.to_string());
        }
        match err.into_kind() {
            csv::ErrorKind::Io(io) => Self::Io(io),
            kind => Self::DataFormat(format!("{kind:?}")),
        }
    }
}

/// Result type alias for Sieve operations.
pub type Result<T> = std::result::Result<T, SieveError>;
