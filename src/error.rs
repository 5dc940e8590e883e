//! Error types for the anofox-growth library.

use thiserror::Error;

/// Result type alias for growth-model operations.
pub type Result<T> = std::result::Result<T, ForecastError>;

/// Errors that can occur while building inputs or configuring the engine.
///
/// Degenerate data never surfaces here: fitting an entity with too little
/// history yields a model flagged as insufficient rather than an error.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ForecastError {
    /// Input data is empty.
    #[error("empty input data")]
    EmptyData,

    /// Insufficient data points for the operation.
    #[error("insufficient data: need at least {needed}, got {got}")]
    InsufficientData { needed: usize, got: usize },

    /// Dimension mismatch between data structures.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// A date string could not be parsed as a calendar month.
    #[error("invalid date: {0}")]
    InvalidDate(String),

    /// Consecutive observations are not one calendar month apart.
    #[error("series is not contiguous at position {index}: {previous} -> {next}")]
    GapInSeries {
        index: usize,
        previous: String,
        next: String,
    },

    /// A negative observation was supplied.
    #[error("negative value {value} at position {index}")]
    NegativeValue { index: usize, value: f64 },

    /// Invalid parameter value.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}
