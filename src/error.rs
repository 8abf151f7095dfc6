//! Error types for the AQI pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, AqiError>;

/// Main error type for the pipeline
#[derive(Error, Debug)]
pub enum AqiError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("Required column not found: {0}")]
    MissingColumn(String),

    #[error("Cannot parse '{value}' with format '{format}'")]
    DateParse { value: String, format: String },

    #[error("Timestamp index is not strictly increasing: {0}")]
    UnorderedIndex(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<polars::error::PolarsError> for AqiError {
    fn from(err: polars::error::PolarsError) -> Self {
        AqiError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for AqiError {
    fn from(err: serde_json::Error) -> Self {
        AqiError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for AqiError {
    fn from(err: ndarray::ShapeError) -> Self {
        AqiError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
