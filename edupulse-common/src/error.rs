//! Common error types for EduPulse

use thiserror::Error;
use uuid::Uuid;

/// Common result type for EduPulse operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across EduPulse services
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Risk/trend query against an unknown student id
    #[error("Student not found: {0}")]
    StudentNotFound(Uuid),

    /// Inference attempted before model initialization completed
    #[error("Model not ready: {0}")]
    ModelNotReady(&'static str),

    /// Malformed input signal (unsupported sample rate, bad metric range)
    #[error("Feature extraction failed: {0}")]
    FeatureExtraction(String),

    /// Inference attempted while a training call holds exclusive access
    #[error("Training in progress: {0}")]
    TrainingInProgress(&'static str),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
