use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from I/O operations
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error from JSON serialization/deserialization
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Error from the HTTP client
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Error from the key-value storage layer
    #[error("Storage error: {0}")]
    StorageError(String),

    /// The proxy backend answered with an unexpected status or body
    #[error("Backend error: {0}")]
    BackendError(String),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for application
pub type AppResult<T> = Result<T, AppError>;
