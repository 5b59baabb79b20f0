use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StorageError>;

/// The storage operation an error was raised from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Store,
    Retrieve,
    Delete,
    HealthCheck,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Store => "store",
            Operation::Retrieve => "retrieve",
            Operation::Delete => "delete",
            Operation::HealthCheck => "health check",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Unsupported digest algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("I/O failure during {operation} of '{key}': {source}")]
    Io {
        operation: Operation,
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Backend rejected {operation} of '{key}': {message}")]
    BackendRejected {
        operation: Operation,
        key: String,
        message: String,
    },

    #[error("Backend unavailable during {operation} of '{key}': {message}")]
    BackendUnavailable {
        operation: Operation,
        key: String,
        message: String,
    },

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl StorageError {
    pub fn io(operation: Operation, key: impl Into<String>, source: std::io::Error) -> Self {
        StorageError::Io {
            operation,
            key: key.into(),
            source,
        }
    }

    pub fn rejected(operation: Operation, key: impl Into<String>, message: impl Into<String>) -> Self {
        StorageError::BackendRejected {
            operation,
            key: key.into(),
            message: message.into(),
        }
    }

    pub fn unavailable(
        operation: Operation,
        key: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        StorageError::BackendUnavailable {
            operation,
            key: key.into(),
            message: message.into(),
        }
    }

    /// Only transient backend failures are worth retrying at a higher layer.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StorageError::BackendUnavailable { .. })
    }

    /// HTTP status code for surfacing the error over the server API.
    pub fn status_code(&self) -> u16 {
        match self {
            StorageError::UnsupportedAlgorithm(_) => 500,
            StorageError::Io { .. } => 500,
            StorageError::BackendRejected { .. } => 422,
            StorageError::BackendUnavailable { .. } => 503,
            StorageError::NotFound(_) => 404,
            StorageError::Config(_) => 500,
            StorageError::InvalidRequest(_) => 400,
            StorageError::Internal(_) => 500,
        }
    }
}
