//! Error types for interception operations

use thiserror::Error;

/// Main error type for the interception pipeline
#[derive(Debug, Error)]
pub enum InterceptError {
    #[error("Invalid resource type: {0}")]
    InvalidResourceType(String),

    #[error("Invalid error reason: {0}")]
    InvalidErrorReason(String),

    #[error("Protocol command {command} failed: {message}")]
    Protocol { command: String, message: String },

    #[error("Body encoding error: {0}")]
    Encoding(String),

    #[error("Callback error: {0}")]
    Callback(String),
}

impl InterceptError {
    /// Build a protocol failure for the named command
    pub fn protocol(command: impl Into<String>, message: impl ToString) -> Self {
        InterceptError::Protocol {
            command: command.into(),
            message: message.to_string(),
        }
    }
}

impl From<base64::DecodeError> for InterceptError {
    fn from(err: base64::DecodeError) -> Self {
        InterceptError::Encoding(err.to_string())
    }
}

/// Result type alias for interception operations
pub type InterceptResult<T> = Result<T, InterceptError>;
