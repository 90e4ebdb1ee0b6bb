//! Agent error types

use intercept_core::InterceptError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Logging error: {0}")]
    Logging(String),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Rule '{rule}' is invalid: {message}")]
    InvalidRule { rule: String, message: String },

    #[error(transparent)]
    Intercept(#[from] InterceptError),
}

pub type AgentResult<T> = Result<T, AgentError>;
