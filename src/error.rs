use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelError {
    /// No feed handle was supplied to the builder
    MissingFeed,

    /// No subscription symbol was supplied to the builder
    MissingSymbol,

    /// No listener was supplied to a builder that requires one
    MissingListener,

    /// System error
    SystemError(String),
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::MissingFeed => write!(f, "No feed handle configured"),
            ModelError::MissingSymbol => write!(f, "No subscription symbol configured"),
            ModelError::MissingListener => write!(f, "No listener configured"),
            ModelError::SystemError(msg) => write!(f, "System error: {}", msg),
        }
    }
}

impl std::error::Error for ModelError {}

/// Result type for model construction and operations
pub type ModelResult<T> = Result<T, ModelError>;
