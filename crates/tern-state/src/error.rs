//! Error types for the backend directory.

use thiserror::Error;

/// Result type alias for backend directory operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur while reading the backend directory.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("no backends known for application: {0}")]
    NoBackends(String),
}
