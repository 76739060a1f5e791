//! Placement error types.

use thiserror::Error;

/// Result type alias for placement calls.
pub type PlacementResult<T> = Result<T, PlacementError>;

/// Reasons a batch could not be placed. No partial placement is ever
/// returned alongside one of these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlacementError {
    #[error("no backends available for application: {0}")]
    NoBackends(String),

    #[error("no probe answered for request {0}")]
    NoProbeResponses(String),

    #[error("task {0} prefers no backend known to the directory")]
    NoEligibleBackends(String),

    #[error("no preferred backend of task {0} answered its probe")]
    PreferredUnresponsive(String),
}
