//! Scheduler error types.

use thiserror::Error;

use tern_core::ValidationError;
use tern_placement::PlacementError;
use tern_rpc::RpcError;
use tern_state::StateError;

/// Reasons a scheduler operation was rejected.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("invalid request: {0}")]
    Validation(#[from] ValidationError),

    #[error("invalid frontend address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("application not registered: {0}")]
    UnknownApplication(String),

    #[error("special case needs at least {needed} backends, directory has {available}")]
    NotEnoughBackends { needed: usize, available: usize },

    #[error("placement error: {0}")]
    Placement(#[from] PlacementError),

    #[error("rpc error: {0}")]
    Rpc(#[from] RpcError),

    #[error("backend directory error: {0}")]
    State(#[from] StateError),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
