//! RPC error types.

use std::net::SocketAddr;

use thiserror::Error;

/// Result type alias for remote calls.
pub type RpcResult<T> = Result<T, RpcError>;

/// Errors from reaching a node monitor or frontend.
#[derive(Debug, Clone, Error)]
pub enum RpcError {
    #[error("failed to connect to {addr}: {reason}")]
    Connect { addr: SocketAddr, reason: String },

    #[error("timed out talking to {0}")]
    Timeout(SocketAddr),

    #[error("transport error with {addr}: {reason}")]
    Transport { addr: SocketAddr, reason: String },

    #[error("{addr} responded with status {status}")]
    Status { addr: SocketAddr, status: u16 },

    #[error("malformed response from {addr}: {reason}")]
    Decode { addr: SocketAddr, reason: String },
}
