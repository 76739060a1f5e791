//! Client capabilities the scheduler consumes.

use std::net::SocketAddr;

use async_trait::async_trait;

use tern_core::{FullTaskId, LaunchSpec};

use crate::error::RpcResult;

/// A connection to one worker node's monitor.
#[async_trait]
pub trait NodeMonitorClient: Send {
    /// Number of tasks queued or running on the node.
    async fn probe_load(&mut self, app_id: &str, request_id: &str) -> RpcResult<u32>;

    /// Ask the node to run a task. Returns once the node acknowledged it.
    async fn launch_task(&mut self, spec: &LaunchSpec) -> RpcResult<()>;
}

/// A connection to an application frontend.
#[async_trait]
pub trait FrontendClient: Send {
    /// Deliver a task status update.
    async fn frontend_message(
        &mut self,
        task: &FullTaskId,
        status: i32,
        message: &[u8],
    ) -> RpcResult<()>;
}

/// Opens new clients of type `C` for the pool.
#[async_trait]
pub trait Connector<C>: Send + Sync {
    async fn connect(&self, addr: SocketAddr) -> RpcResult<C>;
}
