//! tern-rpc: the scheduler's view of node monitors and frontends.
//!
//! The scheduling core only needs two remote capabilities: ask a node
//! monitor for its load or to launch a task, and hand a status message to
//! a frontend. Both are expressed as traits so placement and scheduling
//! can run against in-memory doubles.
//!
//! # Architecture
//!
//! ```text
//! ClientPool<C>  (per-address idle connections)
//!   ├── borrow(addr) → PooledClient<C>
//!   │     ├── release() → back to the pool
//!   │     └── drop      → discarded (connection state unknown)
//!   └── Connector<C>   → opens new clients on demand
//!
//! http::{HttpNodeMonitorConnector, HttpFrontendConnector}
//!   └── JSON over HTTP/1.1 keep-alive connections (hyper)
//! ```

pub mod client;
pub mod error;
pub mod http;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod pool;
pub mod wire;

pub use client::{Connector, FrontendClient, NodeMonitorClient};
pub use error::{RpcError, RpcResult};
pub use http::{HttpFrontendConnector, HttpNodeMonitorConnector};
pub use pool::{ClientPool, FrontendPool, NodeMonitorPool, PooledClient};
