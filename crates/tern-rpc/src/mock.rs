//! In-memory node monitors and frontends for tests.
//!
//! A [`MockCluster`] scripts each node's reported load, probe latency and
//! launch outcome, and records every probe and acknowledged launch so
//! tests can assert on fan-out and delivery.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use tern_core::{FullTaskId, LaunchSpec};

use crate::client::{Connector, FrontendClient, NodeMonitorClient};
use crate::error::{RpcError, RpcResult};
use crate::pool::{FrontendPool, NodeMonitorPool};

/// Scripted behaviour of one node monitor.
#[derive(Debug, Clone)]
pub struct NodeBehavior {
    /// Reported queue length; `None` makes probes fail.
    pub load: Option<u32>,
    pub probe_delay: Duration,
    pub fail_launches: bool,
}

impl Default for NodeBehavior {
    fn default() -> Self {
        Self {
            load: Some(0),
            probe_delay: Duration::ZERO,
            fail_launches: false,
        }
    }
}

#[derive(Default)]
struct ClusterState {
    nodes: HashMap<SocketAddr, NodeBehavior>,
    unreachable: HashSet<SocketAddr>,
    connects: usize,
    probes: Vec<SocketAddr>,
    launches: Vec<(SocketAddr, LaunchSpec)>,
    failed_launches: Vec<(SocketAddr, LaunchSpec)>,
}

/// Shared handle to a fake set of node monitors.
#[derive(Clone, Default)]
pub struct MockCluster {
    state: Arc<Mutex<ClusterState>>,
}

impl MockCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure a node reporting `load`.
    pub fn node(&self, addr: SocketAddr, load: u32) -> &Self {
        self.set(addr, NodeBehavior {
            load: Some(load),
            ..NodeBehavior::default()
        })
    }

    pub fn set(&self, addr: SocketAddr, behavior: NodeBehavior) -> &Self {
        self.state.lock().nodes.insert(addr, behavior);
        self
    }

    /// Make connection attempts to `addr` fail.
    pub fn unreachable(&self, addr: SocketAddr) -> &Self {
        self.state.lock().unreachable.insert(addr);
        self
    }

    /// A pool whose connections talk to this cluster.
    pub fn pool(&self) -> NodeMonitorPool {
        NodeMonitorPool::new(Arc::new(self.clone()))
    }

    /// Every address probed so far, in issue order.
    pub fn probes(&self) -> Vec<SocketAddr> {
        self.state.lock().probes.clone()
    }

    /// Launches acknowledged so far.
    pub fn launches(&self) -> Vec<(SocketAddr, LaunchSpec)> {
        self.state.lock().launches.clone()
    }

    /// Launch attempts that were rejected.
    pub fn failed_launches(&self) -> Vec<(SocketAddr, LaunchSpec)> {
        self.state.lock().failed_launches.clone()
    }

    /// Number of connections opened.
    pub fn connects(&self) -> usize {
        self.state.lock().connects
    }

    /// Wait until at least `n` launch attempts have finished, or `timeout`.
    pub async fn wait_for_launches(&self, n: usize, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            {
                let state = self.state.lock();
                if state.launches.len() + state.failed_launches.len() >= n {
                    return true;
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

#[async_trait]
impl Connector<Box<dyn NodeMonitorClient>> for MockCluster {
    async fn connect(&self, addr: SocketAddr) -> RpcResult<Box<dyn NodeMonitorClient>> {
        let mut state = self.state.lock();
        if state.unreachable.contains(&addr) {
            return Err(RpcError::Connect {
                addr,
                reason: "unreachable".to_string(),
            });
        }
        state.connects += 1;
        Ok(Box::new(MockNodeMonitor {
            addr,
            cluster: self.clone(),
        }))
    }
}

struct MockNodeMonitor {
    addr: SocketAddr,
    cluster: MockCluster,
}

#[async_trait]
impl NodeMonitorClient for MockNodeMonitor {
    async fn probe_load(&mut self, _app_id: &str, _request_id: &str) -> RpcResult<u32> {
        let behavior = {
            let mut state = self.cluster.state.lock();
            state.probes.push(self.addr);
            state.nodes.get(&self.addr).cloned().unwrap_or_default()
        };
        if !behavior.probe_delay.is_zero() {
            tokio::time::sleep(behavior.probe_delay).await;
        }
        behavior.load.ok_or(RpcError::Status {
            addr: self.addr,
            status: 500,
        })
    }

    async fn launch_task(&mut self, spec: &LaunchSpec) -> RpcResult<()> {
        let mut state = self.cluster.state.lock();
        let fail = state
            .nodes
            .get(&self.addr)
            .is_some_and(|b| b.fail_launches);
        if fail {
            state.failed_launches.push((self.addr, spec.clone()));
            return Err(RpcError::Status {
                addr: self.addr,
                status: 500,
            });
        }
        state.launches.push((self.addr, spec.clone()));
        Ok(())
    }
}

// ── Frontends ─────────────────────────────────────────────────────

#[derive(Default)]
struct FrontendState {
    failing: HashSet<SocketAddr>,
    delivered: Vec<(SocketAddr, FullTaskId, i32, Vec<u8>)>,
    connects: usize,
}

/// Fake frontends recording delivered status messages.
#[derive(Clone, Default)]
pub struct MockFrontends {
    state: Arc<Mutex<FrontendState>>,
}

impl MockFrontends {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make deliveries to `addr` fail after connecting.
    pub fn failing(&self, addr: SocketAddr) -> &Self {
        self.state.lock().failing.insert(addr);
        self
    }

    pub fn pool(&self) -> FrontendPool {
        FrontendPool::new(Arc::new(self.clone()))
    }

    pub fn delivered(&self) -> Vec<(SocketAddr, FullTaskId, i32, Vec<u8>)> {
        self.state.lock().delivered.clone()
    }

    pub fn connects(&self) -> usize {
        self.state.lock().connects
    }
}

#[async_trait]
impl Connector<Box<dyn FrontendClient>> for MockFrontends {
    async fn connect(&self, addr: SocketAddr) -> RpcResult<Box<dyn FrontendClient>> {
        self.state.lock().connects += 1;
        Ok(Box::new(MockFrontend {
            addr,
            frontends: self.clone(),
        }))
    }
}

struct MockFrontend {
    addr: SocketAddr,
    frontends: MockFrontends,
}

#[async_trait]
impl FrontendClient for MockFrontend {
    async fn frontend_message(
        &mut self,
        task: &FullTaskId,
        status: i32,
        message: &[u8],
    ) -> RpcResult<()> {
        let mut state = self.frontends.state.lock();
        if state.failing.contains(&self.addr) {
            return Err(RpcError::Transport {
                addr: self.addr,
                reason: "connection reset".to_string(),
            });
        }
        state
            .delivered
            .push((self.addr, task.clone(), status, message.to_vec()));
        Ok(())
    }
}
