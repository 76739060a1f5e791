//! Per-address client pool.
//!
//! A borrowed client goes back to the pool only through
//! [`PooledClient::release`]. Dropping it instead closes the connection,
//! which is what callers do after any failed call.

use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::client::{Connector, FrontendClient, NodeMonitorClient};
use crate::error::RpcResult;

/// Pool of node monitor connections shared by placers and launches.
pub type NodeMonitorPool = ClientPool<Box<dyn NodeMonitorClient>>;

/// Pool of frontend connections used for status delivery.
pub type FrontendPool = ClientPool<Box<dyn FrontendClient>>;

/// Default number of idle clients kept per address.
pub const DEFAULT_MAX_IDLE: usize = 8;

type IdleMap<C> = Arc<Mutex<HashMap<SocketAddr, Vec<C>>>>;

/// Cloneable handle to a set of idle clients keyed by address.
pub struct ClientPool<C> {
    connector: Arc<dyn Connector<C>>,
    idle: IdleMap<C>,
    max_idle: usize,
}

impl<C> Clone for ClientPool<C> {
    fn clone(&self) -> Self {
        Self {
            connector: self.connector.clone(),
            idle: self.idle.clone(),
            max_idle: self.max_idle,
        }
    }
}

impl<C> fmt::Debug for ClientPool<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientPool")
            .field("addresses", &self.idle.lock().len())
            .field("max_idle", &self.max_idle)
            .finish()
    }
}

impl<C: Send + 'static> ClientPool<C> {
    pub fn new(connector: Arc<dyn Connector<C>>) -> Self {
        Self {
            connector,
            idle: Arc::new(Mutex::new(HashMap::new())),
            max_idle: DEFAULT_MAX_IDLE,
        }
    }

    /// Cap the number of idle clients kept per address.
    pub fn with_max_idle(mut self, max_idle: usize) -> Self {
        self.max_idle = max_idle;
        self
    }

    /// Take an idle client for `addr`, or open a new one.
    pub async fn borrow(&self, addr: SocketAddr) -> RpcResult<PooledClient<C>> {
        let reused = self.idle.lock().get_mut(&addr).and_then(Vec::pop);
        let client = match reused {
            Some(client) => client,
            None => {
                debug!(%addr, "opening new client");
                self.connector.connect(addr).await?
            }
        };
        Ok(PooledClient {
            client,
            addr,
            idle: self.idle.clone(),
            max_idle: self.max_idle,
        })
    }

    /// Number of idle clients currently pooled for `addr`.
    pub fn idle_count(&self, addr: SocketAddr) -> usize {
        self.idle.lock().get(&addr).map_or(0, Vec::len)
    }
}

/// A client on loan from a [`ClientPool`].
pub struct PooledClient<C> {
    client: C,
    addr: SocketAddr,
    idle: IdleMap<C>,
    max_idle: usize,
}

impl<C> PooledClient<C> {
    /// Address the client is connected to.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Return the client to its pool for reuse.
    ///
    /// Only call this after a call completed cleanly.
    pub fn release(self) {
        let PooledClient {
            client,
            addr,
            idle,
            max_idle,
        } = self;
        let mut idle = idle.lock();
        let slot = idle.entry(addr).or_default();
        if slot.len() < max_idle {
            slot.push(client);
        }
    }
}

impl<C> Deref for PooledClient<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.client
    }
}

impl<C> DerefMut for PooledClient<C> {
    fn deref_mut(&mut self) -> &mut C {
        &mut self.client
    }
}
