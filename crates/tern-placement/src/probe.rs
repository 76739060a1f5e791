//! Concurrent load probing.
//!
//! All probes of a batch are issued at once. Answers are collected until
//! every probe has completed or the wait bound elapses; probes still in
//! flight at that point are abandoned and their connections dropped.

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use tern_core::Backend;
use tern_rpc::{NodeMonitorPool, RpcResult};

/// Loads reported by the nodes that answered one batch's probes.
///
/// Nodes are ordered by load, ties broken by address. A node that did not
/// answer is absent, never treated as idle.
#[derive(Debug, Clone, Default)]
pub struct LoadTable {
    loads: HashMap<Backend, u32>,
    order: BTreeSet<(u32, Backend)>,
}

impl LoadTable {
    /// Record (or replace) the load of `node`.
    pub fn insert(&mut self, node: Backend, load: u32) {
        if let Some(old) = self.loads.insert(node, load) {
            self.order.remove(&(old, node));
        }
        self.order.insert((load, node));
    }

    pub fn load(&self, node: Backend) -> Option<u32> {
        self.loads.get(&node).copied()
    }

    pub fn len(&self) -> usize {
        self.loads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loads.is_empty()
    }

    pub fn least_loaded(&self) -> Option<Backend> {
        self.order.first().map(|&(_, node)| node)
    }

    /// Least-loaded answering node among `candidates`.
    pub fn least_loaded_in(&self, candidates: &[Backend]) -> Option<Backend> {
        candidates
            .iter()
            .filter_map(|&node| self.loads.get(&node).map(|&load| (load, node)))
            .min()
            .map(|(_, node)| node)
    }

    /// Account for one more task on `node`, returning its new load.
    pub fn bind(&mut self, node: Backend) -> u32 {
        let load = self.loads.get(&node).copied().unwrap_or(0).saturating_add(1);
        self.insert(node, load);
        load
    }

    /// Answering nodes, least loaded first.
    pub fn ranked(&self) -> impl Iterator<Item = (Backend, u32)> + '_ {
        self.order.iter().map(|&(load, node)| (node, load))
    }
}

/// Issues load probes through a shared connection pool.
#[derive(Debug, Clone)]
pub struct Prober {
    pool: NodeMonitorPool,
    timeout: Duration,
}

impl Prober {
    pub fn new(pool: NodeMonitorPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    /// Probe every node in `targets` concurrently.
    pub async fn probe(&self, app_id: &str, request_id: &str, targets: &[Backend]) -> LoadTable {
        let mut pending = JoinSet::new();
        for &node in targets {
            info!(target: "audit", event = "probe_launch", %request_id, %node);
            let pool = self.pool.clone();
            let app_id = app_id.to_string();
            let request_id = request_id.to_string();
            pending.spawn(async move {
                let result = probe_one(&pool, node, &app_id, &request_id).await;
                (node, result)
            });
        }

        let deadline = Instant::now() + self.timeout;
        let mut table = LoadTable::default();
        loop {
            match tokio::time::timeout_at(deadline, pending.join_next()).await {
                Ok(Some(Ok((node, Ok(load))))) => {
                    info!(
                        target: "audit",
                        event = "probe_completion",
                        %request_id,
                        %node,
                        queue_length = load,
                    );
                    table.insert(node, load);
                }
                Ok(Some(Ok((node, Err(e))))) => {
                    warn!(%request_id, %node, error = %e, "probe failed, node excluded");
                }
                Ok(Some(Err(e))) => {
                    error!(%request_id, error = %e, "probe task aborted");
                }
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        %request_id,
                        outstanding = pending.len(),
                        timeout_ms = self.timeout.as_millis() as u64,
                        "probe wait elapsed, continuing with partial answers"
                    );
                    break;
                }
            }
        }
        pending.abort_all();

        debug!(
            %request_id,
            probed = targets.len(),
            answered = table.len(),
            "probing finished"
        );
        table
    }
}

async fn probe_one(
    pool: &NodeMonitorPool,
    node: Backend,
    app_id: &str,
    request_id: &str,
) -> RpcResult<u32> {
    let mut client = pool.borrow(node).await?;
    let load = client.probe_load(app_id, request_id).await?;
    client.release();
    Ok(load)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tern_rpc::mock::{MockCluster, NodeBehavior};

    fn addr(i: u8) -> Backend {
        format!("10.0.0.{i}:20502").parse().unwrap()
    }

    #[test]
    fn table_orders_by_load_then_address() {
        let mut table = LoadTable::default();
        table.insert(addr(3), 2);
        table.insert(addr(1), 5);
        table.insert(addr(2), 2);

        let ranked: Vec<_> = table.ranked().collect();
        assert_eq!(ranked, vec![(addr(2), 2), (addr(3), 2), (addr(1), 5)]);
        assert_eq!(table.least_loaded(), Some(addr(2)));
    }

    #[test]
    fn table_insert_replaces_previous_load() {
        let mut table = LoadTable::default();
        table.insert(addr(1), 5);
        table.insert(addr(1), 0);

        assert_eq!(table.len(), 1);
        assert_eq!(table.ranked().count(), 1);
        assert_eq!(table.load(addr(1)), Some(0));
    }

    #[test]
    fn least_loaded_in_ignores_unanswered_candidates() {
        let mut table = LoadTable::default();
        table.insert(addr(1), 4);
        table.insert(addr(2), 1);

        assert_eq!(table.least_loaded_in(&[addr(1), addr(9)]), Some(addr(1)));
        assert_eq!(table.least_loaded_in(&[addr(9)]), None);
    }

    #[tokio::test]
    async fn probe_collects_all_answers() {
        let cluster = MockCluster::new();
        cluster.node(addr(1), 3).node(addr(2), 1);
        let prober = Prober::new(cluster.pool(), Duration::from_secs(1));

        let table = prober.probe("app", "r-0", &[addr(1), addr(2)]).await;

        assert_eq!(table.load(addr(1)), Some(3));
        assert_eq!(table.load(addr(2)), Some(1));
        assert_eq!(cluster.probes().len(), 2);
    }

    #[tokio::test]
    async fn failed_probe_excludes_node() {
        let cluster = MockCluster::new();
        cluster.node(addr(1), 3).set(addr(2), NodeBehavior {
            load: None,
            ..NodeBehavior::default()
        });
        cluster.unreachable(addr(3));
        let prober = Prober::new(cluster.pool(), Duration::from_secs(1));

        let table = prober.probe("app", "r-0", &[addr(1), addr(2), addr(3)]).await;

        assert_eq!(table.len(), 1);
        assert_eq!(table.load(addr(2)), None);
        assert_eq!(table.load(addr(3)), None);
    }

    #[tokio::test]
    async fn slow_probe_is_abandoned_at_deadline() {
        let cluster = MockCluster::new();
        cluster.node(addr(1), 3).set(addr(2), NodeBehavior {
            load: Some(0),
            probe_delay: Duration::from_secs(10),
            ..NodeBehavior::default()
        });
        let pool = cluster.pool();
        let prober = Prober::new(pool.clone(), Duration::from_millis(50));

        let started = Instant::now();
        let table = prober.probe("app", "r-0", &[addr(1), addr(2)]).await;

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(table.len(), 1);
        assert_eq!(table.least_loaded(), Some(addr(1)));
        // The answered connection went back to the pool; the abandoned one did not.
        assert_eq!(pool.idle_count(addr(1)), 1);
        assert_eq!(pool.idle_count(addr(2)), 0);
    }
}
