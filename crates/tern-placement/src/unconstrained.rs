//! Placer for batches without node preferences.
//!
//! Probes `probe_count(ratio, tasks, backends)` distinct backends chosen
//! uniformly at random and binds tasks greedily to the least-loaded
//! answers.

use async_trait::async_trait;
use rand::seq::SliceRandom;
use tracing::debug;

use tern_core::{Backend, Task};
use tern_rpc::NodeMonitorPool;

use crate::error::{PlacementError, PlacementResult};
use crate::placer::{Assignment, PlacerConfig, TaskPlacer, bind_greedy, probe_count};
use crate::probe::Prober;

/// Power-of-many-choices placer: sample, probe, bind to the least loaded.
#[derive(Debug, Clone)]
pub struct ProbingPlacer {
    config: PlacerConfig,
    prober: Prober,
}

impl ProbingPlacer {
    pub fn new(config: PlacerConfig, pool: NodeMonitorPool) -> Self {
        Self {
            prober: Prober::new(pool, config.probe_timeout),
            config,
        }
    }
}

#[async_trait]
impl TaskPlacer for ProbingPlacer {
    async fn place_tasks(
        &self,
        app_id: &str,
        request_id: &str,
        backends: &[Backend],
        tasks: &[Task],
        probe_ratio: Option<f64>,
    ) -> PlacementResult<Vec<Assignment>> {
        if backends.is_empty() {
            return Err(PlacementError::NoBackends(app_id.to_string()));
        }
        if tasks.is_empty() {
            return Ok(Vec::new());
        }

        let ratio = self.config.ratio(probe_ratio);
        let count = probe_count(ratio, tasks.len(), backends.len());
        let targets = sample(backends, count);
        debug!(
            %request_id,
            tasks = tasks.len(),
            backends = backends.len(),
            probes = targets.len(),
            ratio,
            "probing for unconstrained placement"
        );

        let mut table = self.prober.probe(app_id, request_id, &targets).await;
        if table.is_empty() {
            return Err(PlacementError::NoProbeResponses(request_id.to_string()));
        }

        bind_greedy(request_id, tasks, &mut table, |_| None)
            .ok_or_else(|| PlacementError::NoProbeResponses(request_id.to_string()))
    }
}

/// `count` distinct backends chosen uniformly at random.
fn sample(backends: &[Backend], count: usize) -> Vec<Backend> {
    let mut rng = rand::thread_rng();
    backends.choose_multiple(&mut rng, count).copied().collect()
}
