//! Placer for batches where tasks name the nodes they may run on.
//!
//! Every preferred node that the directory knows about is probed. Tasks
//! without a preference share a random fill of the remaining backends,
//! sized by the probe ratio. A task is only ever bound inside its own
//! candidate set.

use std::collections::HashSet;

use async_trait::async_trait;
use rand::seq::SliceRandom;
use tracing::{debug, warn};

use tern_core::{Backend, Task};
use tern_rpc::NodeMonitorPool;

use crate::error::{PlacementError, PlacementResult};
use crate::placer::{Assignment, PlacerConfig, TaskPlacer, bind_greedy, probe_count};
use crate::probe::Prober;

/// Preference-aware probing placer.
#[derive(Debug, Clone)]
pub struct ConstrainedPlacer {
    config: PlacerConfig,
    prober: Prober,
}

impl ConstrainedPlacer {
    pub fn new(config: PlacerConfig, pool: NodeMonitorPool) -> Self {
        Self {
            prober: Prober::new(pool, config.probe_timeout),
            config,
        }
    }
}

#[async_trait]
impl TaskPlacer for ConstrainedPlacer {
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

        let candidates = candidate_sets(request_id, backends, tasks)?;
        let ratio = self.config.ratio(probe_ratio);
        let targets = probe_targets(&candidates, backends, ratio);
        debug!(
            %request_id,
            tasks = tasks.len(),
            backends = backends.len(),
            probes = targets.len(),
            ratio,
            "probing for constrained placement"
        );

        let mut table = self.prober.probe(app_id, request_id, &targets).await;
        if table.is_empty() {
            return Err(PlacementError::NoProbeResponses(request_id.to_string()));
        }

        let mut stuck = None;
        let placed = bind_greedy(request_id, tasks, &mut table, |i| {
            stuck = Some(i);
            candidates[i].as_deref()
        });
        match (placed, stuck) {
            (Some(assignments), _) => Ok(assignments),
            (None, Some(i)) if candidates[i].is_some() => Err(
                PlacementError::PreferredUnresponsive(tasks[i].task_id.clone()),
            ),
            (None, _) => Err(PlacementError::NoProbeResponses(request_id.to_string())),
        }
    }
}

/// Per-task candidate nodes: `None` for any node, otherwise the task's
/// preferences that the directory knows about, in preference order.
fn candidate_sets(
    request_id: &str,
    backends: &[Backend],
    tasks: &[Task],
) -> PlacementResult<Vec<Option<Vec<Backend>>>> {
    let known: HashSet<Backend> = backends.iter().copied().collect();
    tasks
        .iter()
        .map(|task| {
            if !task.is_constrained() {
                return Ok(None);
            }
            let mut seen = HashSet::new();
            let eligible: Vec<Backend> = task
                .preference
                .iter()
                .copied()
                .filter(|node| known.contains(node) && seen.insert(*node))
                .collect();
            if eligible.len() < task.preference.len() {
                debug!(
                    %request_id,
                    task_id = %task.task_id,
                    preferred = task.preference.len(),
                    eligible = eligible.len(),
                    "dropped preferred nodes unknown to the directory"
                );
            }
            if eligible.is_empty() {
                warn!(%request_id, task_id = %task.task_id, "no eligible backend for task");
                return Err(PlacementError::NoEligibleBackends(task.task_id.clone()));
            }
            Ok(Some(eligible))
        })
        .collect()
}

/// Union of the explicit candidate sets, plus a random fill for tasks
/// that accept any node.
fn probe_targets(
    candidates: &[Option<Vec<Backend>>],
    backends: &[Backend],
    ratio: f64,
) -> Vec<Backend> {
    let mut seen = HashSet::new();
    let mut targets: Vec<Backend> = candidates
        .iter()
        .flatten()
        .flatten()
        .copied()
        .filter(|node| seen.insert(*node))
        .collect();

    let open = candidates.iter().filter(|c| c.is_none()).count();
    if open > 0 {
        let wanted = probe_count(ratio, open, backends.len());
        let rest: Vec<Backend> = backends
            .iter()
            .copied()
            .filter(|node| !seen.contains(node))
            .collect();
        let fill = wanted.saturating_sub(targets.len()).min(rest.len());
        let mut rng = rand::thread_rng();
        targets.extend(rest.choose_multiple(&mut rng, fill).copied());
    }
    targets
}
