//! Placement contract shared by both placers.

use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use tern_core::{Backend, SchedulerConfig, Task, TaskPlacement};

use crate::error::PlacementResult;
use crate::probe::LoadTable;

/// A task together with the node it was bound to.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub task: Task,
    pub node: Backend,
}

impl Assignment {
    pub fn placement(&self) -> TaskPlacement {
        TaskPlacement {
            task_id: self.task.task_id.clone(),
            node: self.node,
        }
    }
}

/// Decides a node for every task of a batch.
///
/// Implementations are stateless across calls: the backend list is a
/// snapshot owned by the caller and must not be cached.
#[async_trait]
pub trait TaskPlacer: Send + Sync {
    /// Place `tasks` on `backends`.
    ///
    /// Returns one assignment per task, in task order, or fails the whole
    /// batch. `probe_ratio` overrides the configured ratio when set.
    async fn place_tasks(
        &self,
        app_id: &str,
        request_id: &str,
        backends: &[Backend],
        tasks: &[Task],
        probe_ratio: Option<f64>,
    ) -> PlacementResult<Vec<Assignment>>;
}

/// Tunables of a probing placer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacerConfig {
    /// Probes per task.
    pub probe_ratio: f64,
    /// How long to wait for probe answers.
    pub probe_timeout: Duration,
}

impl PlacerConfig {
    /// Settings for the unconstrained placer.
    pub fn unconstrained(config: &SchedulerConfig) -> Self {
        Self {
            probe_ratio: config.probe_ratio,
            probe_timeout: config.probe_timeout,
        }
    }

    /// Settings for the constrained placer.
    pub fn constrained(config: &SchedulerConfig) -> Self {
        Self {
            probe_ratio: config.constrained_probe_ratio,
            probe_timeout: config.probe_timeout,
        }
    }

    pub(crate) fn ratio(&self, request_override: Option<f64>) -> f64 {
        request_override
            .filter(|r| r.is_finite() && *r > 0.0)
            .unwrap_or(self.probe_ratio)
    }
}

/// Number of nodes to probe for `tasks` tasks out of `available`.
///
/// `ceil(ratio * tasks)`, never fewer than `tasks`, never more than
/// `available`.
pub fn probe_count(ratio: f64, tasks: usize, available: usize) -> usize {
    let wanted = (ratio * tasks as f64).ceil();
    let wanted = if wanted.is_finite() && wanted > 0.0 {
        wanted as usize
    } else {
        0
    };
    wanted.max(tasks).min(available)
}

/// Bind tasks in order to their least-loaded eligible node.
///
/// `eligible` returns the nodes a task may use, or `None` for any node.
/// Each binding raises the chosen node's load by one so later tasks of
/// the same batch see it.
pub(crate) fn bind_greedy<'a, F>(
    request_id: &str,
    tasks: &[Task],
    table: &mut LoadTable,
    mut eligible: F,
) -> Option<Vec<Assignment>>
where
    F: FnMut(usize) -> Option<&'a [Backend]>,
{
    let mut assignments = Vec::with_capacity(tasks.len());
    for (i, task) in tasks.iter().enumerate() {
        let node = match eligible(i) {
            None => table.least_loaded(),
            Some(nodes) => table.least_loaded_in(nodes),
        }?;
        let load = table.bind(node);
        info!(
            target: "audit",
            event = "assigned_task",
            %request_id,
            task_id = %task.task_id,
            %node,
            load,
        );
        assignments.push(Assignment {
            task: task.clone(),
            node,
        });
    }
    Some(assignments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_count_scales_with_ratio() {
        assert_eq!(probe_count(2.0, 2, 5), 4);
        assert_eq!(probe_count(1.05, 10, 100), 11);
        assert_eq!(probe_count(1.5, 3, 100), 5);
    }

    #[test]
    fn probe_count_never_below_task_count() {
        assert_eq!(probe_count(0.5, 4, 100), 4);
        assert_eq!(probe_count(1.0, 1, 10), 1);
    }

    #[test]
    fn probe_count_bounded_by_backends() {
        assert_eq!(probe_count(2.0, 10, 3), 3);
        assert_eq!(probe_count(2.0, 1, 1), 1);
        assert_eq!(probe_count(2.0, 1, 0), 0);
    }

    #[test]
    fn request_override_replaces_ratio() {
        let config = PlacerConfig {
            probe_ratio: 1.05,
            probe_timeout: Duration::from_millis(50),
        };
        assert_eq!(config.ratio(None), 1.05);
        assert_eq!(config.ratio(Some(3.0)), 3.0);
        assert_eq!(config.ratio(Some(-1.0)), 1.05);
    }

    #[test]
    fn greedy_binding_updates_load() {
        let a: Backend = "10.0.0.1:1".parse().unwrap();
        let b: Backend = "10.0.0.2:1".parse().unwrap();
        let mut table = LoadTable::default();
        table.insert(a, 3);
        table.insert(b, 1);

        let tasks: Vec<Task> = (0..4).map(|i| Task::new(i.to_string(), vec![])).collect();
        let assigned = bind_greedy("r", &tasks, &mut table, |_| None).unwrap();
        let nodes: Vec<Backend> = assigned.iter().map(|a| a.node).collect();

        // b: 1 → 2 → 3, tie with a at 3 goes to the lower address (a).
        assert_eq!(nodes, vec![b, b, a, b]);
        assert_eq!(table.load(a), Some(4));
        assert_eq!(table.load(b), Some(4));
    }

    #[test]
    fn greedy_binding_fails_without_eligible_answer() {
        let a: Backend = "10.0.0.1:1".parse().unwrap();
        let c: Backend = "10.0.0.3:1".parse().unwrap();
        let mut table = LoadTable::default();
        table.insert(a, 0);

        let tasks = vec![Task::new("0", vec![])];
        let only_c = [c];
        assert!(bind_greedy("r", &tasks, &mut table, |_| Some(&only_c[..])).is_none());
    }
}
