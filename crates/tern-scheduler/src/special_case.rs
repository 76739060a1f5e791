//! Deterministic partition placement.
//!
//! A request with exactly the configured number of tasks, none of which
//! already names a three-node preference, is pinned onto one third of the
//! application's backends. Consecutive hits rotate through the thirds.
//! Third `k` holds the backends whose position in the directory snapshot
//! is `k` modulo 3.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use rand::seq::SliceRandom;
use tracing::{error, info};

use tern_core::{Backend, SchedulingRequest};

use crate::error::{SchedulerError, SchedulerResult};

/// Preference size that opts a request out of the rewrite.
const OPT_OUT_PREFERENCE: usize = 3;

/// Rewrites matching requests into single-node preferences.
#[derive(Debug, Clone)]
pub struct SpecialCase {
    size: usize,
    counter: Arc<AtomicUsize>,
}

impl SpecialCase {
    pub fn new(size: usize) -> Self {
        Self::with_counter(size, Arc::new(AtomicUsize::new(0)))
    }

    /// Rotation drawn from an existing counter of previous hits.
    pub fn with_counter(size: usize, counter: Arc<AtomicUsize>) -> Self {
        Self { size, counter }
    }

    /// Task count that triggers the rewrite.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn matches(&self, request: &SchedulingRequest) -> bool {
        request.tasks.len() == self.size
            && !request
                .tasks
                .iter()
                .any(|t| t.preference.len() == OPT_OUT_PREFERENCE)
    }

    /// Pin every task of `request` to its own backend of the next third.
    ///
    /// Needs at least three backends per task. The rotation advances even
    /// when the rewrite fails.
    pub fn rewrite(
        &self,
        mut request: SchedulingRequest,
        backends: &[Backend],
    ) -> SchedulerResult<SchedulingRequest> {
        let index = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        if !(1..=3).contains(&index) {
            error!(index, app_id = %request.app_id, "special case index outside 1..=3");
        }
        let bucket = (index - 1) % 3;

        let needed = self.size * 3;
        if backends.len() < needed {
            error!(
                app_id = %request.app_id,
                needed,
                available = backends.len(),
                "special case needs three backends per task"
            );
            return Err(SchedulerError::NotEnoughBackends {
                needed,
                available: backends.len(),
            });
        }

        let mut third: Vec<Backend> = backends
            .iter()
            .enumerate()
            .filter(|(i, _)| i % 3 == bucket)
            .map(|(_, &node)| node)
            .collect();
        third.shuffle(&mut rand::thread_rng());

        for (task, &node) in request.tasks.iter_mut().zip(&third) {
            task.preference = vec![node];
        }
        info!(
            app_id = %request.app_id,
            index,
            bucket,
            nodes = ?&third[..request.tasks.len().min(third.len())],
            "special case request pinned"
        );
        Ok(request)
    }
}
