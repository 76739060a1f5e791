//! Scheduler: names, places and launches batches of tasks.
//!
//! The `Scheduler` is the request lifecycle owner that:
//! - Registers application frontends and starts watching their backends
//! - Rewrites special-case requests into pinned placements
//! - Routes each batch to the constrained or unconstrained placer
//! - Launches placed tasks without waiting for the nodes to acknowledge
//! - Relays task status messages to the registered frontend

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize};
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::{debug, error, info};

use tern_core::{
    FullTaskId, LaunchSpec, SchedulerConfig, SchedulingRequest, TaskPlacement, UserGroupInfo,
};
use tern_placement::{Assignment, ConstrainedPlacer, PlacerConfig, ProbingPlacer, TaskPlacer};
use tern_rpc::{FrontendPool, NodeMonitorClient, NodeMonitorPool, PooledClient};
use tern_state::BackendDirectory;

use crate::error::{SchedulerError, SchedulerResult};
use crate::request_id::RequestIds;
use crate::special_case::SpecialCase;

/// Client acquisition slower than this is reported.
const SLOW_ACQUIRE: Duration = Duration::from_millis(100);

/// The scheduler owns request ids, the special-case rotation and the
/// frontend registry. Placers are stateless between calls.
pub struct Scheduler {
    /// Address this scheduler is reachable at; prefixes request ids and
    /// receives status reports from workers.
    address: SocketAddr,
    directory: Arc<dyn BackendDirectory>,
    unconstrained: Arc<dyn TaskPlacer>,
    constrained: Arc<dyn TaskPlacer>,
    node_monitors: NodeMonitorPool,
    frontends: FrontendPool,
    /// Registered frontends: app_id → address.
    registry: Arc<RwLock<HashMap<String, SocketAddr>>>,
    request_ids: RequestIds,
    special_case: Option<SpecialCase>,
}

impl Scheduler {
    /// Create a scheduler with placers built from `config`.
    pub fn new(
        config: &SchedulerConfig,
        address: SocketAddr,
        directory: Arc<dyn BackendDirectory>,
        node_monitors: NodeMonitorPool,
        frontends: FrontendPool,
    ) -> Self {
        let unconstrained = ProbingPlacer::new(
            PlacerConfig::unconstrained(config),
            node_monitors.clone(),
        );
        let constrained =
            ConstrainedPlacer::new(PlacerConfig::constrained(config), node_monitors.clone());
        Self {
            address,
            directory,
            unconstrained: Arc::new(unconstrained),
            constrained: Arc::new(constrained),
            node_monitors,
            frontends,
            registry: Arc::new(RwLock::new(HashMap::new())),
            request_ids: RequestIds::new(address),
            special_case: config.special_task_set_size.map(SpecialCase::new),
        }
    }

    /// Draw request ids from `counter`.
    pub fn with_request_counter(mut self, counter: Arc<AtomicU64>) -> Self {
        self.request_ids = RequestIds::with_counter(self.address, counter);
        self
    }

    /// Draw the special-case rotation from `counter`. No effect when the
    /// special case is disabled.
    pub fn with_special_case_counter(mut self, counter: Arc<AtomicUsize>) -> Self {
        if let Some(sc) = &self.special_case {
            self.special_case = Some(SpecialCase::with_counter(sc.size(), counter));
        }
        self
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    /// Record the frontend of `app_id` and start watching its backends.
    ///
    /// `address` must resolve as `host:port`. Returns whether the
    /// directory accepted the application.
    pub async fn register_frontend(&self, app_id: &str, address: &str) -> SchedulerResult<bool> {
        debug!(%app_id, %address, "register frontend");
        let invalid = |reason: String| SchedulerError::InvalidAddress {
            address: address.to_string(),
            reason,
        };
        let resolved = tokio::net::lookup_host(address)
            .await
            .map_err(|e| invalid(e.to_string()))?
            .next()
            .ok_or_else(|| invalid("no address".to_string()));
        let frontend = match resolved {
            Ok(frontend) => frontend,
            Err(e) => {
                error!(%app_id, %address, "bad address from frontend");
                return Err(e);
            }
        };

        self.registry
            .write()
            .await
            .insert(app_id.to_string(), frontend);
        info!(%app_id, %frontend, "frontend registered");
        Ok(self.directory.watch_application(app_id))
    }

    /// Registered frontend of `app_id`, if any.
    pub async fn frontend(&self, app_id: &str) -> Option<SocketAddr> {
        self.registry.read().await.get(app_id).copied()
    }

    /// Place a batch and launch its tasks.
    ///
    /// Returns once every launch has been issued. A launch that fails
    /// afterwards is logged and does not change the outcome. Fails when
    /// the request is invalid, the special-case rewrite or placement
    /// fails, or a launch client cannot be acquired; launches issued
    /// before the failing acquisition are not recalled.
    pub async fn submit_job(&self, request: SchedulingRequest) -> SchedulerResult<()> {
        let started = Instant::now();
        request.validate()?;
        let mut request = self.apply_special_case(request)?;

        let request_id = self.request_ids.next_id();
        info!(
            target: "audit",
            event = "arrived",
            %request_id,
            tasks = request.tasks.len(),
            origin = %self.address,
            user = %request.user.user,
            description = %request.description,
            constrained = request.is_constrained(),
        );
        request.fill_default_resources();

        let assignments = self.place(&request, &request_id).await?;
        let probe_time = started.elapsed();

        for assignment in assignments {
            let client = self.acquire(assignment.node).await?;
            let task_id = assignment.task.task_id.clone();
            info!(target: "audit", event = "scheduler_launch", %request_id, %task_id);
            let spec = self.launch_spec(&request.app_id, &request_id, &request.user, assignment);
            tokio::spawn(launch(client, spec));
        }

        debug!(
            %request_id,
            total_ms = started.elapsed().as_millis() as u64,
            probe_ms = probe_time.as_millis() as u64,
            "all launches issued"
        );
        Ok(())
    }

    /// Compute where a batch would run without launching anything.
    ///
    /// The special-case rewrite is not applied.
    pub async fn get_placement(
        &self,
        request: SchedulingRequest,
    ) -> SchedulerResult<Vec<TaskPlacement>> {
        request.validate()?;
        let mut request = request;
        request.fill_default_resources();
        let request_id = self.request_ids.next_id();

        let assignments = self.place(&request, &request_id).await?;
        let placements: Vec<TaskPlacement> =
            assignments.iter().map(Assignment::placement).collect();
        debug!(%request_id, placements = placements.len(), "returning task placement");
        Ok(placements)
    }

    /// Deliver a task status update to the frontend of `app_id`.
    ///
    /// No retry. The frontend connection is pooled again only after a
    /// successful delivery.
    pub async fn send_frontend_message(
        &self,
        app_id: &str,
        task: &FullTaskId,
        status: i32,
        message: &[u8],
    ) -> SchedulerResult<()> {
        info!(target: "audit", event = "frontend_message", %app_id, %task, status);
        let Some(frontend) = self.frontend(app_id).await else {
            error!(%app_id, "message for unregistered application");
            return Err(SchedulerError::UnknownApplication(app_id.to_string()));
        };

        let mut client = match self.frontends.borrow(frontend).await {
            Ok(client) => client,
            Err(e) => {
                error!(%app_id, %frontend, error = %e, "frontend connection failed");
                return Err(e.into());
            }
        };
        match client.frontend_message(task, status, message).await {
            Ok(()) => {
                client.release();
                Ok(())
            }
            Err(e) => {
                error!(%app_id, %frontend, %task, error = %e, "frontend message delivery failed");
                Err(e.into())
            }
        }
    }

    // ── Internal helpers ────────────────────────────────────────────

    fn apply_special_case(&self, request: SchedulingRequest) -> SchedulerResult<SchedulingRequest> {
        match &self.special_case {
            Some(sc) if sc.matches(&request) => {
                info!(
                    app_id = %request.app_id,
                    tasks = request.tasks.len(),
                    "handling special case request"
                );
                let backends = self.directory.backends(&request.app_id)?;
                sc.rewrite(request, &backends)
            }
            _ => Ok(request),
        }
    }

    async fn place(
        &self,
        request: &SchedulingRequest,
        request_id: &str,
    ) -> SchedulerResult<Vec<Assignment>> {
        let backends = self.directory.backends(&request.app_id)?;
        let placer = if request.is_constrained() {
            &self.constrained
        } else {
            &self.unconstrained
        };
        let assignments = placer
            .place_tasks(
                &request.app_id,
                request_id,
                &backends,
                &request.tasks,
                request.probe_ratio,
            )
            .await
            .inspect_err(|e| error!(%request_id, error = %e, "placement failed"))?;
        Ok(assignments)
    }

    async fn acquire(
        &self,
        node: SocketAddr,
    ) -> SchedulerResult<PooledClient<Box<dyn NodeMonitorClient>>> {
        let started = Instant::now();
        let client = self
            .node_monitors
            .borrow(node)
            .await
            .inspect_err(|e| error!(%node, error = %e, "launch client unavailable"))?;
        let waited = started.elapsed();
        if waited > SLOW_ACQUIRE {
            error!(
                %node,
                waited_ms = waited.as_millis() as u64,
                "took more than 100ms to acquire launch client"
            );
        }
        Ok(client)
    }

    fn launch_spec(
        &self,
        app_id: &str,
        request_id: &str,
        user: &UserGroupInfo,
        assignment: Assignment,
    ) -> LaunchSpec {
        let resources = assignment.task.resources();
        LaunchSpec {
            task: FullTaskId {
                app_id: app_id.to_string(),
                frontend: self.address.to_string(),
                request_id: request_id.to_string(),
                task_id: assignment.task.task_id,
            },
            user: user.clone(),
            message: assignment.task.message,
            resources,
        }
    }
}

/// Send one launch; the client is pooled again only if the node acked.
async fn launch(mut client: PooledClient<Box<dyn NodeMonitorClient>>, spec: LaunchSpec) {
    let node = client.addr();
    match client.launch_task(&spec).await {
        Ok(()) => {
            debug!(task = %spec.task, %node, "task launched");
            client.release();
        }
        Err(e) => {
            error!(task = %spec.task, %node, error = %e, "error launching task");
        }
    }
}
