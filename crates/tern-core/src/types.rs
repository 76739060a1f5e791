//! Domain types for scheduling requests and task routing.
//!
//! Requests arrive from frontends as JSON, so every type here is
//! serializable. Binary task payloads travel as hex strings.

use std::collections::HashSet;
use std::fmt;
use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Identifier an application registers under.
pub type AppId = String;

/// Identifier the scheduler assigns to an accepted request.
pub type RequestId = String;

/// A worker node, addressed by its node monitor's socket address.
pub type Backend = SocketAddr;

// ── Resources ─────────────────────────────────────────────────────

/// Estimated resources a task needs on its worker node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceVector {
    /// Memory in megabytes.
    pub memory_mb: u64,
    /// Core-equivalent slots.
    pub cores: u32,
}

impl ResourceVector {
    /// Estimate given to tasks that do not declare one: a single slot.
    pub const MINIMAL: ResourceVector = ResourceVector {
        memory_mb: 0,
        cores: 1,
    };

    pub fn new(memory_mb: u64, cores: u32) -> Self {
        Self { memory_mb, cores }
    }
}

impl Default for ResourceVector {
    fn default() -> Self {
        Self::MINIMAL
    }
}

/// Identity a request is submitted under.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserGroupInfo {
    pub user: String,
    pub group: String,
}

impl UserGroupInfo {
    pub fn new(user: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            group: group.into(),
        }
    }
}

// ── Requests ──────────────────────────────────────────────────────

/// A single unit of work inside a scheduling request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique within the owning request.
    pub task_id: String,
    /// Opaque payload handed to the worker at launch.
    #[serde(default, with = "hex_bytes")]
    pub message: Vec<u8>,
    #[serde(default)]
    pub estimated_resources: Option<ResourceVector>,
    /// Nodes this task may run on. Empty means any node.
    #[serde(default)]
    pub preference: Vec<Backend>,
}

impl Task {
    pub fn new(task_id: impl Into<String>, message: impl Into<Vec<u8>>) -> Self {
        Self {
            task_id: task_id.into(),
            message: message.into(),
            estimated_resources: None,
            preference: Vec::new(),
        }
    }

    pub fn with_resources(mut self, resources: ResourceVector) -> Self {
        self.estimated_resources = Some(resources);
        self
    }

    pub fn with_preference(mut self, nodes: impl IntoIterator<Item = Backend>) -> Self {
        self.preference = nodes.into_iter().collect();
        self
    }

    /// Whether this task restricts the nodes it may be placed on.
    pub fn is_constrained(&self) -> bool {
        !self.preference.is_empty()
    }

    /// The declared resource estimate, or [`ResourceVector::MINIMAL`].
    pub fn resources(&self) -> ResourceVector {
        self.estimated_resources.unwrap_or_default()
    }
}

/// A batch of tasks submitted by a frontend in one call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulingRequest {
    pub app_id: AppId,
    #[serde(default)]
    pub user: UserGroupInfo,
    pub tasks: Vec<Task>,
    /// Overrides the configured probe ratio for this request only.
    #[serde(default)]
    pub probe_ratio: Option<f64>,
    #[serde(default)]
    pub description: String,
}

impl SchedulingRequest {
    pub fn new(app_id: impl Into<String>, tasks: Vec<Task>) -> Self {
        Self {
            app_id: app_id.into(),
            user: UserGroupInfo::default(),
            tasks,
            probe_ratio: None,
            description: String::new(),
        }
    }

    pub fn with_user(mut self, user: UserGroupInfo) -> Self {
        self.user = user;
        self
    }

    pub fn with_probe_ratio(mut self, ratio: f64) -> Self {
        self.probe_ratio = Some(ratio);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Whether any task declares a node preference.
    pub fn is_constrained(&self) -> bool {
        self.tasks.iter().any(Task::is_constrained)
    }

    /// Give every task without a resource estimate the minimal one.
    pub fn fill_default_resources(&mut self) {
        for task in &mut self.tasks {
            task.estimated_resources.get_or_insert(ResourceVector::MINIMAL);
        }
    }

    /// Reject requests that cannot be scheduled regardless of cluster state.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.app_id.trim().is_empty() {
            return Err(ValidationError::EmptyAppId);
        }
        if self.tasks.is_empty() {
            return Err(ValidationError::NoTasks);
        }
        if let Some(ratio) = self.probe_ratio {
            if !ratio.is_finite() || ratio <= 0.0 {
                return Err(ValidationError::InvalidProbeRatio(ratio));
            }
        }
        let mut seen = HashSet::with_capacity(self.tasks.len());
        for task in &self.tasks {
            if !seen.insert(task.task_id.as_str()) {
                return Err(ValidationError::DuplicateTaskId(task.task_id.clone()));
            }
        }
        Ok(())
    }
}

// ── Routing ───────────────────────────────────────────────────────

/// Composite handle a worker uses to report task status.
///
/// `frontend` is the address status reports are sent to: the scheduler
/// that launched the task, which relays them to the application's
/// registered frontend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FullTaskId {
    pub app_id: AppId,
    pub frontend: String,
    pub request_id: RequestId,
    pub task_id: String,
}

impl fmt::Display for FullTaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}@{}",
            self.app_id, self.request_id, self.task_id, self.frontend
        )
    }
}

/// The node chosen for one task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskPlacement {
    pub task_id: String,
    pub node: Backend,
}

/// Everything a node monitor needs to start a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaunchSpec {
    pub task: FullTaskId,
    pub user: UserGroupInfo,
    #[serde(with = "hex_bytes")]
    pub message: Vec<u8>,
    pub resources: ResourceVector,
}

/// Serde adapter encoding byte payloads as lowercase hex strings.
pub mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> Backend {
        s.parse().unwrap()
    }

    #[test]
    fn missing_resources_default_to_minimal() {
        let mut req = SchedulingRequest::new(
            "app",
            vec![
                Task::new("t0", b"a".to_vec()),
                Task::new("t1", b"b".to_vec()).with_resources(ResourceVector::new(512, 4)),
            ],
        );
        req.fill_default_resources();

        assert_eq!(req.tasks[0].estimated_resources, Some(ResourceVector::MINIMAL));
        assert_eq!(req.tasks[1].resources(), ResourceVector::new(512, 4));
    }

    #[test]
    fn constrained_when_any_task_has_preference() {
        let mut req = SchedulingRequest::new(
            "app",
            vec![Task::new("t0", vec![]), Task::new("t1", vec![])],
        );
        assert!(!req.is_constrained());

        req.tasks[1].preference = vec![addr("10.0.0.1:20502")];
        assert!(req.is_constrained());
    }

    #[test]
    fn validate_rejects_empty_requests() {
        let req = SchedulingRequest::new("app", vec![]);
        assert_eq!(req.validate(), Err(ValidationError::NoTasks));

        let req = SchedulingRequest::new("  ", vec![Task::new("t0", vec![])]);
        assert_eq!(req.validate(), Err(ValidationError::EmptyAppId));
    }

    #[test]
    fn validate_rejects_duplicate_task_ids() {
        let req = SchedulingRequest::new(
            "app",
            vec![Task::new("t0", vec![]), Task::new("t0", vec![])],
        );
        assert_eq!(
            req.validate(),
            Err(ValidationError::DuplicateTaskId("t0".to_string()))
        );
    }

    #[test]
    fn validate_rejects_bad_probe_ratio() {
        let req =
            SchedulingRequest::new("app", vec![Task::new("t0", vec![])]).with_probe_ratio(0.0);
        assert!(matches!(req.validate(), Err(ValidationError::InvalidProbeRatio(_))));

        let req =
            SchedulingRequest::new("app", vec![Task::new("t0", vec![])]).with_probe_ratio(f64::NAN);
        assert!(matches!(req.validate(), Err(ValidationError::InvalidProbeRatio(_))));
    }

    #[test]
    fn request_deserializes_with_defaults() {
        let json = r#"{
            "app_id": "spark",
            "tasks": [
                { "task_id": "0", "message": "cafe" },
                { "task_id": "1", "preference": ["10.0.0.2:20502"] }
            ]
        }"#;
        let req: SchedulingRequest = serde_json::from_str(json).unwrap();

        assert_eq!(req.app_id, "spark");
        assert_eq!(req.user, UserGroupInfo::default());
        assert_eq!(req.tasks[0].message, vec![0xca, 0xfe]);
        assert!(req.tasks[1].message.is_empty());
        assert_eq!(req.tasks[1].preference, vec![addr("10.0.0.2:20502")]);
        assert_eq!(req.probe_ratio, None);
    }

    #[test]
    fn payload_rejects_invalid_hex() {
        let json = r#"{ "task_id": "0", "message": "xyz" }"#;
        assert!(serde_json::from_str::<Task>(json).is_err());
    }

    #[test]
    fn full_task_id_display() {
        let id = FullTaskId {
            app_id: "spark".to_string(),
            frontend: "10.0.0.5:20503".to_string(),
            request_id: "10.0.0.5:20503_7".to_string(),
            task_id: "3".to_string(),
        };
        assert_eq!(id.to_string(), "spark/10.0.0.5:20503_7/3@10.0.0.5:20503");
    }
}
