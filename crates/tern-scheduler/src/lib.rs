//! tern-scheduler: request lifecycle orchestration.
//!
//! The `Scheduler` takes a batch of tasks from a frontend, names it,
//! decides where each task runs and launches the tasks on their nodes.
//!
//! # Architecture
//!
//! ```text
//! Scheduler
//!   ├── RequestIds (atomic, "<address>_<n>")
//!   ├── SpecialCase (rotating thirds of the cluster, optional)
//!   ├── BackendDirectory (per-app backend snapshot)
//!   ├── ProbingPlacer / ConstrainedPlacer (picked per request)
//!   ├── NodeMonitorPool (probes and launches)
//!   └── Frontend registry + FrontendPool (status relay)
//! ```
//!
//! Audit events are emitted on the `audit` tracing target.

pub mod error;
pub mod request_id;
pub mod scheduler;
pub mod special_case;

pub use error::{SchedulerError, SchedulerResult};
pub use request_id::RequestIds;
pub use scheduler::Scheduler;
pub use special_case::SpecialCase;
