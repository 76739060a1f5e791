//! tern-placement: decides which worker node runs each task.
//!
//! Placement never consults a global view of cluster load. For every
//! batch it probes a bounded sample of node monitors concurrently, waits
//! for their answers up to a deadline, and greedily binds tasks to the
//! least-loaded nodes that answered.
//!
//! # Components
//!
//! - **`placer`**: `TaskPlacer` contract, probe-count sizing
//! - **`probe`**: concurrent probe fan-out and the per-batch `LoadTable`
//! - **`unconstrained`**: `ProbingPlacer`, random sample of any backends
//! - **`constrained`**: `ConstrainedPlacer`, honours per-task node preferences

pub mod constrained;
pub mod error;
pub mod placer;
pub mod probe;
pub mod unconstrained;

pub use constrained::ConstrainedPlacer;
pub use error::{PlacementError, PlacementResult};
pub use placer::{Assignment, PlacerConfig, TaskPlacer, probe_count};
pub use probe::{LoadTable, Prober};
pub use unconstrained::ProbingPlacer;
