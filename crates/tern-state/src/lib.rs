//! tern-state: backend directory for Tern.
//!
//! The scheduler never owns cluster membership. It asks a
//! [`BackendDirectory`] for the current backends of an application and
//! treats the answer as a snapshot valid for a single placement call.
//!
//! # Implementations
//!
//! - **`StaticDirectory`**: backends listed in the daemon config
//!   (`deployment_mode = "configbased"`), with per-application overrides
//!   and runtime replacement for membership changes.

pub mod directory;
pub mod error;

pub use directory::{BackendDirectory, StaticDirectory};
pub use error::{StateError, StateResult};
