//! tern-core: shared domain types and configuration for Tern.
//!
//! Everything that crosses a crate boundary lives here: the shape of a
//! scheduling request and its tasks, the identifiers used to route task
//! status back to frontends, and the daemon's TOML configuration.

pub mod config;
pub mod error;
pub mod types;

pub use config::{
    AppBackends, DeploymentMode, DirectoryConfig, SchedulerConfig, TernConfig, parse_duration,
};
pub use error::{ConfigError, ConfigResult, ValidationError};
pub use types::*;
