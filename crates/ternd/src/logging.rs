//! Tracing subscriber setup.
//!
//! Console output honours `RUST_LOG`. Audit events (target `audit`) can
//! additionally be written to their own file as JSON lines.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use clap::ValueEnum;
use tracing::Level;
use tracing_subscriber::filter::{EnvFilter, Targets};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{Layer, Registry, fmt};

const DEFAULT_FILTER: &str = "info,ternd=debug,tern=debug";

/// Target audit events are emitted on.
pub const AUDIT_TARGET: &str = "audit";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Install the global subscriber.
pub fn init(format: LogFormat, audit_log: Option<&Path>) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let console: Box<dyn Layer<Registry> + Send + Sync> = match format {
        LogFormat::Text => fmt::layer().boxed(),
        LogFormat::Json => fmt::layer().json().boxed(),
    };

    let audit = match audit_log {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                fmt::layer()
                    .json()
                    .with_writer(Mutex::new(file))
                    .with_filter(audit_only()),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console.with_filter(filter))
        .with(audit)
        .try_init()?;
    Ok(())
}

fn audit_only() -> Targets {
    Targets::new().with_target(AUDIT_TARGET, Level::INFO)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audit_filter_passes_only_audit_target() {
        let filter = audit_only();
        assert!(filter.would_enable(AUDIT_TARGET, &Level::INFO));
        assert!(!filter.would_enable("tern_scheduler::scheduler", &Level::INFO));
        assert!(!filter.would_enable(AUDIT_TARGET, &Level::DEBUG));
    }
}
