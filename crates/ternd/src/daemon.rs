//! Scheduler wiring and the serve loop.

use std::sync::Arc;

use tracing::{error, info};

use tern_core::{DeploymentMode, TernConfig};
use tern_rpc::{FrontendPool, HttpFrontendConnector, HttpNodeMonitorConnector, NodeMonitorPool};
use tern_scheduler::Scheduler;
use tern_state::{BackendDirectory, StaticDirectory};

/// Backend directory for the configured deployment mode.
pub fn build_directory(config: &TernConfig) -> Arc<dyn BackendDirectory> {
    match config.scheduler.deployment_mode {
        DeploymentMode::ConfigBased => Arc::new(StaticDirectory::from_config(&config.directory)),
    }
}

/// Scheduler talking HTTP to node monitors and frontends.
pub fn build_scheduler(config: &TernConfig, directory: Arc<dyn BackendDirectory>) -> Scheduler {
    let s = &config.scheduler;
    let node_monitors = NodeMonitorPool::new(Arc::new(
        HttpNodeMonitorConnector::new(s.connect_timeout).with_request_timeout(s.rpc_timeout),
    ))
    .with_max_idle(s.max_idle_per_node);
    let frontends = FrontendPool::new(Arc::new(
        HttpFrontendConnector::new(s.connect_timeout).with_request_timeout(s.rpc_timeout),
    ))
    .with_max_idle(s.max_idle_per_node);
    Scheduler::new(s, s.advertised_address(), directory, node_monitors, frontends)
}

/// Serve the API until Ctrl-C.
pub async fn run(config: TernConfig) -> anyhow::Result<()> {
    info!(
        mode = ?config.scheduler.deployment_mode,
        listen = %config.scheduler.listen,
        advertise = %config.scheduler.advertised_address(),
        "tern scheduler starting"
    );

    let directory = build_directory(&config);
    let scheduler = Arc::new(build_scheduler(&config, directory));
    if let Some(size) = config.scheduler.special_task_set_size {
        info!(size, "special case enabled");
    }

    let router = tern_api::build_router(scheduler);
    let listener = tokio::net::TcpListener::bind(config.scheduler.listen).await?;
    info!(addr = %listener.local_addr()?, "API server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("tern scheduler stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received"),
        Err(e) => error!(error = %e, "failed to listen for shutdown signal"),
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use super::*;

    const CONFIG: &str = r#"
[scheduler]
listen = "127.0.0.1:0"
advertise = "10.0.0.100:20503"
special_task_set_size = 2

[directory]
backends = ["10.0.0.1:20502", "10.0.0.2:20502", "10.0.0.1:20502"]

[directory.apps.analytics]
backends = ["10.0.0.9:20502"]
"#;

    #[test]
    fn config_based_directory_uses_overrides() {
        let config = TernConfig::from_toml_str(CONFIG).unwrap();
        let directory = build_directory(&config);

        assert_eq!(directory.backends("spark").unwrap().len(), 2);
        assert_eq!(
            directory.backends("analytics").unwrap(),
            vec!["10.0.0.9:20502".parse::<SocketAddr>().unwrap()]
        );
    }

    #[test]
    fn scheduler_uses_advertised_address() {
        let config = TernConfig::from_toml_str(CONFIG).unwrap();
        let scheduler = build_scheduler(&config, build_directory(&config));

        assert_eq!(scheduler.address(), "10.0.0.100:20503".parse::<SocketAddr>().unwrap());
    }

    #[test]
    fn config_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tern.toml");
        std::fs::write(&path, CONFIG).unwrap();

        let config = TernConfig::from_file(&path).unwrap();
        assert_eq!(config.scheduler.special_task_set_size, Some(2));
    }
}
