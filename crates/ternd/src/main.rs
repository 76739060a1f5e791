//! ternd: the tern scheduler daemon.
//!
//! Single binary that assembles the scheduler:
//! - Backend directory (from `[directory]`)
//! - Node monitor and frontend connection pools
//! - Scheduler with both placers
//! - REST API
//!
//! # Usage
//!
//! ```text
//! ternd run --config /etc/tern/tern.toml --audit-log /var/log/tern/audit.json
//! ternd check-config --config /etc/tern/tern.toml
//! ```

mod daemon;
mod logging;

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing::info;

use tern_core::TernConfig;

use crate::logging::LogFormat;

#[derive(Parser)]
#[command(name = "ternd", about = "Tern decentralized task scheduler")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the scheduler and its API server.
    Run {
        #[command(flatten)]
        config: ConfigArgs,

        /// Log output format.
        #[arg(long, value_enum, default_value = "text")]
        log_format: LogFormat,

        /// Append audit events as JSON lines to this file.
        #[arg(long)]
        audit_log: Option<PathBuf>,
    },
    /// Load and validate the configuration, then print it.
    CheckConfig {
        #[command(flatten)]
        config: ConfigArgs,
    },
}

#[derive(Args)]
struct ConfigArgs {
    /// Path to tern.toml. Built-in defaults are used when absent.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override `scheduler.listen`.
    #[arg(long)]
    listen: Option<SocketAddr>,

    /// Override `scheduler.advertise`.
    #[arg(long)]
    advertise: Option<SocketAddr>,
}

impl ConfigArgs {
    fn load(&self) -> anyhow::Result<TernConfig> {
        let mut config = match &self.config {
            Some(path) => TernConfig::from_file(path)?,
            None => TernConfig::default(),
        };
        if let Some(listen) = self.listen {
            config.scheduler.listen = listen;
        }
        if let Some(advertise) = self.advertise {
            config.scheduler.advertise = Some(advertise);
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            config,
            log_format,
            audit_log,
        } => {
            logging::init(log_format, audit_log.as_deref())?;
            let path = config.config.clone();
            let config = config.load()?;
            info!(?path, "configuration loaded");
            daemon::run(config).await
        }
        Command::CheckConfig { config } => {
            let config = config.load()?;
            println!("{config:#?}");
            Ok(())
        }
    }
}
