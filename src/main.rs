//! sws: fair, plugin-routed request server.
//!
//! # Architecture Overview
//!
//! ```text
//!                  ┌────────────────────────────────────────────────────────────┐
//!   connections    │  ┌──────────┐   ┌───────────┐   ┌─────────┐   ┌─────────┐  │
//!   ───────────────┼─▶│ listener │──▶│ admission │──▶│  fair   │──▶│ worker  │  │
//!                  │  │          │   │   gate    │   │  queue  │   │  pool   │  │
//!                  │  └──────────┘   └─────┬─────┘   └─────────┘   └────┬────┘  │
//!                  │                 ban / drop                         │       │
//!                  │                                                    ▼       │
//!                  │       ┌────────────────────┐        ┌────────────────────┐  │
//!   responses      │       │ dispatcher (local) │◀──or──▶│  bridge publisher  │──┼──▶ NATS
//!   ◀──────────────┼───────│  route → plugin    │        │  (remote workers)  │◀─┼─── JetStream
//!                  │       └─────────┬──────────┘        └────────────────────┘  │
//!                  │                 ▼                                           │
//!                  │       ┌────────────────────┐                                │
//!                  │       │  plugin registry   │◀── plugin directory watcher    │
//!                  │       └────────────────────┘                                │
//!                  └────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use sws::config::{load_config, ServerConfig};
use sws::lifecycle::signals::spawn_signal_handler;
use sws::lifecycle::{start_server, start_worker, Shutdown};
use sws::observability::logging::init_logging;
use sws::observability::metrics::init_metrics;
use sws::plugins::Catalog;

#[derive(Parser)]
#[command(name = "sws")]
#[command(about = "Fair, plugin-routed request server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Accept connections and serve requests
    Serve {
        /// Path to the TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the listener port
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Consume requests from the broker as a remote worker
    Worker {
        /// Path to the TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn read_config(path: Option<&PathBuf>) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    match path {
        Some(path) => Ok(load_config(path)?),
        None => Ok(ServerConfig::default()),
    }
}

fn with_port(bind_address: &str, port: u16) -> String {
    match bind_address.rsplit_once(':') {
        Some((host, _)) => format!("{host}:{port}"),
        None => format!("{bind_address}:{port}"),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let (mut config, worker_mode) = match &cli.command {
        Commands::Serve { config, .. } => (read_config(config.as_ref())?, false),
        Commands::Worker { config } => (read_config(config.as_ref())?, true),
    };
    if let Commands::Serve { port: Some(port), .. } = cli.command {
        config.listener.bind_address = with_port(&config.listener.bind_address, port);
    }

    init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), worker = worker_mode, "sws starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    spawn_signal_handler(shutdown.clone());
    let catalog = Arc::new(Catalog::builtin());

    if worker_mode {
        let worker = start_worker(config, catalog, None, shutdown).await?;
        tracing::info!(routes = worker.plugins.registry.len(), "Worker running");
        worker.wait().await?;
    } else {
        let server = start_server(config, catalog, None, shutdown).await?;
        tracing::info!(
            address = %server.local_addr,
            routes = server.plugins.registry.len(),
            remote = server.publisher.is_some(),
            "Listening for connections"
        );
        server.wait().await?;
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_override_keeps_host() {
        assert_eq!(with_port("0.0.0.0:8080", 9000), "0.0.0.0:9000");
        assert_eq!(with_port("[::1]:8080", 9000), "[::1]:9000");
    }
}
