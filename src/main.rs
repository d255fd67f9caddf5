//! Swarm graph runner.
//!
//! # Architecture Overview
//!
//! ```text
//!   ┌────────────────────────────── node A ───────────────────────────────┐
//!   │  connect / disconnect / force_disconnect                            │
//!   │        │                                                             │
//!   │        ▼                                                             │
//!   │  ┌────────────┐   ┌────────────┐   ┌──────────────┐                  │
//!   │  │ graph node │──▶│ peer table │──▶│ liveness     │── ping ──┐       │
//!   │  └─────┬──────┘   └────────────┘   │ probes       │          │       │
//!   │        │                           └──────────────┘          │       │
//!   └────────┼─────────────────────────────────────────────────────┼───────┘
//!            │ request/response transport                          │
//!   ┌────────▼─────────────────────────────────────────────────────▼───────┐
//!   │  inbound handler → approval hooks → peer table → topology events     │
//!   └────────────────────────────── node B ───────────────────────────────┘
//! ```
//!
//! Starts every node declared in the config on an in-process transport,
//! requests the configured links, logs topology changes, and severs every
//! link on Ctrl-C.

use std::path::PathBuf;

use clap::Parser;
use tokio::sync::broadcast::error::RecvError;

use swarm_graph::config::loader::load_config;
use swarm_graph::config::GraphConfig;
use swarm_graph::lifecycle::signals::wait_for_signal;
use swarm_graph::lifecycle::startup::start_cluster;
use swarm_graph::observability::{logging, metrics};
use swarm_graph::{GraphNode, Shutdown};

#[derive(Parser)]
#[command(name = "swarm-graph")]
#[command(about = "Run a set of graph nodes on an in-process transport", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level, overriding the configuration file.
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => GraphConfig::default(),
    };
    if let Some(level) = cli.log_level {
        config.observability.log_level = level;
    }

    logging::init_logging(&config.observability)?;
    tracing::info!("swarm-graph v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        nodes = config.nodes.len(),
        liveness_interval_ms = config.liveness.interval_ms,
        call_timeout_ms = config.transport.call_timeout_ms,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    let (cluster, report) = start_cluster(&config).await;
    for node in cluster.nodes() {
        tokio::spawn(log_topology(node.clone(), shutdown.subscribe()));
        tracing::info!(node = %node.id(), connections = ?node.connections(), "Node ready");
    }
    tracing::info!(established = report.established, denied = report.denied, "Cluster running");

    wait_for_signal().await;
    shutdown.trigger();
    let severed = cluster.close();

    tracing::info!(severed, "Shutdown complete");
    Ok(())
}

async fn log_topology(node: GraphNode, mut shutdown: tokio::sync::broadcast::Receiver<()>) {
    let mut events = node.subscribe();
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => tracing::info!(
                    node = %node.id(),
                    event = event.kind(),
                    remote = %event.remote(),
                    "Topology changed"
                ),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(node = %node.id(), skipped, "Topology observer lagged");
                }
                Err(RecvError::Closed) => break,
            },
            _ = shutdown.recv() => break,
        }
    }
}
