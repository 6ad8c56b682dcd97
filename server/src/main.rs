use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;

use arena_api::{ApiServer, ApiServerConfig};
use arena_core::prelude::Capability;
use arena_engine::prelude::{Engine, EngineConfig};

#[derive(Parser)]
#[command(about, long_about = None)]
struct Cli {
    /// Address for the HTTP API to listen on
    #[clap(long, default_value = "127.0.0.1:8080", env = "ARENA_LISTEN_ADDR")]
    listen: SocketAddr,

    /// Number of worker slots
    #[clap(long, default_value = "4")]
    slots: usize,

    /// Maximum number of accepted runs waiting for a slot
    #[clap(long, default_value = "32")]
    queue_capacity: usize,

    /// Maximum number of non-terminal runs per requester
    #[clap(long, default_value = "2")]
    max_runs_per_requester: usize,

    /// Capability offered by the worker pool. Repeat the flag for multiple capabilities.
    #[clap(long = "capability", default_values = ["network", "log-access"])]
    capabilities: Vec<String>,

    /// Seconds a cancelled run gets to stop at a step boundary before its slot is reclaimed
    #[clap(long, default_value = "5")]
    cancel_grace_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = EngineConfig {
        slots: cli.slots,
        queue_capacity: cli.queue_capacity,
        max_runs_per_requester: cli.max_runs_per_requester,
        capabilities: cli.capabilities.iter().map(Capability::new).collect(),
        cancel_grace: Duration::from_secs(cli.cancel_grace_secs),
        ..EngineConfig::default()
    };

    let engine = Arc::new(Engine::new(config));

    for scenario in [
        port_scan_scenario::scenario()?,
        credential_audit_scenario::scenario()?,
        log_sweep_scenario::scenario()?,
    ] {
        log::info!("Registering built-in scenario: {}", scenario.id);
        engine.publish_scenario(scenario)?;
    }

    let server = ApiServer::new(
        ApiServerConfig {
            listen_addr: cli.listen,
        },
        engine,
    );
    let handle = server.start().await?;

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    log::info!("Received shutdown signal, shutting down...");
    handle.abort();

    Ok(())
}
