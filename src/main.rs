//! Local bucketing proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌───────────────────────── instance ─────────────────────────┐
//!                        │                                                             │
//!   SDK request          │  ┌──────────┐   ┌──────────┐   ┌────────────────────────┐   │
//!   ─────────────────────┼─▶│   net    │──▶│   http   │──▶│ auth → evaluation /    │   │
//!   (TCP or Unix socket) │  │ listener │   │  router  │   │ events / gateway       │   │
//!                        │  └──────────┘   └──────────┘   └───────────┬────────────┘   │
//!                        │                                            │                │
//!                        │                                            ▼                │
//!                        │                                  ┌───────────────────┐      │
//!   /event-stream ◀──────┼── realtime broadcaster ◀─────────│ EvaluationClient  │──────┼──▶ CDN /
//!                        │                                  └───────────────────┘      │    bucketing /
//!                        │                                                             │    events APIs
//!                        └─────────────────────────────────────────────────────────────┘
//! ```

use bucketing_proxy::cli::Cli;
use bucketing_proxy::client::CloudClientFactory;
use bucketing_proxy::events::PROXY_VERSION;
use bucketing_proxy::lifecycle::{close_all, start_all, wait_for_signal};
use bucketing_proxy::observability::{logging, metrics};
use clap::Parser;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init(cli.debug);

    tracing::info!(version = PROXY_VERSION, "bucketing-proxy starting");

    let config = cli
        .load_config()
        .inspect_err(|e| tracing::error!(error = %e, "Failed to load configuration"))?;

    if let Some(addr) = cli.metrics_address {
        metrics::init_metrics(addr)?;
    }

    let instances = start_all(config, &CloudClientFactory).await?;
    tracing::info!(instances = instances.len(), "All instances started");

    wait_for_signal().await?;

    close_all(instances).await;
    tracing::info!("Shutdown complete");
    Ok(())
}
