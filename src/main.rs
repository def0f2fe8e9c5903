// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::{Context, Result};
use clap::Parser;
use kube::Client;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use helmsman::agent::Agent;
use helmsman::config::{Config, ResourceNames};
use helmsman::fleet::FleetClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::parse();
    info!(
        "Starting helmsman {} for cluster {}: namespace={}, backend={:?}",
        env!("CARGO_PKG_VERSION"),
        config.cluster_id,
        config.namespace,
        config.backend
    );

    let client = Client::try_default()
        .await
        .context("Could not create Kubernetes client")?;
    info!("Connected to Kubernetes cluster");

    let fleet = FleetClient::new(config.api.clone(), &config.token).context("Could not create fleet API client")?;

    let mut terminate = signal(SignalKind::terminate()).context("Could not install SIGTERM handler")?;
    let shutdown = async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => warn!("Received interrupt"),
            _ = terminate.recv() => warn!("Received SIGTERM"),
        }
    };

    let agent = Agent::new(config, client, fleet, ResourceNames::default());
    agent.run_until(shutdown).await;

    info!("Shut down");
    Ok(())
}
