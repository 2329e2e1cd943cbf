// Copyright (C) 2025 Fleetbench Contributors
// SPDX-License-Identifier: MIT
//! Fleetbench agent API server.

use tracing::{info, warn};

use fleetbench_api::config::Config;
use fleetbench_api::context::ApiContext;
use fleetbench_api::store::StateStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fleetbench_api=info".into()),
        )
        .init();

    // Load .env file if present
    if let Err(e) = dotenvy::dotenv() {
        warn!("No .env file loaded: {}", e);
    }

    let config = Config::from_env()?;

    info!(
        bind_addr = %config.bind_addr,
        state_dir = %config.state_dir.display(),
        "Starting fleetbench agent API"
    );

    let context = ApiContext::new(StateStore::new(config.state_dir));
    let app = fleetbench_api::router(context.clone());

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;

    // Peers polling HEAD /api/events see 423 until this flips.
    context.set_online(true);
    info!("Agent API online");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await?;

    info!("Agent API stopped");
    Ok(())
}
