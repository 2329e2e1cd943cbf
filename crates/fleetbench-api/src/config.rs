// Copyright (C) 2025 Fleetbench Contributors
// SPDX-License-Identifier: MIT
//! Configuration for the agent API server.

use std::net::SocketAddr;
use std::path::PathBuf;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the API listens on.
    pub bind_addr: SocketAddr,
    /// Directory holding the state store's `<id>.json` files.
    pub state_dir: PathBuf,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let port: u16 = std::env::var("FLEETBENCH_API_PORT")
            .unwrap_or_else(|_| "4500".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidPort)?;

        let bind_addr = SocketAddr::from(([0, 0, 0, 0], port));

        let state_dir = PathBuf::from(
            std::env::var("FLEETBENCH_STATE_DIR").unwrap_or_else(|_| ".fleetbench/state".to_string()),
        );

        Ok(Self {
            bind_addr,
            state_dir,
        })
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The port number is invalid.
    #[error("Invalid port number")]
    InvalidPort,
}
