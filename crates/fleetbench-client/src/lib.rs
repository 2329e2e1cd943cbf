// Copyright (C) 2025 Fleetbench Contributors
// SPDX-License-Identifier: MIT
//! HTTP client for the fleetbench agent API.
//!
//! [`AgentClient`] wraps one peer's REST surface (heartbeat, online
//! status, state documents, instruction delivery) with explicit
//! per-operation retry policies. The synchronization operations in
//! [`sync`] build the client/server handshake on top of it: poll the peer
//! up, poll it online, exchange instructions and state markers.
//!
//! [`ProxyClient`] is the production [`TelemetrySink`](fleetbench_telemetry::TelemetrySink)
//! for the telemetry channel.

mod client;
mod error;
mod proxy;
mod sync;

pub use client::AgentClient;
pub use error::{ApiError, Result, SyncError, SyncResult};
pub use proxy::ProxyClient;
pub use sync::{DEFAULT_POLL_INTERVAL, PollOutcome};
