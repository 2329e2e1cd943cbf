// Copyright (C) 2025 Fleetbench Contributors
// SPDX-License-Identifier: MIT
//! Buffered telemetry transmission for fleetbench agents.
//!
//! Producers hand [`ProxyTelemetryMessage`](fleetbench_contracts::ProxyTelemetryMessage)
//! values to a [`TelemetryChannel`], which buffers them in memory and ships
//! them to a remote proxy collector in batches from a single background
//! worker. The channel guarantees:
//!
//! - `add` never blocks on network I/O and never loses an accepted message
//!   except through an explicit, observable drop (capacity overflow or a
//!   flush deadline)
//! - batches are transmitted in FIFO order; a failing batch is retried
//!   before any newer message is sent
//! - every accepted message ends up in exactly one of the
//!   [`ChannelEvent::Transmitted`] / [`ChannelEvent::Dropped`] notifications
//!
//! The transport seam is the [`TelemetrySink`] trait; production code plugs
//! in the proxy HTTP client, tests plug in scripted sinks.

mod channel;
mod logger;
mod sink;

pub use channel::{ChannelConfig, ChannelEvent, DropReason, TelemetryChannel};
pub use logger::ProxyLogger;
pub use sink::{SinkError, TelemetrySink};
