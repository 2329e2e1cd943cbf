// Copyright (C) 2025 Fleetbench Contributors
// SPDX-License-Identifier: MIT
//! Transport seam between the telemetry channel and the proxy collector.

use async_trait::async_trait;
use fleetbench_contracts::ProxyTelemetryMessage;
use http::StatusCode;
use thiserror::Error;

/// Transport-level failure while posting a telemetry batch.
///
/// Distinct from a non-success HTTP status: both count as transmission
/// failures for the whole batch, but a `SinkError` means no status was
/// received at all.
#[derive(Debug, Error)]
#[error("telemetry sink transport failure: {0}")]
pub struct SinkError(pub String);

/// Destination for telemetry batches.
///
/// Implemented by the proxy HTTP client in production and by scripted
/// fakes in tests. A batch is at most `ChannelConfig::batch_size` messages
/// and any non-2xx status fails the whole batch.
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    /// Post one batch of messages. Returns the response status; transport
    /// failures are returned as [`SinkError`].
    async fn post_telemetry(
        &self,
        messages: &[ProxyTelemetryMessage],
    ) -> Result<StatusCode, SinkError>;
}
