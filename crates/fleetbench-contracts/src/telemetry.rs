// Copyright (C) 2025 Fleetbench Contributors
// SPDX-License-Identifier: MIT
//! Telemetry messages shipped to the remote proxy collector.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Severity of a telemetry message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SeverityLevel {
    Trace,
    Debug,
    Information,
    Warning,
    Error,
    Critical,
}

/// One telemetry event as transmitted to the proxy.
///
/// Value object: created at log time, immutable, owned exclusively by the
/// channel buffer until transmitted or dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyTelemetryMessage {
    /// Component that emitted the event.
    pub source: String,
    /// The event name/text.
    pub message: String,
    pub severity_level: SeverityLevel,
    /// Broad category of the event (traces, metrics, events).
    pub event_type: String,
    pub item_type: String,
    /// Structured context captured with the event.
    #[serde(default)]
    pub custom_dimensions: BTreeMap<String, Value>,
    /// Correlation id of the operation that produced the event.
    pub operation_id: String,
    /// Correlation id of the parent operation, when nested.
    pub operation_parent_id: Option<String>,
    pub sdk_version: String,
    pub app_host: String,
    pub app_name: String,
    pub timestamp: DateTime<Utc>,
}
