// Copyright (C) 2025 Fleetbench Contributors
// SPDX-License-Identifier: MIT
//! Adapter shaping structured log calls into channel messages.

use std::collections::BTreeMap;

use chrono::Utc;
use fleetbench_contracts::{ProxyTelemetryMessage, SeverityLevel};
use serde_json::Value;
use uuid::Uuid;

use crate::channel::TelemetryChannel;

/// Emits application events into a [`TelemetryChannel`], stamping each
/// message with the identity of the emitting process. Cheap to clone.
#[derive(Clone)]
pub struct ProxyLogger {
    channel: TelemetryChannel,
    source: String,
    app_name: String,
    app_host: String,
    sdk_version: String,
}

impl ProxyLogger {
    pub fn new(
        channel: TelemetryChannel,
        source: impl Into<String>,
        app_name: impl Into<String>,
        app_host: impl Into<String>,
        sdk_version: impl Into<String>,
    ) -> Self {
        Self {
            channel,
            source: source.into(),
            app_name: app_name.into(),
            app_host: app_host.into(),
            sdk_version: sdk_version.into(),
        }
    }

    /// Buffer one event. Non-blocking; drops are reported through the
    /// channel's event observers, not to the caller.
    pub fn log(
        &self,
        severity: SeverityLevel,
        message: impl Into<String>,
        dimensions: BTreeMap<String, Value>,
    ) {
        self.log_related(severity, message, dimensions, None);
    }

    /// Buffer one event correlated to a parent operation.
    pub fn log_related(
        &self,
        severity: SeverityLevel,
        message: impl Into<String>,
        dimensions: BTreeMap<String, Value>,
        operation_parent_id: Option<String>,
    ) {
        self.channel.add(ProxyTelemetryMessage {
            source: self.source.clone(),
            message: message.into(),
            severity_level: severity,
            event_type: "Trace".into(),
            item_type: "trace".into(),
            custom_dimensions: dimensions,
            operation_id: Uuid::new_v4().to_string(),
            operation_parent_id,
            sdk_version: self.sdk_version.clone(),
            app_host: self.app_host.clone(),
            app_name: self.app_name.clone(),
            timestamp: Utc::now(),
        });
    }
}
