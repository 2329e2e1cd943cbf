// Copyright (C) 2025 Fleetbench Contributors
// SPDX-License-Identifier: MIT
//! HTTP client for the telemetry proxy collector.

use async_trait::async_trait;
use fleetbench_contracts::ProxyTelemetryMessage;
use fleetbench_telemetry::{SinkError, TelemetrySink};
use http::StatusCode;

use crate::error::{ApiError, Result};

/// Posts telemetry batches to `POST <proxy>/api/telemetry`.
///
/// Plugs into the telemetry channel as its [`TelemetrySink`]; the channel
/// owns retry and backoff, so this client performs exactly one attempt
/// per call and reports whatever happened.
#[derive(Debug, Clone)]
pub struct ProxyClient {
    http: reqwest::Client,
    endpoint: String,
}

impl ProxyClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into();
        if let Err(err) = reqwest::Url::parse(&base_url) {
            return Err(ApiError::InvalidBaseUrl {
                url: base_url,
                reason: err.to_string(),
            });
        }
        Ok(Self {
            http,
            endpoint: format!("{}/api/telemetry", base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl TelemetrySink for ProxyClient {
    async fn post_telemetry(
        &self,
        messages: &[ProxyTelemetryMessage],
    ) -> std::result::Result<StatusCode, SinkError> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(messages)
            .send()
            .await
            .map_err(|err| SinkError(err.to_string()))?;
        Ok(response.status())
    }
}
