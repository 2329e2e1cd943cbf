// Copyright (C) 2025 Fleetbench Contributors
// SPDX-License-Identifier: MIT
//! Error types for the agent API client and synchronization operations.

use std::time::Duration;

use http::StatusCode;
use thiserror::Error;

/// Errors surfaced by [`crate::AgentClient`] operations after retry
/// policies are exhausted or a non-transient condition is hit.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The peer answered with a status the operation cannot accept.
    #[error("{operation} against {url} failed with status {status}")]
    Status {
        operation: &'static str,
        url: String,
        status: StatusCode,
        body: String,
    },

    /// The item already exists; a create lost its race. Distinct from
    /// `Status` so callers can fall back to the winner's item.
    #[error("{operation} against {url} conflicted with an existing item")]
    Conflict { operation: &'static str, url: String },

    /// The peer's state writer lock was held by another request when the
    /// wait ran out. Transient by nature; callers retry on their own
    /// cadence.
    #[error("{operation} against {url} found the peer's state writer busy")]
    Busy { operation: &'static str, url: String },

    /// The request never produced an HTTP response.
    #[error("{operation} against {url} failed in transport")]
    Transport {
        operation: &'static str,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The peer answered 2xx but the body did not deserialize. Never
    /// retried: the payload is wrong, not the network.
    #[error("{operation} response body could not be decoded")]
    Decode {
        operation: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid agent API base url {url:?}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    /// The underlying HTTP client could not be constructed.
    #[error("failed to construct HTTP client")]
    ClientBuild(#[source] reqwest::Error),
}

impl ApiError {
    /// True when the error is a payload-shape problem rather than an
    /// availability problem. Polling loops propagate these instead of
    /// treating them as "peer not ready yet".
    pub fn is_payload_error(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;

/// Errors from the client/server synchronization polling operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The polled condition never held within the allotted time. Carries
    /// the operation name so "peer never answered heartbeat" and "state
    /// never matched" stay distinguishable at the call site.
    #[error("{operation} did not complete within {timeout:?}")]
    PollingTimeout {
        operation: &'static str,
        timeout: Duration,
    },

    #[error(transparent)]
    Api(#[from] ApiError),
}

pub type SyncResult<T> = std::result::Result<T, SyncError>;
