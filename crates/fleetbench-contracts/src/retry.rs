// Copyright (C) 2025 Fleetbench Contributors
// SPDX-License-Identifier: MIT
//! Explicit retry policies for remote operations.

use std::fmt;
use std::time::Duration;

use http::StatusCode;

/// A stateless retry policy passed explicitly into each remote operation.
///
/// Reconstructed (or borrowed) per call; carries no per-attempt state of
/// its own. A response is retried when it is neither a success nor one of
/// the statuses the policy considers non-transient. Transport-level
/// failures (connection refused, timeouts) are always treated as
/// transient.
#[derive(Clone)]
pub struct RetryPolicy {
    /// Maximum number of retries after the initial attempt.
    pub max_attempts: u32,
    /// Wait time before retry number `attempt` (1-based).
    pub backoff: fn(u32) -> Duration,
    /// Statuses that must surface immediately instead of being retried.
    pub non_transient: &'static [StatusCode],
}

const NON_TRANSIENT_ON_GET: &[StatusCode] = &[
    StatusCode::BAD_REQUEST,
    StatusCode::NOT_FOUND,
    StatusCode::LOCKED,
    StatusCode::FORBIDDEN,
    StatusCode::NETWORK_AUTHENTICATION_REQUIRED,
    StatusCode::HTTP_VERSION_NOT_SUPPORTED,
    StatusCode::UNAUTHORIZED,
];

const NON_TRANSIENT_ON_WRITE: &[StatusCode] = &[
    StatusCode::BAD_REQUEST,
    StatusCode::CONFLICT,
    StatusCode::FORBIDDEN,
    StatusCode::NETWORK_AUTHENTICATION_REQUIRED,
    StatusCode::HTTP_VERSION_NOT_SUPPORTED,
    StatusCode::UNAUTHORIZED,
];

const NON_TRANSIENT_ON_DELETE: &[StatusCode] = &[
    StatusCode::BAD_REQUEST,
    StatusCode::FORBIDDEN,
    StatusCode::NETWORK_AUTHENTICATION_REQUIRED,
    StatusCode::HTTP_VERSION_NOT_SUPPORTED,
    StatusCode::UNAUTHORIZED,
];

fn default_backoff(attempt: u32) -> Duration {
    Duration::from_millis(u64::from(attempt) * 500)
}

fn no_backoff(_attempt: u32) -> Duration {
    Duration::ZERO
}

impl RetryPolicy {
    /// Default policy for GET calls. A 404 is non-transient so polling
    /// callers observe "absent" immediately rather than burning retries.
    pub fn default_get() -> Self {
        Self {
            max_attempts: 10,
            backoff: default_backoff,
            non_transient: NON_TRANSIENT_ON_GET,
        }
    }

    /// Default policy for POST/PUT calls. Conflicts surface immediately
    /// so callers can distinguish concurrent-writer races.
    pub fn default_write() -> Self {
        Self {
            max_attempts: 10,
            backoff: default_backoff,
            non_transient: NON_TRANSIENT_ON_WRITE,
        }
    }

    /// Default policy for DELETE calls.
    pub fn default_delete() -> Self {
        Self {
            max_attempts: 10,
            backoff: default_backoff,
            non_transient: NON_TRANSIENT_ON_DELETE,
        }
    }

    /// A policy that never retries. Used by polling loops which supply
    /// their own cadence, and by tests.
    pub fn none() -> Self {
        Self {
            max_attempts: 0,
            backoff: no_backoff,
            non_transient: &[],
        }
    }

    /// Whether the given response status should be retried.
    pub fn is_retryable(&self, status: StatusCode) -> bool {
        !status.is_success() && !self.non_transient.contains(&status)
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("non_transient", &self.non_transient)
            .finish_non_exhaustive()
    }
}
