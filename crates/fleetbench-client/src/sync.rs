// Copyright (C) 2025 Fleetbench Contributors
// SPDX-License-Identifier: MIT
//! Client/server synchronization over the agent API.
//!
//! Peers coordinate by polling each other's REST surface: first for a
//! heartbeat (process up), then for online status (ready for work), then
//! for state documents that signal handshake progress. Each poll swallows
//! transport failures and not-ready statuses inside the loop - an
//! unreachable peer is the expected starting condition, not an error -
//! and gives up only when its deadline passes. Every attempt is itself
//! raced against the deadline and the cancellation token, so a hung
//! request cannot hold a poll past its time budget.

use std::future::Future;
use std::time::Duration;

use fleetbench_contracts::{Instructions, RetryPolicy, StateItem};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::client::AgentClient;
use crate::error::{SyncError, SyncResult};

/// Default cadence between poll attempts.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// How a polling operation ended without erroring. Cancellation is a
/// cooperative outcome, never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// The polled condition held.
    Satisfied,
    /// The cancellation token fired before the condition held.
    Cancelled,
}

enum Wait {
    Continue,
    Cancelled,
}

enum Attempt<T> {
    Completed(T),
    Cancelled,
    DeadlineExpired,
}

/// Race a single attempt against the poll deadline and the token. An
/// attempt against a black-holed peer can hang for the OS connect
/// timeout; it must not outlive the poll that issued it.
async fn bounded<F: Future>(
    deadline: Instant,
    cancel: &CancellationToken,
    attempt: F,
) -> Attempt<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Attempt::Cancelled,
        _ = tokio::time::sleep_until(deadline) => Attempt::DeadlineExpired,
        result = attempt => Attempt::Completed(result),
    }
}

async fn wait_for_next_attempt(
    operation: &'static str,
    deadline: Instant,
    timeout: Duration,
    interval: Duration,
    cancel: &CancellationToken,
) -> SyncResult<Wait> {
    let now = Instant::now();
    if now >= deadline {
        return Err(SyncError::PollingTimeout { operation, timeout });
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Ok(Wait::Cancelled),
        _ = tokio::time::sleep(interval.min(deadline - now)) => Ok(Wait::Continue),
    }
}

impl AgentClient {
    /// Poll `GET /api/heartbeat` until the peer answers 2xx. Distinguishes
    /// "peer process never came up" (timeout here) from later handshake
    /// failures.
    pub async fn poll_for_heartbeat(
        &self,
        timeout: Duration,
        interval: Duration,
        cancel: &CancellationToken,
    ) -> SyncResult<PollOutcome> {
        let operation = "poll for heartbeat";
        let deadline = Instant::now() + timeout;
        loop {
            match bounded(deadline, cancel, self.heartbeat(Some(&RetryPolicy::none()))).await {
                Attempt::Cancelled => return Ok(PollOutcome::Cancelled),
                Attempt::DeadlineExpired => {
                    return Err(SyncError::PollingTimeout { operation, timeout });
                }
                Attempt::Completed(Ok(status)) if status.is_success() => {
                    return Ok(PollOutcome::Satisfied);
                }
                Attempt::Completed(Ok(status)) => {
                    debug!(peer = self.base_url(), status = status.as_u16(), "Heartbeat not ready");
                }
                Attempt::Completed(Err(err)) => {
                    debug!(peer = self.base_url(), error = %err, "Heartbeat attempt failed");
                }
            }
            if let Wait::Cancelled =
                wait_for_next_attempt(operation, deadline, timeout, interval, cancel).await?
            {
                return Ok(PollOutcome::Cancelled);
            }
        }
    }

    /// Poll `HEAD /api/events` until the peer declares itself online.
    pub async fn poll_for_server_online(
        &self,
        timeout: Duration,
        interval: Duration,
        cancel: &CancellationToken,
    ) -> SyncResult<PollOutcome> {
        let operation = "poll for server online";
        let deadline = Instant::now() + timeout;
        loop {
            match bounded(deadline, cancel, self.server_online(Some(&RetryPolicy::none()))).await {
                Attempt::Cancelled => return Ok(PollOutcome::Cancelled),
                Attempt::DeadlineExpired => {
                    return Err(SyncError::PollingTimeout { operation, timeout });
                }
                Attempt::Completed(Ok(status)) if status.is_success() => {
                    return Ok(PollOutcome::Satisfied);
                }
                Attempt::Completed(Ok(status)) => {
                    debug!(peer = self.base_url(), status = status.as_u16(), "Peer not yet online");
                }
                Attempt::Completed(Err(err)) => {
                    debug!(peer = self.base_url(), error = %err, "Online check failed");
                }
            }
            if let Wait::Cancelled =
                wait_for_next_attempt(operation, deadline, timeout, interval, cancel).await?
            {
                return Ok(PollOutcome::Cancelled);
            }
        }
    }

    /// Poll `GET /api/state/{id}` until the definition satisfies
    /// `matches`. Absence and unreachability count as "not yet";
    /// undeserializable payloads are hard errors, the document will not
    /// fix itself by waiting.
    pub async fn poll_for_expected_state<T, F>(
        &self,
        state_id: &str,
        matches: F,
        timeout: Duration,
        interval: Duration,
        cancel: &CancellationToken,
    ) -> SyncResult<PollOutcome>
    where
        T: DeserializeOwned,
        F: Fn(&T) -> bool,
    {
        let operation = "poll for expected state";
        let deadline = Instant::now() + timeout;
        let no_retry = RetryPolicy::none();
        loop {
            let lookup = self.get_state_parsed::<T>(state_id, Some(&no_retry));
            match bounded(deadline, cancel, lookup).await {
                Attempt::Cancelled => return Ok(PollOutcome::Cancelled),
                Attempt::DeadlineExpired => {
                    return Err(SyncError::PollingTimeout { operation, timeout });
                }
                Attempt::Completed(Ok(Some(item))) if matches(&item.definition) => {
                    return Ok(PollOutcome::Satisfied);
                }
                Attempt::Completed(Ok(Some(_))) => {
                    debug!(peer = self.base_url(), state_id, "State present but not yet matching");
                }
                Attempt::Completed(Ok(None)) => {
                    debug!(peer = self.base_url(), state_id, "State not yet present");
                }
                Attempt::Completed(Err(err)) if err.is_payload_error() => return Err(err.into()),
                Attempt::Completed(Err(err)) => {
                    debug!(peer = self.base_url(), state_id, error = %err, "State poll failed");
                }
            }
            if let Wait::Cancelled =
                wait_for_next_attempt(operation, deadline, timeout, interval, cancel).await?
            {
                return Ok(PollOutcome::Cancelled);
            }
        }
    }

    /// Poll until `GET /api/state/{id}` answers 404. Used by reset
    /// handshakes to confirm the peer has torn its marker down.
    pub async fn poll_for_state_deleted(
        &self,
        state_id: &str,
        timeout: Duration,
        interval: Duration,
        cancel: &CancellationToken,
    ) -> SyncResult<PollOutcome> {
        let operation = "poll for state deleted";
        let deadline = Instant::now() + timeout;
        let no_retry = RetryPolicy::none();
        loop {
            let lookup = self.get_state_parsed::<Value>(state_id, Some(&no_retry));
            match bounded(deadline, cancel, lookup).await {
                Attempt::Cancelled => return Ok(PollOutcome::Cancelled),
                Attempt::DeadlineExpired => {
                    return Err(SyncError::PollingTimeout { operation, timeout });
                }
                Attempt::Completed(Ok(None)) => return Ok(PollOutcome::Satisfied),
                Attempt::Completed(Ok(Some(_))) => {
                    debug!(peer = self.base_url(), state_id, "State still present");
                }
                Attempt::Completed(Err(err)) => {
                    debug!(peer = self.base_url(), state_id, error = %err, "State poll failed");
                }
            }
            if let Wait::Cancelled =
                wait_for_next_attempt(operation, deadline, timeout, interval, cancel).await?
            {
                return Ok(PollOutcome::Cancelled);
            }
        }
    }

    /// Wrap `instructions` in a freshly-correlated item and deliver it via
    /// `POST /api/events`, retrying per `policy`. Aborts promptly when the
    /// token fires.
    pub async fn send_instructions(
        &self,
        instructions: Instructions,
        cancel: &CancellationToken,
        policy: Option<&RetryPolicy>,
    ) -> SyncResult<PollOutcome> {
        let item: StateItem<Instructions> = instructions.into_item();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Ok(PollOutcome::Cancelled),
            result = self.post_instructions(&item, policy) => {
                result?;
                Ok(PollOutcome::Satisfied)
            }
        }
    }
}
