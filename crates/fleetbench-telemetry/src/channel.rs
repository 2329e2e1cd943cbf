// Copyright (C) 2025 Fleetbench Contributors
// SPDX-License-Identifier: MIT
//! The buffered telemetry channel.
//!
//! A single FIFO buffer decouples arbitrarily many producers from one
//! background transmission worker. Messages are never removed from the
//! buffer until the sink confirms the batch that contains them: a failed
//! batch therefore stays at the front and is retried before any newer
//! message is sent, and aborting an in-flight attempt (shutdown, flush
//! deadline) can never lose a message that was accepted into the buffer.
//!
//! Two locks split the hot path from the slow path, producers only ever
//! touch the buffer mutex:
//! - `buffer` (std mutex, never held across an await) serializes
//!   producers against the worker's dequeue
//! - `transmission` (tokio mutex) guarantees at most one transmission
//!   attempt is in flight at a time

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use fleetbench_contracts::ProxyTelemetryMessage;
use http::StatusCode;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::sink::TelemetrySink;

/// Tuning knobs for a [`TelemetryChannel`].
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Maximum number of buffered messages. Messages offered beyond this
    /// limit are dropped (observably), never blocked on.
    pub max_capacity: usize,
    /// Number of messages submitted to the sink per transmission call.
    pub batch_size: usize,
    /// Wait between failed transmission attempts before retrying the same
    /// batch. Production default 3s; tests override to zero or near-zero.
    pub transmission_failure_wait: Duration,
    /// How often the background worker wakes to check the buffer when no
    /// producer has signalled it.
    pub capture_interval: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            max_capacity: 100_000,
            batch_size: 30,
            transmission_failure_wait: Duration::from_secs(3),
            capture_interval: Duration::from_millis(500),
        }
    }
}

/// Why a set of messages was dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    /// The buffer was full when the message was offered.
    CapacityExceeded { max_capacity: usize },
    /// A flush deadline expired with the messages still unsent.
    FlushTimeout { timeout: Duration },
}

/// Observable side effects of the channel.
///
/// Every message accepted into the buffer eventually appears in exactly
/// one `Transmitted` or one `Dropped` event. `TransmissionError` is not
/// terminal: the messages it carries remain buffered and will be retried.
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    /// A batch was confirmed by the sink.
    Transmitted {
        messages: Vec<ProxyTelemetryMessage>,
        status: StatusCode,
    },
    /// A transmission attempt failed; the batch stays buffered.
    TransmissionError {
        messages: Vec<ProxyTelemetryMessage>,
        status: Option<StatusCode>,
        error: Option<String>,
    },
    /// Messages were discarded and will never be sent.
    Dropped {
        messages: Vec<ProxyTelemetryMessage>,
        reason: DropReason,
    },
}

type EventObserver = Box<dyn Fn(&ChannelEvent) + Send + Sync>;

struct Inner {
    sink: Arc<dyn TelemetrySink>,
    config: ChannelConfig,
    buffer: Mutex<VecDeque<ProxyTelemetryMessage>>,
    /// Serializes transmission attempts; held across sink awaits.
    transmission: tokio::sync::Mutex<()>,
    /// Interrupts the current transmission attempt without shutting the
    /// channel down. Replaced with a fresh token after each interruption.
    interrupt: Mutex<CancellationToken>,
    shutdown: CancellationToken,
    wake: Notify,
    observers: Mutex<Vec<EventObserver>>,
}

impl Inner {
    fn emit(&self, event: ChannelEvent) {
        let observers = self.observers.lock().unwrap();
        for observer in observers.iter() {
            observer(&event);
        }
    }

    fn current_interrupt(&self) -> CancellationToken {
        self.interrupt.lock().unwrap().clone()
    }

    fn buffered(&self) -> usize {
        self.buffer.lock().unwrap().len()
    }

    /// Drain the buffer in batches until it is empty, the token fires, or
    /// the current interrupt token fires.
    async fn transmit_events(&self, cancel: &CancellationToken) {
        if self.buffered() == 0 {
            return;
        }

        let _permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            permit = self.transmission.lock() => permit,
        };

        loop {
            let interrupt = self.current_interrupt();
            if cancel.is_cancelled() || interrupt.is_cancelled() {
                return;
            }

            // Snapshot the front batch without removing it. The messages
            // are only popped once the sink confirms them, so an abort at
            // any await point below leaves the buffer intact.
            let batch: Vec<ProxyTelemetryMessage> = {
                let buffer = self.buffer.lock().unwrap();
                buffer.iter().take(self.config.batch_size).cloned().collect()
            };

            if batch.is_empty() {
                return;
            }

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                _ = interrupt.cancelled() => return,
                result = self.sink.post_telemetry(&batch) => result,
            };

            match result {
                Ok(status) if status.is_success() => {
                    {
                        let mut buffer = self.buffer.lock().unwrap();
                        for _ in 0..batch.len() {
                            buffer.pop_front();
                        }
                    }
                    self.emit(ChannelEvent::Transmitted { messages: batch, status });
                }
                Ok(status) => {
                    warn!(
                        status = status.as_u16(),
                        batch_size = batch.len(),
                        "Telemetry batch transmission rejected, will retry"
                    );
                    self.emit(ChannelEvent::TransmissionError {
                        messages: batch,
                        status: Some(status),
                        error: None,
                    });
                    if !self.wait_before_retry(cancel, &interrupt).await {
                        return;
                    }
                }
                Err(err) => {
                    warn!(
                        error = %err,
                        batch_size = batch.len(),
                        "Telemetry batch transmission failed, will retry"
                    );
                    self.emit(ChannelEvent::TransmissionError {
                        messages: batch,
                        status: None,
                        error: Some(err.to_string()),
                    });
                    if !self.wait_before_retry(cancel, &interrupt).await {
                        return;
                    }
                }
            }
        }
    }

    /// Returns false when the wait was interrupted and the caller should
    /// stop transmitting.
    async fn wait_before_retry(&self, cancel: &CancellationToken, interrupt: &CancellationToken) -> bool {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            _ = interrupt.cancelled() => false,
            _ = tokio::time::sleep(self.config.transmission_failure_wait) => true,
        }
    }
}

/// A bounded, buffered, at-least-once delivery pipeline for telemetry
/// messages. Cheap to clone; all clones share one buffer and worker.
#[derive(Clone)]
pub struct TelemetryChannel {
    inner: Arc<Inner>,
    worker: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl TelemetryChannel {
    pub fn new(sink: Arc<dyn TelemetrySink>, config: ChannelConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                sink,
                config,
                buffer: Mutex::new(VecDeque::new()),
                transmission: tokio::sync::Mutex::new(()),
                interrupt: Mutex::new(CancellationToken::new()),
                shutdown: CancellationToken::new(),
                wake: Notify::new(),
                observers: Mutex::new(Vec::new()),
            }),
            worker: Arc::new(Mutex::new(None)),
        }
    }

    /// Register a synchronous observer for channel events. Capacity drops
    /// are reported from inside [`TelemetryChannel::add`], so observers
    /// must not block.
    pub fn on_event(&self, observer: impl Fn(&ChannelEvent) + Send + Sync + 'static) {
        self.inner.observers.lock().unwrap().push(Box::new(observer));
    }

    /// Number of messages currently buffered.
    pub fn buffered(&self) -> usize {
        self.inner.buffered()
    }

    /// Offer a message to the channel. Non-blocking: the message is either
    /// appended to the buffer or dropped immediately (with a synchronous
    /// `Dropped` notification) when the buffer is at capacity.
    pub fn add(&self, message: ProxyTelemetryMessage) {
        let rejected = {
            let mut buffer = self.inner.buffer.lock().unwrap();
            if buffer.len() < self.inner.config.max_capacity {
                buffer.push_back(message);
                None
            } else {
                Some(message)
            }
        };

        match rejected {
            None => self.inner.wake.notify_one(),
            Some(message) => {
                let max_capacity = self.inner.config.max_capacity;
                self.inner.emit(ChannelEvent::Dropped {
                    messages: vec![message],
                    reason: DropReason::CapacityExceeded { max_capacity },
                });
            }
        }
    }

    /// Start the background transmission worker. Idempotent; the worker
    /// runs until [`TelemetryChannel::shutdown`].
    pub fn begin_transmission(&self) {
        let mut worker = self.worker.lock().unwrap();
        if worker.is_some() {
            return;
        }

        let inner = Arc::clone(&self.inner);
        *worker = Some(tokio::spawn(async move {
            debug!("Telemetry transmission worker started");
            loop {
                tokio::select! {
                    biased;
                    _ = inner.shutdown.cancelled() => break,
                    _ = inner.wake.notified() => {}
                    _ = tokio::time::sleep(inner.config.capture_interval) => {}
                }
                inner.transmit_events(&inner.shutdown).await;
            }
            debug!("Telemetry transmission worker stopped");
        }));
    }

    /// Drain the buffer in batches until it is empty or the token fires.
    /// At most one transmission attempt runs at a time across the worker,
    /// flushes, and direct callers.
    pub async fn transmit_events(&self, cancel: &CancellationToken) {
        self.inner.transmit_events(cancel).await;
    }

    /// Bounded drain: repeatedly attempt transmission of whatever is
    /// buffered for up to `timeout`. Messages still unconfirmed when the
    /// budget expires are removed and reported via a single `Dropped`
    /// event - the one circumstance where accepted messages are
    /// intentionally lost.
    pub async fn flush(&self, timeout: Duration) {
        let deadline = tokio::time::Instant::now() + timeout;
        let flush_cancel = CancellationToken::new();

        let drained = tokio::select! {
            biased;
            _ = tokio::time::sleep_until(deadline) => false,
            _ = self.drive_until_empty(&flush_cancel) => true,
        };

        if drained {
            return;
        }

        // Deadline expired. Interrupt any in-flight attempt, then take the
        // transmission lock so nothing races the drain below.
        let interrupt = self.inner.current_interrupt();
        interrupt.cancel();

        let _permit = self.inner.transmission.lock().await;
        {
            let mut current = self.inner.interrupt.lock().unwrap();
            *current = CancellationToken::new();
        }

        let remaining: Vec<ProxyTelemetryMessage> =
            { self.inner.buffer.lock().unwrap().drain(..).collect() };

        if !remaining.is_empty() {
            warn!(
                dropped = remaining.len(),
                timeout_ms = timeout.as_millis() as u64,
                "Flush timeout expired with messages still buffered, dropping"
            );
            self.inner.emit(ChannelEvent::Dropped {
                messages: remaining,
                reason: DropReason::FlushTimeout { timeout },
            });
        }
    }

    /// Stop the background worker and join it. The channel can still be
    /// flushed afterwards by direct `transmit_events` calls, but no new
    /// background transmission occurs.
    pub async fn shutdown(&self) {
        self.inner.shutdown.cancel();
        self.inner.wake.notify_one();

        let handle = self.worker.lock().unwrap().take();
        if let Some(handle) = handle
            && tokio::time::timeout(Duration::from_secs(10), handle)
                .await
                .is_err()
        {
            warn!("Telemetry transmission worker did not stop within the shutdown grace period");
        }
    }

    async fn drive_until_empty(&self, cancel: &CancellationToken) {
        loop {
            self.inner.transmit_events(cancel).await;
            if cancel.is_cancelled() || self.inner.buffered() == 0 {
                return;
            }
            // Another attempt holds the transmission lock or the buffer
            // refilled; back off briefly before re-checking.
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}
