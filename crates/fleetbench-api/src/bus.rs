// Copyright (C) 2025 Fleetbench Contributors
// SPDX-License-Identifier: MIT
//! In-process instruction delivery.
//!
//! Handlers receive instructions over HTTP and publish them here; workload
//! components subscribe to the instruction types they act on. Channels are
//! unbounded: instruction traffic is a handful of messages per run, and a
//! publisher must never block inside a request handler.

use std::collections::HashMap;
use std::sync::Mutex;

use fleetbench_contracts::{InstructionType, Instructions, StateItem};
use tokio::sync::mpsc;
use tracing::debug;

type Subscriber = mpsc::UnboundedSender<StateItem<Instructions>>;

/// Publish/subscribe fan-out keyed by [`InstructionType`].
///
/// Delivery is in publish order per subscriber. Subscribers that dropped
/// their receiver are pruned on the next publish to their type.
#[derive(Default)]
pub struct InstructionBus {
    subscribers: Mutex<HashMap<InstructionType, Vec<Subscriber>>>,
}

impl InstructionBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to one instruction type. Every published item of that
    /// type is delivered to the returned receiver until it is dropped.
    pub fn subscribe(
        &self,
        instruction_type: InstructionType,
    ) -> mpsc::UnboundedReceiver<StateItem<Instructions>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .unwrap()
            .entry(instruction_type)
            .or_default()
            .push(tx);
        rx
    }

    /// Deliver `item` to current subscribers of its type. Returns how many
    /// subscribers received it.
    pub fn publish(&self, item: StateItem<Instructions>) -> usize {
        let instruction_type = item.definition.instruction_type;
        let mut subscribers = self.subscribers.lock().unwrap();
        let Some(list) = subscribers.get_mut(&instruction_type) else {
            debug!(instruction_type = instruction_type.as_str(), "No subscribers for instruction");
            return 0;
        };
        list.retain(|tx| tx.send(item.clone()).is_ok());
        debug!(
            instruction_type = instruction_type.as_str(),
            correlation_id = %item.id,
            delivered = list.len(),
            "Instruction published"
        );
        list.len()
    }
}
