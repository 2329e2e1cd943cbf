// Copyright (C) 2025 Fleetbench Contributors
// SPDX-License-Identifier: MIT
//! Shared per-process application context.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::bus::InstructionBus;
use crate::store::StateStore;

/// Everything the request handlers share: the online flag, the state
/// store, and the instruction bus. One explicit handle passed through
/// axum state instead of process-global flags.
#[derive(Clone)]
pub struct ApiContext {
    inner: Arc<Inner>,
}

struct Inner {
    online: AtomicBool,
    store: StateStore,
    bus: InstructionBus,
}

impl ApiContext {
    /// Starts offline; the hosting process flips the flag once it is
    /// ready to accept work, typically right after binding the listener.
    pub fn new(store: StateStore) -> Self {
        Self {
            inner: Arc::new(Inner {
                online: AtomicBool::new(false),
                store,
                bus: InstructionBus::new(),
            }),
        }
    }

    pub fn is_online(&self) -> bool {
        self.inner.online.load(Ordering::Acquire)
    }

    pub fn set_online(&self, online: bool) {
        self.inner.online.store(online, Ordering::Release);
    }

    pub fn store(&self) -> &StateStore {
        &self.inner.store
    }

    pub fn bus(&self) -> &InstructionBus {
        &self.inner.bus
    }
}
