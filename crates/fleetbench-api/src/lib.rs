// Copyright (C) 2025 Fleetbench Contributors
// SPDX-License-Identifier: MIT
//! Per-agent HTTP API for fleetbench.
//!
//! Every agent in a multi-machine run hosts this API so its peers can
//! observe and drive it:
//!
//! - `GET /api/heartbeat` - process liveness
//! - `HEAD|GET /api/events` - readiness (200 online, 423 starting up)
//! - `POST /api/events` - instruction delivery, fanned out on the
//!   in-process [`InstructionBus`]
//! - `GET|POST|PUT|DELETE /api/state/{id}` - named JSON state documents
//!   in the file-backed [`StateStore`], used for asynchronous handoff
//!   between peers
//!
//! [`ApiContext`] bundles the shared pieces (online flag, store, bus) and
//! is the axum state for [`handlers::router`].

pub mod bus;
pub mod config;
pub mod context;
pub mod error;
pub mod handlers;
pub mod store;

pub use bus::InstructionBus;
pub use config::Config;
pub use context::ApiContext;
pub use error::{ServiceError, StoreError};
pub use handlers::router;
pub use store::StateStore;
