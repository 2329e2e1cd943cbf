// Copyright (C) 2025 Fleetbench Contributors
// SPDX-License-Identifier: MIT
//! Shared contracts for fleetbench agents.
//!
//! These are the wire-level types exchanged between agents and with the
//! telemetry proxy:
//! - [`StateItem`] - a small named JSON document used for asynchronous
//!   status handoff between peers
//! - [`Instructions`] - typed command payloads pushed between peers
//! - [`EnvironmentLayout`] - the static description of which agent plays
//!   which role in a multi-machine run
//! - [`ProxyTelemetryMessage`] - the unit of telemetry shipped to the
//!   remote collector
//! - [`RetryPolicy`] - the explicit, stateless retry configuration passed
//!   into every remote operation

mod instructions;
mod layout;
mod retry;
mod state;
mod telemetry;

pub use instructions::{InstructionType, Instructions};
pub use layout::{ClientInstance, EnvironmentLayout, LayoutError, Role};
pub use retry::RetryPolicy;
pub use state::StateItem;
pub use telemetry::{ProxyTelemetryMessage, SeverityLevel};
