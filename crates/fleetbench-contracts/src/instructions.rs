// Copyright (C) 2025 Fleetbench Contributors
// SPDX-License-Identifier: MIT
//! Instructions - typed command payloads pushed between peers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::StateItem;

/// The kind of command carried by an [`Instructions`] payload.
///
/// A `ClientServerReset` must be observed by the peer before any
/// `ClientServerStartExecution` for the same logical run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstructionType {
    /// Tear down any in-flight workload state on the peer.
    ClientServerReset,
    /// Begin executing the workload described by the properties.
    ClientServerStartExecution,
    /// Stop the currently executing workload.
    ClientServerStopExecution,
    /// Shut the peer agent down.
    ClientServerExit,
}

impl InstructionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClientServerReset => "ClientServerReset",
            Self::ClientServerStartExecution => "ClientServerStartExecution",
            Self::ClientServerStopExecution => "ClientServerStopExecution",
            Self::ClientServerExit => "ClientServerExit",
        }
    }
}

/// A command payload sent from one agent to another.
///
/// Immutable once sent; each send wraps the instructions in a fresh
/// [`StateItem`] whose id is the correlation id for that send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Instructions {
    /// The command type.
    #[serde(rename = "type")]
    pub instruction_type: InstructionType,
    /// Scalar properties qualifying the command (scenario name, tool
    /// type, connection counts and similar).
    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
}

impl Instructions {
    pub fn new(instruction_type: InstructionType) -> Self {
        Self {
            instruction_type,
            properties: BTreeMap::new(),
        }
    }

    /// Builder-style property attachment.
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Wrap these instructions for sending, assigning a fresh
    /// correlation id.
    pub fn into_item(self) -> StateItem<Instructions> {
        StateItem::new(Uuid::new_v4().to_string(), self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_wire_format() {
        let instructions = Instructions::new(InstructionType::ClientServerReset)
            .with_property("Scenario", "AnyScenario")
            .with_property("Connections", 256);

        let json = serde_json::to_value(&instructions).unwrap();
        assert_eq!(json["type"], "ClientServerReset");
        assert_eq!(json["properties"]["Connections"], 256);

        let back: Instructions = serde_json::from_value(json).unwrap();
        assert_eq!(back, instructions);
    }

    #[test]
    fn each_send_gets_a_fresh_correlation_id() {
        let first = Instructions::new(InstructionType::ClientServerReset).into_item();
        let second = Instructions::new(InstructionType::ClientServerReset).into_item();
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn missing_properties_default_to_empty() {
        let parsed: Instructions =
            serde_json::from_value(serde_json::json!({ "type": "ClientServerExit" })).unwrap();
        assert!(parsed.properties.is_empty());
    }
}
