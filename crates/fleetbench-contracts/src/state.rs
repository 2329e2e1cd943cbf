// Copyright (C) 2025 Fleetbench Contributors
// SPDX-License-Identifier: MIT
//! State items - named JSON documents persisted per agent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;

/// A named state document as exchanged with the agent state API.
///
/// State items carry the identity alongside the definition so that an
/// update can be validated against the URL it is sent to: a PUT whose
/// body id does not match the path id is rejected by the server.
/// Identity is case-insensitive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateItem<T> {
    /// Unique ID of the state object.
    pub id: String,
    /// The state object/definition itself. Replaced whole on update,
    /// never merged.
    pub definition: T,
    /// Server-side timestamp of the last write.
    pub last_modified: DateTime<Utc>,
}

impl<T> StateItem<T> {
    /// Create a new state item stamped with the current time.
    pub fn new(id: impl Into<String>, definition: T) -> Self {
        Self {
            id: id.into(),
            definition,
            last_modified: Utc::now(),
        }
    }

    /// Case-insensitive identity comparison.
    pub fn has_id(&self, id: &str) -> bool {
        self.id.eq_ignore_ascii_case(id)
    }
}

impl StateItem<serde_json::Value> {
    /// Deserialize the raw JSON definition into a concrete state type.
    pub fn parse_definition<T: DeserializeOwned>(self) -> Result<StateItem<T>, serde_json::Error> {
        Ok(StateItem {
            id: self.id,
            definition: serde_json::from_value(self.definition)?,
            last_modified: self.last_modified,
        })
    }
}
