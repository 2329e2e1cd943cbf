// Copyright (C) 2025 Fleetbench Contributors
// SPDX-License-Identifier: MIT
//! Environment layout - the static role assignment for a multi-machine run.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The part an agent plays in a coordinated run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// Drives the run: polls the server side, pushes instructions.
    Client,
    /// Hosts the target side of the workload and reacts to instructions.
    Server,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Client => "Client",
            Self::Server => "Server",
        }
    }
}

/// One agent in the environment layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInstance {
    /// Agent name, unique within the layout (case-insensitive).
    pub name: String,
    /// Address at which the agent's API is reachable.
    pub ip_address: String,
    /// The role this agent plays.
    pub role: Role,
}

impl ClientInstance {
    pub fn new(name: impl Into<String>, ip_address: impl Into<String>, role: Role) -> Self {
        Self {
            name: name.into(),
            ip_address: ip_address.into(),
            role,
        }
    }
}

/// Layout lookup failures.
#[derive(Debug, Error)]
pub enum LayoutError {
    /// No instance with the given name exists in the layout.
    #[error("no instance named '{0}' exists in the environment layout")]
    InstanceNotFound(String),
    /// No instance plays the requested role.
    #[error("no instance with role '{0}' exists in the environment layout")]
    RoleNotFound(&'static str),
}

/// The static set of agents participating in a run.
///
/// Created once at process start from configuration and read-only for the
/// process lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentLayout {
    pub clients: Vec<ClientInstance>,
}

impl EnvironmentLayout {
    pub fn new(clients: Vec<ClientInstance>) -> Self {
        Self { clients }
    }

    /// Find an instance by name, case-insensitively.
    pub fn instance(&self, name: &str) -> Result<&ClientInstance, LayoutError> {
        self.clients
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| LayoutError::InstanceNotFound(name.to_string()))
    }

    /// The first instance playing the given role.
    pub fn instance_with_role(&self, role: Role) -> Result<&ClientInstance, LayoutError> {
        self.clients
            .iter()
            .find(|c| c.role == role)
            .ok_or(LayoutError::RoleNotFound(role.as_str()))
    }

    /// All instances playing the given role.
    pub fn instances_with_role(&self, role: Role) -> impl Iterator<Item = &ClientInstance> {
        self.clients.iter().filter(move |c| c.role == role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> EnvironmentLayout {
        EnvironmentLayout::new(vec![
            ClientInstance::new("agent-01", "10.0.0.1", Role::Client),
            ClientInstance::new("agent-02", "10.0.0.2", Role::Server),
        ])
    }

    #[test]
    fn finds_instances_by_name_case_insensitively() {
        let layout = layout();
        assert_eq!(layout.instance("AGENT-02").unwrap().ip_address, "10.0.0.2");
        assert!(layout.instance("agent-03").is_err());
    }

    #[test]
    fn finds_instances_by_role() {
        let layout = layout();
        assert_eq!(layout.instance_with_role(Role::Server).unwrap().name, "agent-02");
        assert_eq!(layout.instances_with_role(Role::Client).count(), 1);
    }
}
