//! Data structures exchanged between the site agent and backend plugins

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Mapping of component key (e.g. "cpu", "memory") to an integer value.
///
/// Used for limits as well as usage values; the unit of each value is
/// whatever side of the adapter produced it (agent-native or
/// provider-native), so the two must never be mixed in one map.
pub type ComponentMap = BTreeMap<String, i64>;

/// A provider resource as reported through the generic client contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientResource {
    /// Display name of the resource
    pub name: String,

    /// Free-form description
    pub description: String,

    /// Organization or project the resource belongs to
    pub organization: String,

    /// Provider-assigned identifier
    pub backend_id: String,
}

/// Membership of a user in a resource account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Association {
    pub user: String,
    pub account: String,
}

/// Provider-assigned identity of a resource recorded by the agent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendResourceInfo {
    pub backend_id: String,
}

/// Agent-side resource handed to lifecycle hooks
#[derive(Debug, Clone, Default)]
pub struct Resource {
    /// Display name
    pub name: String,

    /// Provider-assigned identifier, empty until provisioned
    pub backend_id: String,

    /// Limits requested for this resource, in agent-native units
    pub limits: ResourceLimits,
}

/// Component limits tracked by the agent, keyed by component name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits(ComponentMap);

impl ResourceLimits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, component: impl Into<String>, value: i64) {
        self.0.insert(component.into(), value);
    }

    pub fn get(&self, component: &str) -> Option<i64> {
        self.0.get(component).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// View the limits as a plain component map
    pub fn as_map(&self) -> &ComponentMap {
        &self.0
    }
}

impl From<ComponentMap> for ResourceLimits {
    fn from(map: ComponentMap) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, i64)> for ResourceLimits {
    fn from_iter<I: IntoIterator<Item = (String, i64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Accounting configuration for one component, supplied by the agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendComponent {
    /// Unit the agent reports in (e.g. "GB")
    pub measured_unit: String,

    /// Multiplier from agent-native to provider-native units
    #[serde(default = "default_unit_factor")]
    pub unit_factor: i64,

    /// Accounting model, e.g. "limit" or "usage"
    pub accounting_type: String,

    /// Human-readable component label
    pub label: String,
}

fn default_unit_factor() -> i64 {
    1
}
