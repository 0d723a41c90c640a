//! Nscale API wire types
//!
//! Every Nscale resource carries a `metadata` block and a type-specific
//! `spec` block; instances additionally report a `status` block. All
//! structs default missing fields so partial responses still parse.

use serde::{Deserialize, Serialize};
use site_agent_backend::ComponentMap;

/// Metadata block shared by all Nscale resources
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Metadata {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InstanceSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flavor_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub networking: Option<Networking>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Networking {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub security_groups: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InstanceStatus {
    pub power_state: Option<String>,
    pub provisioning_status: Option<String>,
}

/// Compute instance.
///
/// Older API variants return the sizing fields at the top level
/// instead of under `spec`; both shapes parse, and the accessors
/// prefer `spec`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Instance {
    pub metadata: Metadata,
    pub spec: InstanceSpec,
    pub status: InstanceStatus,
    cpu: Option<i64>,
    memory: Option<i64>,
    storage: Option<i64>,
}

impl Instance {
    pub fn cpu(&self) -> i64 {
        self.spec.cpu.or(self.cpu).unwrap_or(0)
    }

    pub fn memory(&self) -> i64 {
        self.spec.memory.or(self.memory).unwrap_or(0)
    }

    pub fn storage(&self) -> i64 {
        self.spec.storage.or(self.storage).unwrap_or(0)
    }

    /// Allocated cpu/memory/storage as a component map
    pub fn specs(&self) -> ComponentMap {
        ComponentMap::from([
            ("cpu".to_string(), self.cpu()),
            ("memory".to_string(), self.memory()),
            ("storage".to_string(), self.storage()),
        ])
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkloadPool {
    pub name: String,
    pub replicas: i64,
    pub flavor_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClusterSpec {
    pub workload_pools: Vec<WorkloadPool>,
}

/// Kubernetes-style compute cluster
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Cluster {
    pub metadata: Metadata,
    pub spec: ClusterSpec,
}

/// Network referenced by instances; owned by pre-existing
/// infrastructure, never by the agent
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Network {
    pub metadata: Metadata,
    pub spec: serde_json::Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SecurityGroup {
    pub metadata: Metadata,
    pub spec: serde_json::Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserSpec {
    /// Username the identity service authenticates
    pub subject: String,
    pub state: String,
}

/// Identity service user
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct User {
    pub metadata: Metadata,
    pub spec: UserSpec,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GroupSpec {
    pub user_ids: Vec<String>,
}

/// Identity service group, used as the membership list of one resource
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Group {
    pub metadata: Metadata,
    pub spec: GroupSpec,
}
