//! Nscale backend settings validation

use serde::Deserialize;
use site_agent_backend::BackendError;

/// Settings that must be present in the agent-supplied mapping
pub const REQUIRED_SETTINGS: [&str; 4] =
    ["api_url", "organization_id", "project_id", "service_token"];

/// Kind of compute resource one backend instance manages
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    #[default]
    Instance,
    Cluster,
}

/// Validated Nscale backend settings
#[derive(Debug, Clone, Deserialize)]
pub struct NscaleSettings {
    /// Base URL of the compute API
    pub api_url: String,

    /// Nscale organization ID
    pub organization_id: String,

    /// Nscale project ID
    pub project_id: String,

    /// Service token for bearer authentication
    pub service_token: String,

    /// Prefix for resource names created by the agent
    #[serde(default = "default_resource_prefix")]
    pub resource_prefix: String,

    /// Flavor used for instances and cluster workload pools
    #[serde(default = "default_instance_type")]
    pub default_instance_type: String,

    /// Image for new instances, omitted from payloads when empty
    #[serde(default)]
    pub default_image_id: String,

    /// Network for new instances, omitted from payloads when empty
    #[serde(default)]
    pub default_network_id: String,

    /// Security groups for new instances
    #[serde(default)]
    pub default_security_group_ids: Vec<String>,

    #[serde(default)]
    pub resource_type: ResourceType,

    /// Base URL of the identity API; user management is disabled when
    /// not set
    #[serde(default)]
    pub identity_api_url: Option<String>,
}

fn default_resource_prefix() -> String {
    "waldur_".to_string()
}

fn default_instance_type() -> String {
    "standard".to_string()
}

impl NscaleSettings {
    /// Validate and load settings from the agent-supplied mapping.
    ///
    /// Required keys are checked by name first so the error points at
    /// the missing setting rather than at a deserialization detail.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, BackendError> {
        for key in REQUIRED_SETTINGS {
            if value.get(key).is_none() {
                return Err(BackendError::MissingSetting(key.to_string()));
            }
        }

        let mut settings: NscaleSettings = serde_json::from_value(value.clone())
            .map_err(|e| BackendError::InvalidSettings(e.to_string()))?;

        if !settings.api_url.starts_with("http://") && !settings.api_url.starts_with("https://") {
            return Err(BackendError::InvalidSettings(
                "api_url must start with http:// or https://".to_string(),
            ));
        }
        settings.api_url = settings.api_url.trim_end_matches('/').to_string();
        settings.identity_api_url = settings
            .identity_api_url
            .map(|url| url.trim_end_matches('/').to_string());

        Ok(settings)
    }
}
