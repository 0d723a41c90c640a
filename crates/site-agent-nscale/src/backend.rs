//! Nscale backend implementation
//!
//! Manages the lifecycle of Nscale compute resources on behalf of the
//! site agent and translates between agent-native and provider-native
//! component values.
//!
//! Mapping:
//! - Agent project  -> Nscale project
//! - Agent resource -> Nscale compute instance or cluster
//! - Agent user     -> Nscale identity user (when identity is configured)

use crate::client::NscaleClient;
use crate::settings::{NscaleSettings, ResourceType};
use async_trait::async_trait;
use serde_json::{Value, json};
use site_agent_backend::backend::{Backend, TOTAL_ACCOUNT_USAGE, UsageReport};
use site_agent_backend::error::Result;
use site_agent_backend::{
    BackendComponent, BackendError, BackendResourceInfo, Client, ComponentMap, Resource,
};
use std::collections::BTreeMap;

/// Site-agent backend for Nscale compute resources
#[derive(Debug)]
pub struct NscaleBackend {
    client: NscaleClient,
    settings: NscaleSettings,
    components: BTreeMap<String, BackendComponent>,
}

impl NscaleBackend {
    /// Build a backend from the agent-supplied settings mapping and
    /// component configuration.
    pub fn new(
        settings: &Value,
        components: BTreeMap<String, BackendComponent>,
    ) -> Result<Self> {
        let settings = NscaleSettings::from_value(settings)?;
        let client = NscaleClient::new(
            &settings.api_url,
            &settings.organization_id,
            &settings.project_id,
            &settings.service_token,
            settings.identity_api_url.clone(),
        );
        Ok(Self {
            client,
            settings,
            components,
        })
    }

    /// The underlying API client, also serving the generic resource
    /// contract for this backend
    pub fn client(&self) -> &NscaleClient {
        &self.client
    }

    pub fn settings(&self) -> &NscaleSettings {
        &self.settings
    }

    /// Split the resource limits into provider-native and agent-native
    /// values per component.
    ///
    /// The provider speaks native units (e.g. MB) while the agent
    /// tracks its own (e.g. GB); `unit_factor` converts between them
    /// and the two outputs must never be conflated. Components absent
    /// from the resource limits are omitted from both outputs.
    pub fn collect_resource_limits(&self, resource: &Resource) -> (ComponentMap, ComponentMap) {
        let mut backend_limits = ComponentMap::new();
        let mut agent_limits = ComponentMap::new();

        let limits = resource.limits.as_map();
        for (component, config) in &self.components {
            if let Some(&value) = limits.get(component) {
                backend_limits.insert(component.clone(), value * config.unit_factor);
                agent_limits.insert(component.clone(), value);
            }
        }
        (backend_limits, agent_limits)
    }

    fn instance_create_payload(&self, backend_id: &str, name: &str) -> Value {
        let mut spec = serde_json::Map::new();
        spec.insert(
            "flavorId".to_string(),
            json!(self.settings.default_instance_type),
        );
        if !self.settings.default_image_id.is_empty() {
            spec.insert("imageId".to_string(), json!(self.settings.default_image_id));
        }

        let mut networking = serde_json::Map::new();
        if !self.settings.default_network_id.is_empty() {
            networking.insert(
                "networkId".to_string(),
                json!(self.settings.default_network_id),
            );
        }
        if !self.settings.default_security_group_ids.is_empty() {
            networking.insert(
                "securityGroups".to_string(),
                json!(self.settings.default_security_group_ids),
            );
        }
        if !networking.is_empty() {
            spec.insert("networking".to_string(), Value::Object(networking));
        }

        json!({
            "metadata": {"name": backend_id, "description": name},
            "spec": spec,
        })
    }

    fn cluster_create_payload(&self, backend_id: &str, name: &str) -> Value {
        json!({
            "metadata": {"name": backend_id, "description": name},
            "spec": {
                "workloadPools": [{
                    "name": "default",
                    "replicas": 1,
                    "flavorId": self.settings.default_instance_type,
                }],
            },
        })
    }
}

#[async_trait]
impl Backend for NscaleBackend {
    fn backend_type(&self) -> &str {
        "nscale"
    }

    fn list_components(&self) -> Vec<String> {
        self.components.keys().cloned().collect()
    }

    /// Usage reflects live allocation, which can legitimately shrink.
    fn supports_decreasing_usage(&self) -> bool {
        true
    }

    async fn ping(&self, raise_exception: bool) -> Result<bool> {
        // Listing networks is the cheapest authenticated call
        match self.client.get_networks().await {
            Ok(_) => Ok(true),
            Err(e) => {
                if raise_exception {
                    return Err(BackendError::NotAvailable(format!(
                        "Nscale backend not available: {e}"
                    )));
                }
                tracing::error!("Nscale backend not available: {e}");
                Ok(false)
            }
        }
    }

    async fn diagnostics(&self) -> bool {
        let counts = async {
            let networks = self.client.get_networks().await?;
            let instances = self.client.get_compute_instances().await?;
            let clusters = self.client.get_compute_clusters().await?;
            Ok::<_, crate::error::NscaleError>((networks.len(), instances.len(), clusters.len()))
        };

        match counts.await {
            Ok((networks, instances, clusters)) => {
                tracing::info!(
                    "Nscale backend diagnostics: {networks} networks, {instances} instances, {clusters} clusters"
                );
                true
            }
            Err(e) => {
                tracing::error!("Nscale diagnostics failed: {e}");
                false
            }
        }
    }

    async fn pre_create_resource(&self, _resource: &Resource) {
        if self.settings.default_network_id.is_empty() {
            return;
        }
        if let Err(e) = self.client.get_network(&self.settings.default_network_id).await {
            tracing::warn!(
                "Default network {} not found: {e}",
                self.settings.default_network_id
            );
        }
    }

    async fn create_backend_resource(
        &self,
        backend_id: &str,
        name: &str,
        _organization: &str,
    ) -> Result<bool> {
        tracing::info!("Creating resource {name} in Nscale (backend id = {backend_id})");

        if self.client.get_resource(backend_id).await.is_some() {
            tracing::info!("The resource with ID {backend_id} already exists in Nscale");
            return Ok(true);
        }

        match self.settings.resource_type {
            ResourceType::Instance => {
                let payload = self.instance_create_payload(backend_id, name);
                self.client
                    .create_compute_instance(payload)
                    .await
                    .map_err(|e| {
                        tracing::error!("Failed to create compute instance {backend_id}: {e}");
                        BackendError::CreationFailed(format!(
                            "Failed to create compute instance: {e}"
                        ))
                    })?;
                tracing::info!("Created Nscale compute instance {backend_id}");
            }
            ResourceType::Cluster => {
                let payload = self.cluster_create_payload(backend_id, name);
                self.client
                    .create_compute_cluster(payload)
                    .await
                    .map_err(|e| {
                        tracing::error!("Failed to create cluster {backend_id}: {e}");
                        BackendError::CreationFailed(format!("Failed to create cluster: {e}"))
                    })?;
                tracing::info!("Created Nscale compute cluster {backend_id}");
            }
        }
        Ok(true)
    }

    async fn post_create_resource(
        &self,
        info: &BackendResourceInfo,
        resource: &Resource,
    ) -> Result<()> {
        // Creation uses defaults; the definitive specs are only known
        // after the agent's validation pass, so they are applied here
        // as a second step.
        let (backend_limits, _) = self.collect_resource_limits(resource);
        if backend_limits.is_empty() {
            tracing::info!("Skipping setting of limits for {}", info.backend_id);
            return Ok(());
        }

        tracing::info!(
            "Updating instance {} with limits: {backend_limits:?}",
            info.backend_id
        );
        self.client
            .set_resource_limits(&info.backend_id, &backend_limits)
            .await?;
        Ok(())
    }

    async fn downscale_resource(&self, backend_id: &str) -> bool {
        match self.client.stop_instance(backend_id).await {
            Ok(()) => {
                tracing::info!("Downscaled resource {backend_id}");
                true
            }
            Err(e) => {
                tracing::error!("Failed to downscale resource {backend_id}: {e}");
                false
            }
        }
    }

    async fn pause_resource(&self, backend_id: &str) -> bool {
        match self.client.stop_instance(backend_id).await {
            Ok(()) => {
                tracing::info!("Paused resource {backend_id}");
                true
            }
            Err(e) => {
                tracing::error!("Failed to pause resource {backend_id}: {e}");
                false
            }
        }
    }

    async fn restore_resource(&self, backend_id: &str) -> bool {
        match self.client.start_instance(backend_id).await {
            Ok(()) => {
                tracing::info!("Restored resource {backend_id}");
                true
            }
            Err(e) => {
                tracing::error!("Failed to restore resource {backend_id}: {e}");
                false
            }
        }
    }

    async fn get_resource_metadata(
        &self,
        backend_id: &str,
    ) -> BTreeMap<String, serde_json::Value> {
        let instance = match self.client.get_compute_instance(backend_id).await {
            Ok(instance) => instance,
            Err(e) => {
                tracing::error!("Failed to get resource metadata for {backend_id}: {e}");
                return BTreeMap::new();
            }
        };

        BTreeMap::from([
            ("instance_id".to_string(), json!(instance.metadata.id)),
            ("instance_name".to_string(), json!(instance.metadata.name)),
            ("flavor_id".to_string(), json!(instance.spec.flavor_id)),
            ("image_id".to_string(), json!(instance.spec.image_id)),
            ("power_state".to_string(), json!(instance.status.power_state)),
            (
                "provisioning_status".to_string(),
                json!(instance.status.provisioning_status),
            ),
            ("cpu".to_string(), json!(instance.cpu())),
            ("memory".to_string(), json!(instance.memory())),
            ("storage".to_string(), json!(instance.storage())),
        ])
    }

    async fn delete_resource(&self, resource: &Resource) {
        match self.settings.resource_type {
            ResourceType::Cluster => {
                let backend_id = resource.backend_id.trim();
                if backend_id.is_empty() {
                    tracing::warn!(
                        "Resource {} has an empty backend id, skipping cluster deletion",
                        resource.name
                    );
                    return;
                }
                if let Err(e) = self.client.delete_compute_cluster(backend_id).await {
                    tracing::error!("Failed to delete cluster {backend_id}: {e}");
                }
            }
            ResourceType::Instance => {
                self.client.delete_resource(&resource.backend_id).await;
            }
        }
    }

    async fn get_usage_report(&self, resource_backend_ids: &[String]) -> UsageReport {
        let mut report = UsageReport::new();

        for resource_id in resource_backend_ids {
            let usage: ComponentMap = match self.client.get_compute_instance(resource_id).await {
                Ok(instance) => {
                    let specs = instance.specs();
                    self.components
                        .iter()
                        .map(|(component, config)| {
                            let allocated = specs.get(component).copied().unwrap_or(0);
                            (component.clone(), allocated / config.unit_factor.max(1))
                        })
                        .collect()
                }
                Err(e) => {
                    tracing::error!("Failed to get usage for resource {resource_id}: {e}");
                    self.components
                        .keys()
                        .map(|component| (component.clone(), 0))
                        .collect()
                }
            };

            report.insert(
                resource_id.clone(),
                BTreeMap::from([(TOTAL_ACCOUNT_USAGE.to_string(), usage)]),
            );
        }
        report
    }
}
