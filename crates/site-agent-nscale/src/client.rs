//! Nscale API client
//!
//! Wraps the Nscale compute and identity REST APIs with service-token
//! authentication and implements the generic [`Client`] contract on
//! top of the typed endpoints.

use crate::api::{Cluster, Group, Instance, Metadata, Network, SecurityGroup, User};
use crate::error::{NscaleError, Result};
use async_trait::async_trait;
use reqwest::{Method, StatusCode, header};
use serde_json::{Value, json};
use site_agent_backend::error::Result as BackendResult;
use site_agent_backend::{Association, BackendError, Client, ClientResource, ClientUsage, ComponentMap};
use std::collections::BTreeMap;

/// Longest response-body excerpt embedded in an API error
const BODY_PREVIEW_LEN: usize = 500;

/// Longest body excerpt embedded in a parse error
const TEXT_PREVIEW_LEN: usize = 200;

/// Component keys an instance spec update can express
const SETTABLE_LIMIT_COMPONENTS: [&str; 3] = ["cpu", "memory", "storage"];

/// Client for the Nscale compute and identity APIs
#[derive(Debug)]
pub struct NscaleClient {
    http: reqwest::Client,
    api_url: String,
    identity_api_url: Option<String>,
    organization_id: String,
    project_id: String,
    service_token: String,
}

impl NscaleClient {
    /// Create a client against the compute API, optionally with an
    /// identity API base for user management. Trailing slashes on both
    /// base URLs are stripped.
    pub fn new(
        api_url: impl Into<String>,
        organization_id: impl Into<String>,
        project_id: impl Into<String>,
        service_token: impl Into<String>,
        identity_api_url: Option<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: api_url.into().trim_end_matches('/').to_string(),
            identity_api_url: identity_api_url.map(|url| url.trim_end_matches('/').to_string()),
            organization_id: organization_id.into(),
            project_id: project_id.into(),
            service_token: service_token.into(),
        }
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn organization_id(&self) -> &str {
        &self.organization_id
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Whether the identity API was configured at construction
    pub fn identity_configured(&self) -> bool {
        self.identity_api_url.is_some()
    }

    /// Issue a request against a base URL and parse the JSON response.
    async fn request_base(
        &self,
        method: Method,
        base: &str,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value> {
        let url = format!("{base}{path}");
        tracing::debug!("Nscale API request: {method} {url}");

        let mut request = self
            .http
            .request(method.clone(), &url)
            .bearer_auth(&self.service_token)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ACCEPT, "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            tracing::error!("Nscale API request failed: {method} {url}: {e}");
            NscaleError::Transport {
                method: method.to_string(),
                url: url.clone(),
                source: e,
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body = truncate(&body, BODY_PREVIEW_LEN);
            tracing::error!(
                "Nscale API request failed: {method} {url} | Response Status: {status} | Response Body: {body}"
            );
            return Err(NscaleError::Api {
                method: method.to_string(),
                url,
                status: status.as_u16(),
                body,
            });
        }

        self.parse_json_response(&method, &url, response).await
    }

    /// Parse a successful response, requiring a JSON content type.
    async fn parse_json_response(
        &self,
        method: &Method,
        url: &str,
        response: reqwest::Response,
    ) -> Result<Value> {
        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(json!({}));
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        let body = response.text().await.map_err(|e| NscaleError::Transport {
            method: method.to_string(),
            url: url.to_string(),
            source: e,
        })?;

        if body.is_empty() {
            tracing::warn!("Empty response content for {url}");
            return Ok(json!({}));
        }

        if !content_type.contains("application/json") {
            let preview = truncate(&body, TEXT_PREVIEW_LEN);
            tracing::warn!(
                "Non-JSON response. Content-Type: {content_type}, Status: {status}, Body: {preview}"
            );
            return Err(NscaleError::UnexpectedContentType {
                content_type,
                status: status.as_u16(),
                preview,
            });
        }

        serde_json::from_str(&body).map_err(|e| {
            let preview = truncate(&body, TEXT_PREVIEW_LEN);
            tracing::error!("Failed to parse JSON response. Status: {status}, Body: {preview}");
            NscaleError::InvalidJson {
                status: status.as_u16(),
                preview,
                source: e,
            }
        })
    }

    /// Request against the compute API base
    async fn request(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value> {
        self.request_base(method, &self.api_url, path, body).await
    }

    /// Request against the identity API base; fails fast when no
    /// identity URL was configured.
    async fn identity_request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value> {
        let base = self
            .identity_api_url
            .as_deref()
            .ok_or(NscaleError::IdentityNotConfigured)?;
        self.request_base(method, base, path, body).await
    }

    // Network endpoints

    pub async fn get_networks(&self) -> Result<Vec<Network>> {
        let value = self.request(Method::GET, "/api/v2/networks", None).await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn get_network(&self, network_id: &str) -> Result<Network> {
        let value = self
            .request(Method::GET, &format!("/api/v2/networks/{network_id}"), None)
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn create_network(&self, network_data: Value) -> Result<Network> {
        let value = self
            .request(Method::POST, "/api/v2/networks", Some(&network_data))
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn delete_network(&self, network_id: &str) -> Result<()> {
        self.request(
            Method::DELETE,
            &format!("/api/v2/networks/{network_id}"),
            None,
        )
        .await?;
        Ok(())
    }

    // Security group endpoints

    pub async fn get_security_groups(&self) -> Result<Vec<SecurityGroup>> {
        let value = self
            .request(Method::GET, "/api/v2/security-groups", None)
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn create_security_group(&self, security_group_data: Value) -> Result<SecurityGroup> {
        let value = self
            .request(
                Method::POST,
                "/api/v2/security-groups",
                Some(&security_group_data),
            )
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    // Compute instance endpoints

    pub async fn get_compute_instances(&self) -> Result<Vec<Instance>> {
        let value = self.request(Method::GET, "/api/v2/instances", None).await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn get_compute_instance(&self, instance_id: &str) -> Result<Instance> {
        let value = self
            .request(
                Method::GET,
                &format!("/api/v2/instances/{instance_id}"),
                None,
            )
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn create_compute_instance(&self, instance_data: Value) -> Result<Instance> {
        let value = self
            .request(Method::POST, "/api/v2/instances", Some(&instance_data))
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Spec-level patch of an existing instance (resize)
    pub async fn update_compute_instance(
        &self,
        instance_id: &str,
        instance_data: Value,
    ) -> Result<Instance> {
        let value = self
            .request(
                Method::PUT,
                &format!("/api/v2/instances/{instance_id}"),
                Some(&instance_data),
            )
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn delete_compute_instance(&self, instance_id: &str) -> Result<()> {
        self.request(
            Method::DELETE,
            &format!("/api/v2/instances/{instance_id}"),
            None,
        )
        .await?;
        Ok(())
    }

    pub async fn stop_instance(&self, instance_id: &str) -> Result<()> {
        self.request(
            Method::POST,
            &format!("/api/v2/instances/{instance_id}/stop"),
            None,
        )
        .await?;
        Ok(())
    }

    pub async fn start_instance(&self, instance_id: &str) -> Result<()> {
        self.request(
            Method::POST,
            &format!("/api/v2/instances/{instance_id}/start"),
            None,
        )
        .await?;
        Ok(())
    }

    // Compute cluster endpoints

    pub async fn get_compute_clusters(&self) -> Result<Vec<Cluster>> {
        let value = self.request(Method::GET, "/api/v2/clusters", None).await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn get_compute_cluster(&self, cluster_id: &str) -> Result<Cluster> {
        let value = self
            .request(Method::GET, &format!("/api/v2/clusters/{cluster_id}"), None)
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn create_compute_cluster(&self, cluster_data: Value) -> Result<Cluster> {
        let value = self
            .request(Method::POST, "/api/v2/clusters", Some(&cluster_data))
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn delete_compute_cluster(&self, cluster_id: &str) -> Result<()> {
        self.request(
            Method::DELETE,
            &format!("/api/v2/clusters/{cluster_id}"),
            None,
        )
        .await?;
        Ok(())
    }

    // Identity user endpoints

    pub async fn list_users(&self) -> Result<Vec<User>> {
        let value = self
            .identity_request(
                Method::GET,
                &format!("/api/v1/organizations/{}/users", self.organization_id),
                None,
            )
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn get_user(&self, user_id: &str) -> Result<User> {
        let value = self
            .identity_request(
                Method::GET,
                &format!(
                    "/api/v1/organizations/{}/users/{user_id}",
                    self.organization_id
                ),
                None,
            )
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn create_user(&self, user_data: Value) -> Result<User> {
        let value = self
            .identity_request(
                Method::POST,
                &format!("/api/v1/organizations/{}/users", self.organization_id),
                Some(&user_data),
            )
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn update_user(&self, user_id: &str, user_data: Value) -> Result<User> {
        let value = self
            .identity_request(
                Method::PUT,
                &format!(
                    "/api/v1/organizations/{}/users/{user_id}",
                    self.organization_id
                ),
                Some(&user_data),
            )
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn delete_user(&self, user_id: &str) -> Result<()> {
        self.identity_request(
            Method::DELETE,
            &format!(
                "/api/v1/organizations/{}/users/{user_id}",
                self.organization_id
            ),
            None,
        )
        .await?;
        Ok(())
    }

    // Identity group endpoints

    pub async fn list_groups(&self) -> Result<Vec<Group>> {
        let value = self
            .identity_request(
                Method::GET,
                &format!("/api/v1/organizations/{}/groups", self.organization_id),
                None,
            )
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn get_group(&self, group_id: &str) -> Result<Group> {
        let value = self
            .identity_request(
                Method::GET,
                &format!(
                    "/api/v1/organizations/{}/groups/{group_id}",
                    self.organization_id
                ),
                None,
            )
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn create_group(&self, group_data: Value) -> Result<Group> {
        let value = self
            .identity_request(
                Method::POST,
                &format!("/api/v1/organizations/{}/groups", self.organization_id),
                Some(&group_data),
            )
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn update_group(&self, group_id: &str, group_data: Value) -> Result<Group> {
        let value = self
            .identity_request(
                Method::PUT,
                &format!(
                    "/api/v1/organizations/{}/groups/{group_id}",
                    self.organization_id
                ),
                Some(&group_data),
            )
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn delete_group(&self, group_id: &str) -> Result<()> {
        self.identity_request(
            Method::DELETE,
            &format!(
                "/api/v1/organizations/{}/groups/{group_id}",
                self.organization_id
            ),
            None,
        )
        .await?;
        Ok(())
    }

    // Identity helpers

    /// Find a user by username. The identity API has no
    /// lookup-by-name endpoint, so this scans the organization's users.
    pub async fn find_user_by_subject(&self, username: &str) -> Result<Option<User>> {
        let users = self.list_users().await?;
        Ok(users.into_iter().find(|user| user.spec.subject == username))
    }

    /// Find the membership group of a resource.
    ///
    /// Groups carry no foreign key to the resource they belong to; the
    /// agent names them after the resource backend id on creation, so
    /// lookup matches on that naming convention (name ends with the
    /// backend id).
    pub async fn find_project_group(&self, resource_id: &str) -> Result<Option<Group>> {
        let groups = self.list_groups().await?;
        Ok(groups
            .into_iter()
            .find(|group| group.metadata.name.ends_with(resource_id)))
    }

    /// Ensure the user exists and is a member of the resource's group.
    async fn ensure_association(&self, username: &str, resource_id: &str) -> Result<()> {
        let user = match self.find_user_by_subject(username).await? {
            Some(user) => user,
            None => {
                tracing::info!("Creating identity user for {username}");
                self.create_user(json!({"spec": {"subject": username, "state": "active"}}))
                    .await?
            }
        };

        match self.find_project_group(resource_id).await? {
            None => {
                tracing::info!("Creating membership group for resource {resource_id}");
                self.create_group(json!({
                    "metadata": {"name": resource_id},
                    "spec": {"userIds": [user.metadata.id]},
                }))
                .await?;
            }
            Some(group) => {
                if group.spec.user_ids.contains(&user.metadata.id) {
                    tracing::debug!("User {username} is already a member of {resource_id}");
                } else {
                    let mut user_ids = group.spec.user_ids;
                    user_ids.push(user.metadata.id);
                    self.update_group(&group.metadata.id, json!({"spec": {"userIds": user_ids}}))
                        .await?;
                }
            }
        }
        Ok(())
    }

    /// Remove the user from the resource's group; absent members are
    /// a no-op.
    async fn remove_association(&self, username: &str, resource_id: &str) -> Result<()> {
        let Some(user) = self.find_user_by_subject(username).await? else {
            tracing::debug!("User {username} not found, nothing to remove");
            return Ok(());
        };
        let Some(group) = self.find_project_group(resource_id).await? else {
            tracing::debug!("No membership group for resource {resource_id}");
            return Ok(());
        };

        if group.spec.user_ids.contains(&user.metadata.id) {
            let user_ids: Vec<String> = group
                .spec
                .user_ids
                .into_iter()
                .filter(|id| *id != user.metadata.id)
                .collect();
            self.update_group(&group.metadata.id, json!({"spec": {"userIds": user_ids}}))
                .await?;
        }
        Ok(())
    }

    fn client_resource(&self, metadata: &Metadata) -> ClientResource {
        let name = if metadata.id.is_empty() {
            metadata.name.clone()
        } else {
            metadata.id.clone()
        };
        ClientResource {
            name,
            description: metadata.name.clone(),
            organization: self.project_id.clone(),
            backend_id: metadata.id.clone(),
        }
    }
}

#[async_trait]
impl Client for NscaleClient {
    async fn list_resources(&self) -> Vec<ClientResource> {
        let mut resources = Vec::new();

        match self.get_compute_instances().await {
            Ok(instances) => {
                resources.extend(
                    instances
                        .iter()
                        .map(|instance| self.client_resource(&instance.metadata)),
                );
            }
            Err(e) => tracing::warn!("Failed to list compute instances: {e}"),
        }

        match self.get_compute_clusters().await {
            Ok(clusters) => {
                resources.extend(
                    clusters
                        .iter()
                        .map(|cluster| self.client_resource(&cluster.metadata)),
                );
            }
            Err(e) => tracing::warn!("Failed to list compute clusters: {e}"),
        }

        resources
    }

    async fn get_resource(&self, resource_id: &str) -> Option<ClientResource> {
        match self.get_compute_instance(resource_id).await {
            Ok(instance) => return Some(self.client_resource(&instance.metadata)),
            Err(e) => tracing::debug!("Instance lookup failed for {resource_id}: {e}"),
        }
        match self.get_compute_cluster(resource_id).await {
            Ok(cluster) => Some(self.client_resource(&cluster.metadata)),
            Err(e) => {
                tracing::debug!("Cluster lookup failed for {resource_id}: {e}");
                None
            }
        }
    }

    async fn delete_resource(&self, resource_id: &str) -> String {
        if let Err(instance_err) = self.delete_compute_instance(resource_id).await {
            tracing::warn!(
                "Failed to delete {resource_id} as instance, trying cluster: {instance_err}"
            );
            if let Err(cluster_err) = self.delete_compute_cluster(resource_id).await {
                tracing::warn!("Failed to delete {resource_id} as cluster: {cluster_err}");
            }
        }
        resource_id.to_string()
    }

    async fn set_resource_limits(
        &self,
        resource_id: &str,
        limits: &ComponentMap,
    ) -> BackendResult<String> {
        let mut spec = serde_json::Map::new();
        for component in SETTABLE_LIMIT_COMPONENTS {
            if let Some(value) = limits.get(component) {
                spec.insert(component.to_string(), json!(value));
            }
        }

        if spec.is_empty() {
            tracing::info!("No settable limit components for {resource_id}, skipping update");
        } else {
            self.update_compute_instance(resource_id, json!({"spec": spec}))
                .await
                .map_err(|e| {
                    BackendError::OperationFailed(format!(
                        "Failed to set limits for {resource_id}: {e}"
                    ))
                })?;
        }
        Ok(format!("Limits set for {resource_id}"))
    }

    async fn get_resource_limits(&self, resource_id: &str) -> ComponentMap {
        match self.get_compute_instance(resource_id).await {
            Ok(instance) => instance.specs(),
            Err(e) => {
                tracing::warn!("Failed to get limits for {resource_id}: {e}");
                ComponentMap::new()
            }
        }
    }

    async fn get_resource_user_limits(&self, _resource_id: &str) -> BTreeMap<String, ComponentMap> {
        // Per-user limits are not supported by Nscale
        BTreeMap::new()
    }

    async fn set_resource_user_limits(
        &self,
        _resource_id: &str,
        username: &str,
        _limits: &ComponentMap,
    ) -> String {
        format!("User limits not supported for {username}")
    }

    async fn get_association(&self, user: &str, resource_id: &str) -> Option<Association> {
        if !self.identity_configured() {
            return None;
        }

        let found_user = match self.find_user_by_subject(user).await {
            Ok(Some(found)) => found,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("Failed to look up user {user}: {e}");
                return None;
            }
        };
        let group = match self.find_project_group(resource_id).await {
            Ok(Some(group)) => group,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("Failed to look up group for {resource_id}: {e}");
                return None;
            }
        };

        group
            .spec
            .user_ids
            .contains(&found_user.metadata.id)
            .then(|| Association {
                user: user.to_string(),
                account: resource_id.to_string(),
            })
    }

    async fn create_association(
        &self,
        username: &str,
        resource_id: &str,
        _default_account: Option<&str>,
    ) -> String {
        if !self.identity_configured() {
            tracing::debug!("Identity service not configured, skipping association creation");
            return format!("Identity service not configured, no association for {username}");
        }

        match self.ensure_association(username, resource_id).await {
            Ok(()) => username.to_string(),
            Err(e) => {
                tracing::warn!("Failed to create association for {username} in {resource_id}: {e}");
                format!("Failed to create association for {username}")
            }
        }
    }

    async fn delete_association(&self, username: &str, resource_id: &str) -> String {
        if !self.identity_configured() {
            tracing::debug!("Identity service not configured, skipping association deletion");
            return format!("Identity service not configured, no association for {username}");
        }

        match self.remove_association(username, resource_id).await {
            Ok(()) => username.to_string(),
            Err(e) => {
                tracing::warn!(
                    "Failed to delete association for {username} from {resource_id}: {e}"
                );
                format!("Failed to delete association for {username}")
            }
        }
    }

    async fn get_usage_report(&self, resource_ids: &[String]) -> Vec<ClientUsage> {
        let mut report = Vec::new();
        for resource_id in resource_ids {
            match self.get_compute_instance(resource_id).await {
                Ok(instance) => report.push(ClientUsage {
                    resource_id: resource_id.clone(),
                    components: instance.specs(),
                }),
                Err(e) => tracing::warn!("Failed to get usage for resource {resource_id}: {e}"),
            }
        }
        report
    }

    async fn list_resource_users(&self, resource_id: &str) -> Vec<String> {
        if !self.identity_configured() {
            return Vec::new();
        }

        let group = match self.find_project_group(resource_id).await {
            Ok(Some(group)) => group,
            Ok(None) => return Vec::new(),
            Err(e) => {
                tracing::warn!("Failed to look up group for {resource_id}: {e}");
                return Vec::new();
            }
        };

        let mut usernames = Vec::new();
        for user_id in &group.spec.user_ids {
            match self.get_user(user_id).await {
                Ok(user) => usernames.push(user.spec.subject),
                Err(e) => tracing::warn!("Failed to resolve user {user_id}: {e}"),
            }
        }
        usernames
    }
}

/// Truncate to at most `limit` bytes on a character boundary
fn truncate(text: &str, limit: usize) -> String {
    if text.len() <= limit {
        return text.to_string();
    }
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_text() {
        assert_eq!(truncate("hello", 500), "hello");
    }

    #[test]
    fn test_truncate_respects_char_boundary() {
        // Multi-byte character straddling the limit
        let text = "aaàè";
        let truncated = truncate(text, 3);
        assert!(truncated.len() <= 3);
        assert!(text.starts_with(&truncated));
    }

    #[test]
    fn test_base_urls_are_normalized() {
        let client = NscaleClient::new(
            "https://compute.nks.example.com/",
            "org-1",
            "proj-1",
            "token-abc",
            Some("https://identity.nks.example.com/".to_string()),
        );

        assert_eq!(client.api_url(), "https://compute.nks.example.com");
        assert!(client.identity_configured());
    }
}
