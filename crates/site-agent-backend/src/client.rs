//! Generic resource client contract
//!
//! The agent talks to every provider through this trait. Most methods
//! are polled repeatedly by reconciliation loops, so implementations
//! degrade to empty or best-effort results on transient failures
//! instead of propagating them; only operations whose outcome the
//! agent must act on return a `Result`.

use crate::error::Result;
use crate::structures::{Association, ClientResource, ComponentMap};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One usage record reported by a backend client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientUsage {
    /// Provider-assigned resource identifier
    pub resource_id: String,

    /// Allocated values per component, in provider-native units
    pub components: ComponentMap,
}

/// Provider-agnostic resource management contract
#[async_trait]
pub trait Client: Send + Sync {
    /// List all resources known to the provider.
    ///
    /// Partial failure degrades to the successfully listed subset.
    async fn list_resources(&self) -> Vec<ClientResource>;

    /// Look up a single resource, `None` when it does not exist.
    async fn get_resource(&self, resource_id: &str) -> Option<ClientResource>;

    /// Best-effort, idempotent deletion. Returns the resource id.
    async fn delete_resource(&self, resource_id: &str) -> String;

    /// Apply component limits to a resource, returning a confirmation
    /// message. Components the provider cannot express are ignored.
    async fn set_resource_limits(
        &self,
        resource_id: &str,
        limits: &ComponentMap,
    ) -> Result<String>;

    /// Current limits of a resource; empty map when unavailable.
    async fn get_resource_limits(&self, resource_id: &str) -> ComponentMap;

    /// Per-user limits of a resource, keyed by username.
    async fn get_resource_user_limits(&self, resource_id: &str) -> BTreeMap<String, ComponentMap>;

    /// Set limits for one user of a resource, returning a status message.
    async fn set_resource_user_limits(
        &self,
        resource_id: &str,
        username: &str,
        limits: &ComponentMap,
    ) -> String;

    /// Membership of a user in a resource account, `None` when absent.
    async fn get_association(&self, user: &str, resource_id: &str) -> Option<Association>;

    /// Ensure a user is a member of a resource account. Idempotent;
    /// degrades to a status message when the provider cannot comply.
    async fn create_association(
        &self,
        username: &str,
        resource_id: &str,
        default_account: Option<&str>,
    ) -> String;

    /// Remove a user from a resource account. Removing an absent
    /// member is a no-op.
    async fn delete_association(&self, username: &str, resource_id: &str) -> String;

    /// Usage records for the given resources. Resources that cannot be
    /// fetched are omitted.
    async fn get_usage_report(&self, resource_ids: &[String]) -> Vec<ClientUsage>;

    /// Usernames of all users of a resource.
    async fn list_resource_users(&self, resource_id: &str) -> Vec<String>;

    /// Create a home directory for a Linux user, returning its path.
    /// Providers without host-level users return an empty string.
    async fn create_linux_user_homedir(&self, _username: &str, _umask: &str) -> String {
        String::new()
    }
}
