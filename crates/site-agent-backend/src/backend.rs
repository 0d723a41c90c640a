//! Backend lifecycle contract
//!
//! The agent invokes these hooks on its own schedule: `ping` and
//! `diagnostics` from health-check loops, the create/delete hooks when
//! processing orders, the pause/restore hooks when enforcing policy,
//! and `get_usage_report` from the accounting loop. Hooks other than
//! resource creation report failure through their return value rather
//! than an error, so a transient provider outage never aborts a loop.

use crate::error::Result;
use crate::structures::{BackendResourceInfo, ComponentMap, Resource};
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Accounting bucket for aggregate (non per-user) usage
pub const TOTAL_ACCOUNT_USAGE: &str = "TOTAL_ACCOUNT_USAGE";

/// Usage rows keyed by resource backend id, then by accounting bucket.
///
/// Contains exactly one row per requested resource; resources that
/// could not be fetched are zero-filled, never omitted.
pub type UsageReport = BTreeMap<String, BTreeMap<String, ComponentMap>>;

/// Lifecycle contract a provider backend implements for the agent
#[async_trait]
pub trait Backend: Send + Sync {
    /// Short identifier of the backend kind (e.g. "nscale")
    fn backend_type(&self) -> &str;

    /// Component keys this backend accounts for
    fn list_components(&self) -> Vec<String>;

    /// Whether reported usage may legitimately decrease between reports
    fn supports_decreasing_usage(&self) -> bool {
        false
    }

    /// Connectivity check. With `raise_exception` the failure is
    /// surfaced as an error instead of `false`.
    async fn ping(&self, raise_exception: bool) -> Result<bool>;

    /// Log backend health details; never propagates a failure.
    async fn diagnostics(&self) -> bool;

    /// Hook invoked before resource creation.
    async fn pre_create_resource(&self, resource: &Resource);

    /// Create the resource on the provider. Must be idempotent with
    /// respect to `backend_id`. Creation failures are fatal and
    /// propagate so the agent can mark the order failed.
    async fn create_backend_resource(
        &self,
        backend_id: &str,
        name: &str,
        organization: &str,
    ) -> Result<bool>;

    /// Hook invoked after the agent has recorded the created resource.
    async fn post_create_resource(
        &self,
        info: &BackendResourceInfo,
        resource: &Resource,
    ) -> Result<()>;

    /// Scale the resource down; `false` when the operation did not
    /// take effect.
    async fn downscale_resource(&self, backend_id: &str) -> bool;

    /// Pause the resource; `false` when the operation did not take effect.
    async fn pause_resource(&self, backend_id: &str) -> bool;

    /// Undo a pause or downscale; `false` when the operation did not
    /// take effect.
    async fn restore_resource(&self, backend_id: &str) -> bool;

    /// Provider-specific metadata of a resource; empty when unavailable.
    async fn get_resource_metadata(&self, backend_id: &str)
    -> BTreeMap<String, serde_json::Value>;

    /// Delete the resource on the provider, best-effort.
    async fn delete_resource(&self, resource: &Resource);

    /// Usage report in agent-native units, one row per requested id.
    async fn get_usage_report(&self, resource_backend_ids: &[String]) -> UsageReport;
}
