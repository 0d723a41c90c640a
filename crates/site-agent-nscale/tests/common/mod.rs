//! Shared fixtures for Nscale plugin tests

#![allow(dead_code)]

use serde_json::{Value, json};
use site_agent_nscale::NscaleClient;

pub fn sample_instance() -> Value {
    json!({
        "metadata": {"id": "inst-001", "name": "test-instance"},
        "spec": {
            "flavorId": "g-4-standard",
            "imageId": "ubuntu-22.04",
            "cpu": 4,
            "memory": 8,
            "storage": 100,
        },
        "status": {
            "powerState": "running",
            "provisioningStatus": "provisioned",
        },
    })
}

pub fn sample_cluster() -> Value {
    json!({
        "metadata": {"id": "cluster-001", "name": "test-cluster"},
        "spec": {
            "workloadPools": [
                {"name": "pool-1", "replicas": 3, "flavorId": "g-4-standard"},
            ],
        },
        "status": {"provisioningStatus": "provisioned"},
    })
}

pub fn sample_user() -> Value {
    json!({
        "metadata": {"id": "user-001", "name": "testuser"},
        "spec": {"subject": "testuser", "state": "active"},
    })
}

pub fn sample_group() -> Value {
    json!({
        "metadata": {"id": "group-001", "name": "inst-001"},
        "spec": {"userIds": ["user-001"]},
    })
}

pub fn client_for(api_url: &str) -> NscaleClient {
    NscaleClient::new(api_url, "org-1", "proj-1", "token-abc", None)
}

pub fn client_with_identity(api_url: &str, identity_api_url: &str) -> NscaleClient {
    NscaleClient::new(
        api_url,
        "org-1",
        "proj-1",
        "token-abc",
        Some(identity_api_url.to_string()),
    )
}
