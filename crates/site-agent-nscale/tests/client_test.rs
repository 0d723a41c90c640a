//! HTTP-level tests for the Nscale client

mod common;

use common::{client_for, client_with_identity, sample_cluster, sample_group, sample_instance, sample_user};
use serde_json::json;
use site_agent_backend::{Client, ComponentMap};
use site_agent_nscale::NscaleError;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn sends_bearer_token_and_json_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/instances"))
        .and(header("authorization", "Bearer token-abc"))
        .and(header("accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server.uri());
    let instances = client.get_compute_instances().await.unwrap();
    assert!(instances.is_empty());
}

#[tokio::test]
async fn get_compute_instance_parses_metadata_and_spec() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/instances/inst-001"))
        .respond_with(ResponseTemplate::new(200).set_body_json(sample_instance()))
        .mount(&server)
        .await;

    let client = client_for(&server.uri());
    let instance = client.get_compute_instance("inst-001").await?;

    assert_eq!(instance.metadata.id, "inst-001");
    assert_eq!(instance.spec.flavor_id.as_deref(), Some("g-4-standard"));
    assert_eq!(instance.cpu(), 4);
    assert_eq!(instance.status.power_state.as_deref(), Some("running"));
    Ok(())
}

#[tokio::test]
async fn create_compute_instance_posts_payload() -> anyhow::Result<()> {
    let payload = json!({
        "metadata": {"name": "new-inst"},
        "spec": {"flavorId": "standard"},
    });

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v2/instances"))
        .and(body_json(payload.clone()))
        .respond_with(ResponseTemplate::new(200).set_body_json(sample_instance()))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server.uri());
    let instance = client.create_compute_instance(payload).await?;
    assert_eq!(instance.metadata.id, "inst-001");
    Ok(())
}

#[tokio::test]
async fn update_compute_instance_puts_spec_patch() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/v2/instances/inst-001"))
        .and(body_json(json!({"spec": {"cpu": 8}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(sample_instance()))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server.uri());
    client
        .update_compute_instance("inst-001", json!({"spec": {"cpu": 8}}))
        .await
        .unwrap();
}

#[tokio::test]
async fn stop_and_start_hit_the_action_endpoints() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v2/instances/inst-001/stop"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v2/instances/inst-001/start"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server.uri());
    client.stop_instance("inst-001").await.unwrap();
    client.start_instance("inst-001").await.unwrap();
}

#[tokio::test]
async fn delete_with_empty_body_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/v2/instances/inst-001"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server.uri());
    client.delete_compute_instance("inst-001").await.unwrap();
}

#[tokio::test]
async fn non_2xx_status_maps_to_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/instances/inst-missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
        .mount(&server)
        .await;

    let client = client_for(&server.uri());
    let err = client.get_compute_instance("inst-missing").await.unwrap_err();

    match err {
        NscaleError::Api { status, ref body, .. } => {
            assert_eq!(status, 404);
            assert_eq!(body, "Not Found");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
    assert!(err.to_string().contains("API request failed"));
}

#[tokio::test]
async fn api_error_truncates_long_bodies() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/instances/inst-001"))
        .respond_with(ResponseTemplate::new(500).set_body_string("x".repeat(2000)))
        .mount(&server)
        .await;

    let client = client_for(&server.uri());
    let err = client.get_compute_instance("inst-001").await.unwrap_err();

    match err {
        NscaleError::Api { body, .. } => assert_eq!(body.len(), 500),
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn html_with_200_status_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/instances/inst-001"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("<html>Maintenance</html>", "text/html"),
        )
        .mount(&server)
        .await;

    let client = client_for(&server.uri());
    let err = client.get_compute_instance("inst-001").await.unwrap_err();

    match err {
        NscaleError::UnexpectedContentType { content_type, .. } => {
            assert!(content_type.contains("text/html"));
        }
        other => panic!("expected UnexpectedContentType, got {other:?}"),
    }
}

#[tokio::test]
async fn malformed_json_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/instances/inst-001"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("{not json", "application/json"))
        .mount(&server)
        .await;

    let client = client_for(&server.uri());
    let err = client.get_compute_instance("inst-001").await.unwrap_err();
    assert!(matches!(err, NscaleError::InvalidJson { .. }));
}

#[tokio::test]
async fn list_resources_merges_instances_and_clusters() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/instances"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([sample_instance()])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/clusters"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([sample_cluster()])))
        .mount(&server)
        .await;

    let client = client_for(&server.uri());
    let resources = client.list_resources().await;

    assert_eq!(resources.len(), 2);
    assert_eq!(resources[0].backend_id, "inst-001");
    assert_eq!(resources[0].organization, "proj-1");
    assert_eq!(resources[1].backend_id, "cluster-001");
}

#[tokio::test]
async fn list_resources_degrades_when_one_kind_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/instances"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([sample_instance()])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/clusters"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let client = client_for(&server.uri());
    let resources = client.list_resources().await;

    assert_eq!(resources.len(), 1);
    assert_eq!(resources[0].backend_id, "inst-001");
}

#[tokio::test]
async fn get_resource_falls_back_to_cluster_lookup() {
    let server = MockServer::start().await;
    // No instance mock mounted: the instance lookup 404s.
    Mock::given(method("GET"))
        .and(path("/api/v2/clusters/cluster-001"))
        .respond_with(ResponseTemplate::new(200).set_body_json(sample_cluster()))
        .mount(&server)
        .await;

    let client = client_for(&server.uri());
    let resource = client.get_resource("cluster-001").await.unwrap();
    assert_eq!(resource.backend_id, "cluster-001");
}

#[tokio::test]
async fn get_resource_missing_everywhere_is_none_not_an_error() {
    let server = MockServer::start().await;

    let client = client_for(&server.uri());
    assert!(client.get_resource("inst-missing").await.is_none());
}

#[tokio::test]
async fn delete_resource_falls_back_to_cluster_deletion() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/v2/instances/cluster-001"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/v2/clusters/cluster-001"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server.uri());
    assert_eq!(client.delete_resource("cluster-001").await, "cluster-001");
}

#[tokio::test]
async fn delete_resource_never_raises_when_both_paths_fail() {
    let server = MockServer::start().await;

    let client = client_for(&server.uri());
    assert_eq!(client.delete_resource("inst-missing").await, "inst-missing");
}

#[tokio::test]
async fn set_resource_limits_ignores_unknown_components() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/v2/instances/inst-001"))
        .and(body_json(json!({"spec": {"cpu": 8, "memory": 16}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(sample_instance()))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server.uri());
    let limits = ComponentMap::from([
        ("cpu".to_string(), 8),
        ("memory".to_string(), 16),
        ("gpu".to_string(), 2),
    ]);
    let confirmation = client.set_resource_limits("inst-001", &limits).await.unwrap();
    assert_eq!(confirmation, "Limits set for inst-001");
}

#[tokio::test]
async fn set_resource_limits_with_only_unknown_components_makes_no_call() {
    let server = MockServer::start().await;

    let client = client_for(&server.uri());
    let limits = ComponentMap::from([("gpu".to_string(), 1)]);
    client.set_resource_limits("inst-001", &limits).await.unwrap();

    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn get_resource_limits_reads_spec_values() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/instances/inst-001"))
        .respond_with(ResponseTemplate::new(200).set_body_json(sample_instance()))
        .mount(&server)
        .await;

    let client = client_for(&server.uri());
    let limits = client.get_resource_limits("inst-001").await;

    assert_eq!(limits.get("cpu"), Some(&4));
    assert_eq!(limits.get("memory"), Some(&8));
    assert_eq!(limits.get("storage"), Some(&100));
}

#[tokio::test]
async fn get_resource_limits_degrades_to_empty_map() {
    let server = MockServer::start().await;

    let client = client_for(&server.uri());
    assert!(client.get_resource_limits("inst-missing").await.is_empty());
}

#[tokio::test]
async fn usage_report_omits_unfetchable_resources() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/instances/inst-001"))
        .respond_with(ResponseTemplate::new(200).set_body_json(sample_instance()))
        .mount(&server)
        .await;
    // inst-gone has no mock and 404s

    let client = client_for(&server.uri());
    let report = client
        .get_usage_report(&["inst-001".to_string(), "inst-gone".to_string()])
        .await;

    assert_eq!(report.len(), 1);
    assert_eq!(report[0].resource_id, "inst-001");
    assert_eq!(report[0].components.get("cpu"), Some(&4));
}

#[tokio::test]
async fn user_limits_are_not_supported() {
    let server = MockServer::start().await;

    let client = client_for(&server.uri());
    assert!(client.get_resource_user_limits("inst-001").await.is_empty());
    let message = client
        .set_resource_user_limits("inst-001", "testuser", &ComponentMap::new())
        .await;
    assert_eq!(message, "User limits not supported for testuser");
}

#[tokio::test]
async fn identity_endpoints_fail_fast_without_identity_url() {
    let server = MockServer::start().await;

    let client = client_for(&server.uri());
    let err = client.list_users().await.unwrap_err();

    assert!(matches!(err, NscaleError::IdentityNotConfigured));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn association_queries_without_identity_are_noops() {
    let server = MockServer::start().await;

    let client = client_for(&server.uri());
    assert!(client.get_association("testuser", "inst-001").await.is_none());
    assert!(client.list_resource_users("inst-001").await.is_empty());
    let message = client.create_association("testuser", "inst-001", None).await;
    assert!(message.contains("not configured"));

    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn get_association_matches_group_membership() {
    let compute = MockServer::start().await;
    let identity = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/organizations/org-1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([sample_user()])))
        .mount(&identity)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/organizations/org-1/groups"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([sample_group()])))
        .mount(&identity)
        .await;

    let client = client_with_identity(&compute.uri(), &identity.uri());
    let association = client.get_association("testuser", "inst-001").await.unwrap();

    assert_eq!(association.user, "testuser");
    assert_eq!(association.account, "inst-001");
}

#[tokio::test]
async fn get_association_unknown_user_is_none() {
    let compute = MockServer::start().await;
    let identity = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/organizations/org-1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&identity)
        .await;

    let client = client_with_identity(&compute.uri(), &identity.uri());
    assert!(client.get_association("ghost", "inst-001").await.is_none());
}

#[tokio::test]
async fn create_association_provisions_user_and_group() {
    let compute = MockServer::start().await;
    let identity = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/organizations/org-1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&identity)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/organizations/org-1/users"))
        .and(body_json(json!({"spec": {"subject": "testuser", "state": "active"}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(sample_user()))
        .expect(1)
        .mount(&identity)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/organizations/org-1/groups"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&identity)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/organizations/org-1/groups"))
        .and(body_json(json!({
            "metadata": {"name": "inst-001"},
            "spec": {"userIds": ["user-001"]},
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(sample_group()))
        .expect(1)
        .mount(&identity)
        .await;

    let client = client_with_identity(&compute.uri(), &identity.uri());
    let result = client.create_association("testuser", "inst-001", None).await;
    assert_eq!(result, "testuser");
}

#[tokio::test]
async fn create_association_is_idempotent() {
    let compute = MockServer::start().await;
    let identity = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/organizations/org-1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([sample_user()])))
        .mount(&identity)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/organizations/org-1/groups"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([sample_group()])))
        .mount(&identity)
        .await;
    // The user is already a member: no group update may happen.
    Mock::given(method("PUT"))
        .and(path("/api/v1/organizations/org-1/groups/group-001"))
        .respond_with(ResponseTemplate::new(200).set_body_json(sample_group()))
        .expect(0)
        .mount(&identity)
        .await;

    let client = client_with_identity(&compute.uri(), &identity.uri());
    let result = client.create_association("testuser", "inst-001", None).await;
    assert_eq!(result, "testuser");
}

#[tokio::test]
async fn create_association_appends_to_existing_group() {
    let compute = MockServer::start().await;
    let identity = MockServer::start().await;
    let other_user = json!({
        "metadata": {"id": "user-002", "name": "otheruser"},
        "spec": {"subject": "otheruser", "state": "active"},
    });
    let group = json!({
        "metadata": {"id": "group-001", "name": "inst-001"},
        "spec": {"userIds": ["user-001"]},
    });
    Mock::given(method("GET"))
        .and(path("/api/v1/organizations/org-1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([sample_user(), other_user])))
        .mount(&identity)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/organizations/org-1/groups"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([group])))
        .mount(&identity)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/v1/organizations/org-1/groups/group-001"))
        .and(body_json(json!({"spec": {"userIds": ["user-001", "user-002"]}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(sample_group()))
        .expect(1)
        .mount(&identity)
        .await;

    let client = client_with_identity(&compute.uri(), &identity.uri());
    let result = client.create_association("otheruser", "inst-001", None).await;
    assert_eq!(result, "otheruser");
}

#[tokio::test]
async fn delete_association_removes_member() {
    let compute = MockServer::start().await;
    let identity = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/organizations/org-1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([sample_user()])))
        .mount(&identity)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/organizations/org-1/groups"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([sample_group()])))
        .mount(&identity)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/v1/organizations/org-1/groups/group-001"))
        .and(body_json(json!({"spec": {"userIds": []}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(sample_group()))
        .expect(1)
        .mount(&identity)
        .await;

    let client = client_with_identity(&compute.uri(), &identity.uri());
    let result = client.delete_association("testuser", "inst-001").await;
    assert_eq!(result, "testuser");
}

#[tokio::test]
async fn delete_association_of_absent_member_is_a_noop() {
    let compute = MockServer::start().await;
    let identity = MockServer::start().await;
    let group = json!({
        "metadata": {"id": "group-001", "name": "inst-001"},
        "spec": {"userIds": ["user-999"]},
    });
    Mock::given(method("GET"))
        .and(path("/api/v1/organizations/org-1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([sample_user()])))
        .mount(&identity)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/organizations/org-1/groups"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([group])))
        .mount(&identity)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/v1/organizations/org-1/groups/group-001"))
        .respond_with(ResponseTemplate::new(200).set_body_json(sample_group()))
        .expect(0)
        .mount(&identity)
        .await;

    let client = client_with_identity(&compute.uri(), &identity.uri());
    let result = client.delete_association("testuser", "inst-001").await;
    assert_eq!(result, "testuser");
}

#[tokio::test]
async fn list_resource_users_resolves_usernames() {
    let compute = MockServer::start().await;
    let identity = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/organizations/org-1/groups"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([sample_group()])))
        .mount(&identity)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/organizations/org-1/users/user-001"))
        .respond_with(ResponseTemplate::new(200).set_body_json(sample_user()))
        .mount(&identity)
        .await;

    let client = client_with_identity(&compute.uri(), &identity.uri());
    let users = client.list_resource_users("inst-001").await;
    assert_eq!(users, vec!["testuser"]);
}

#[tokio::test]
async fn group_lookup_matches_on_name_suffix() {
    let compute = MockServer::start().await;
    let identity = MockServer::start().await;
    let prefixed_group = json!({
        "metadata": {"id": "group-002", "name": "waldur_inst-001"},
        "spec": {"userIds": ["user-001"]},
    });
    Mock::given(method("GET"))
        .and(path("/api/v1/organizations/org-1/groups"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([prefixed_group])))
        .mount(&identity)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/organizations/org-1/users/user-001"))
        .respond_with(ResponseTemplate::new(200).set_body_json(sample_user()))
        .mount(&identity)
        .await;

    let client = client_with_identity(&compute.uri(), &identity.uri());
    let users = client.list_resource_users("inst-001").await;
    assert_eq!(users, vec!["testuser"]);
}

#[tokio::test]
async fn linux_homedir_is_not_applicable() {
    let server = MockServer::start().await;

    let client = client_for(&server.uri());
    assert_eq!(client.create_linux_user_homedir("testuser", "").await, "");
}
