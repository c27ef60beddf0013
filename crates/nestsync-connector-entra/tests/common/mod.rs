//! Common test utilities for nestsync-connector-entra integration tests.

#![allow(dead_code)]

use nestsync_connector_entra::{
    EntraCloudEnvironment, EntraConfig, EntraCredentials, EntraDirectory, RetryConfig,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

pub const TENANT_ID: &str = "test-tenant";

/// Graph user as returned by `/members`.
pub fn user_member(id: &str, display_name: &str, upn: &str) -> Value {
    json!({
        "@odata.type": "#microsoft.graph.user",
        "id": id,
        "displayName": display_name,
        "userPrincipalName": upn
    })
}

/// Graph group as returned by `/members`.
pub fn group_member(id: &str, display_name: &str) -> Value {
    json!({
        "@odata.type": "#microsoft.graph.group",
        "id": id,
        "displayName": display_name
    })
}

/// Graph service principal as returned by `/members`.
pub fn service_principal_member(id: &str) -> Value {
    json!({
        "@odata.type": "#microsoft.graph.servicePrincipal",
        "id": id,
        "displayName": "automation"
    })
}

/// Wraps items in an OData response format.
pub fn odata_response(items: Vec<Value>, next_link: Option<&str>) -> Value {
    let mut response = json!({ "value": items });
    if let Some(link) = next_link {
        response["@odata.nextLink"] = json!(link);
    }
    response
}

/// Creates an OData error response.
pub fn odata_error(code: &str, message: &str) -> Value {
    json!({
        "error": {
            "code": code,
            "message": message
        }
    })
}

/// Mounts the OAuth token endpoint.
pub async fn mock_token_endpoint(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(format!("/{TENANT_ID}/oauth2/v2.0/token")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "mock-access-token",
            "token_type": "Bearer",
            "expires_in": 3600
        })))
        .mount(server)
        .await;
}

/// Directory pointed at the mock server with fast retries.
pub fn directory(server: &MockServer, max_pages: usize) -> EntraDirectory {
    directory_with_timeout(server, max_pages, Duration::from_secs(5))
}

/// Same as [`directory`] with an explicit per-request timeout.
pub fn directory_with_timeout(
    server: &MockServer,
    max_pages: usize,
    timeout: Duration,
) -> EntraDirectory {
    let config = EntraConfig::builder()
        .tenant_id(TENANT_ID)
        .cloud_environment(EntraCloudEnvironment::Custom {
            login_endpoint: server.uri(),
            graph_endpoint: server.uri(),
        })
        .max_pages(max_pages)
        .timeout(timeout)
        .build()
        .unwrap();
    let credentials = EntraCredentials {
        client_id: "client".to_string(),
        client_secret: "secret".to_string().into(),
    };
    EntraDirectory::with_retry_config(config, credentials, RetryConfig::immediate()).unwrap()
}

/// Replies with each template in turn, repeating the last one.
pub struct SequenceResponder {
    responses: Vec<ResponseTemplate>,
    calls: AtomicUsize,
}

impl SequenceResponder {
    pub fn new(responses: Vec<ResponseTemplate>) -> Self {
        Self {
            responses,
            calls: AtomicUsize::new(0),
        }
    }
}

impl Respond for SequenceResponder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let idx = self.calls.fetch_add(1, Ordering::SeqCst);
        let last = self.responses.len() - 1;
        self.responses[idx.min(last)].clone()
    }
}
