//! Common test utilities for nestsync-scim-client integration tests.

#![allow(dead_code)]

use nestsync_scim_client::{RetryPolicy, ScimAuth, ScimClient, ScimTarget};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use wiremock::{MockServer, Request, Respond, ResponseTemplate};

pub const TOKEN: &str = "test-token-123";

/// Client with static bearer auth against the mock server.
pub fn bearer_client(server: &MockServer) -> ScimClient {
    ScimClient::with_http_client(&server.uri(), ScimAuth::bearer(TOKEN), reqwest::Client::new())
}

/// Target with instant retries.
pub fn target(server: &MockServer) -> ScimTarget {
    ScimTarget::new(bearer_client(server)).with_retry_policy(RetryPolicy::new(2, Duration::ZERO))
}

pub fn scim_user(id: &str, user_name: &str) -> Value {
    json!({
        "schemas": ["urn:ietf:params:scim:schemas:core:2.0:User"],
        "id": id,
        "userName": user_name,
        "displayName": user_name
    })
}

pub fn scim_group(id: &str, display_name: &str, members: &[(&str, &str)]) -> Value {
    let members: Vec<Value> = members
        .iter()
        .map(|(value, display)| json!({"value": value, "display": display}))
        .collect();
    json!({
        "schemas": ["urn:ietf:params:scim:schemas:core:2.0:Group"],
        "id": id,
        "displayName": display_name,
        "members": members
    })
}

/// Wraps resources in a SCIM ListResponse.
pub fn list_response(resources: Vec<Value>, total_results: i64, start_index: i64) -> Value {
    json!({
        "schemas": ["urn:ietf:params:scim:api:messages:2.0:ListResponse"],
        "totalResults": total_results,
        "startIndex": start_index,
        "itemsPerPage": resources.len(),
        "Resources": resources
    })
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
