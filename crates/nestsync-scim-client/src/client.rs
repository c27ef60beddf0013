//! SCIM 2.0 HTTP client (reqwest-based).
//!
//! Thin wrapper over the RFC 7644 endpoints nestsync needs. Retries, paging and dry-run
//! handling live in [`crate::target`].

use crate::auth::ScimAuth;
use crate::error::{ScimClientError, ScimClientResult};
use crate::models::{
    ScimGroup, ScimGroupListResponse, ScimPatchRequest, ScimUser, ScimUserListResponse,
};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tracing::{debug, instrument, warn};

const SCIM_CONTENT_TYPE: &str = "application/scim+json";

/// SCIM 2.0 HTTP client.
#[derive(Debug, Clone)]
pub struct ScimClient {
    /// Base URL without trailing slash, e.g. `https://example.com/scim/v2`.
    base_url: String,
    auth: ScimAuth,
    http_client: Client,
}

impl ScimClient {
    /// Creates a client with its own HTTP connection pool.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the HTTP client cannot be built.
    pub fn new(base_url: &str, auth: ScimAuth, timeout: Duration) -> ScimClientResult<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("nestsync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                ScimClientError::InvalidConfig(format!("Failed to build HTTP client: {e}"))
            })?;
        Ok(Self::with_http_client(base_url, auth, http_client))
    }

    /// Creates a client around an existing `reqwest::Client`.
    #[must_use]
    pub fn with_http_client(base_url: &str, auth: ScimAuth, http_client: Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
            http_client,
        }
    }

    /// Returns the base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // ── Users ─────────────────────────────────────────────────────────

    /// Lists one page of users (GET /Users).
    #[instrument(skip(self))]
    pub async fn list_users(
        &self,
        start_index: i64,
        count: i64,
    ) -> ScimClientResult<ScimUserListResponse> {
        let url = format!("{}/Users", self.base_url);
        self.get_page(&url, start_index, count).await
    }

    /// Creates a user (POST /Users).
    #[instrument(skip(self, user), fields(user_name = %user.user_name))]
    pub async fn create_user(&self, user: &ScimUser) -> ScimClientResult<ScimUser> {
        let url = format!("{}/Users", self.base_url);
        let builder = self.http_client.post(&url);
        self.send_json(builder, user).await
    }

    // ── Groups ────────────────────────────────────────────────────────

    /// Lists one page of groups (GET /Groups).
    #[instrument(skip(self))]
    pub async fn list_groups(
        &self,
        start_index: i64,
        count: i64,
    ) -> ScimClientResult<ScimGroupListResponse> {
        let url = format!("{}/Groups", self.base_url);
        self.get_page(&url, start_index, count).await
    }

    /// Creates a group (POST /Groups).
    #[instrument(skip(self, group), fields(display_name = %group.display_name))]
    pub async fn create_group(&self, group: &ScimGroup) -> ScimClientResult<ScimGroup> {
        let url = format!("{}/Groups", self.base_url);
        let builder = self.http_client.post(&url);
        self.send_json(builder, group).await
    }

    /// Deletes a group (DELETE /Groups/:id).
    #[instrument(skip(self))]
    pub async fn delete_group(&self, id: &str) -> ScimClientResult<()> {
        let url = format!("{}/Groups/{}", self.base_url, id);
        debug!("SCIM DELETE {}", url);
        let builder = self.auth.apply(self.http_client.delete(&url)).await?;
        let response = builder.send().await?;
        self.expect_empty(response).await
    }

    /// Applies a PatchOp request to a group (PATCH /Groups/:id).
    ///
    /// Accepts both `200` with a body and `204 No Content`.
    #[instrument(skip(self, patch), fields(operations = patch.operations.len()))]
    pub async fn patch_group(&self, id: &str, patch: &ScimPatchRequest) -> ScimClientResult<()> {
        let url = format!("{}/Groups/{}", self.base_url, id);
        debug!("SCIM PATCH {}", url);
        let builder = self.auth.apply(self.http_client.patch(&url)).await?;
        let response = builder
            .header(reqwest::header::CONTENT_TYPE, SCIM_CONTENT_TYPE)
            .json(patch)
            .send()
            .await?;
        self.expect_empty(response).await
    }

    // ── Internal HTTP ─────────────────────────────────────────────────

    async fn get_page<T: DeserializeOwned>(
        &self,
        url: &str,
        start_index: i64,
        count: i64,
    ) -> ScimClientResult<T> {
        debug!(start_index, count, "SCIM GET {}", url);
        let builder = self
            .http_client
            .get(url)
            .query(&[("startIndex", start_index), ("count", count)]);
        let builder = self.auth.apply(builder).await?;
        let response = builder.send().await?;
        self.handle_response(response).await
    }

    async fn send_json<T: DeserializeOwned, B: Serialize>(
        &self,
        builder: RequestBuilder,
        body: &B,
    ) -> ScimClientResult<T> {
        let builder = self.auth.apply(builder).await?;
        let response = builder
            .header(reqwest::header::CONTENT_TYPE, SCIM_CONTENT_TYPE)
            .json(body)
            .send()
            .await?;
        self.handle_response(response).await
    }

    // ── Response handling ─────────────────────────────────────────────

    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> ScimClientResult<T> {
        if !response.status().is_success() {
            return self.handle_error_response(response).await;
        }
        let body = response.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| ScimClientError::ParseError(format!("Failed to parse response: {e}")))
    }

    async fn expect_empty(&self, response: reqwest::Response) -> ScimClientResult<()> {
        if response.status().is_success() {
            Ok(())
        } else {
            self.handle_error_response(response).await
        }
    }

    async fn handle_error_response<T>(&self, response: reqwest::Response) -> ScimClientResult<T> {
        let status = response.status();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<no body>".to_string());

        Err(match status {
            StatusCode::NOT_FOUND => ScimClientError::NotFound(body),
            StatusCode::CONFLICT => ScimClientError::Conflict(body),
            StatusCode::TOO_MANY_REQUESTS => {
                warn!(retry_after_secs = ?retry_after, "SCIM target rate limited");
                ScimClientError::RateLimited {
                    retry_after_secs: retry_after,
                }
            }
            StatusCode::UNAUTHORIZED => {
                self.auth.invalidate_cache().await;
                ScimClientError::AuthError(format!("Authentication failed (401): {body}"))
            }
            _ => ScimClientError::ScimError {
                status: status.as_u16(),
                detail: if body.is_empty() {
                    format!("HTTP {status}")
                } else {
                    body
                },
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = ScimClient::with_http_client(
            "https://scim.example.com/v2/",
            ScimAuth::bearer("t"),
            Client::new(),
        );
        assert_eq!(client.base_url(), "https://scim.example.com/v2");
    }
}
