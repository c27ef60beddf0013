//! SCIM target authentication: static bearer token or `OAuth2` client credentials.

use crate::error::{ScimClientError, ScimClientResult};
use reqwest::RequestBuilder;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

/// Seconds shaved off `expires_in` so a token is never used right at its expiry.
const EXPIRY_MARGIN_SECS: u64 = 30;

/// Credentials for the SCIM target.
///
/// The [`Debug`] impl redacts tokens and secrets.
#[derive(Clone)]
pub enum ScimCredentials {
    /// Static bearer token.
    Bearer { token: String },

    /// `OAuth2` client credentials grant.
    OAuth2 {
        client_id: String,
        client_secret: String,
        token_endpoint: String,
        scopes: Vec<String>,
    },
}

impl std::fmt::Debug for ScimCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bearer { .. } => f
                .debug_struct("Bearer")
                .field("token", &"[REDACTED]")
                .finish(),
            Self::OAuth2 {
                client_id,
                token_endpoint,
                scopes,
                ..
            } => f
                .debug_struct("OAuth2")
                .field("client_id", client_id)
                .field("client_secret", &"[REDACTED]")
                .field("token_endpoint", token_endpoint)
                .field("scopes", scopes)
                .finish(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Option<Instant>,
}

impl CachedToken {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|exp| Instant::now() >= exp)
    }
}

/// Attaches credentials to outgoing SCIM requests.
///
/// Clones share the `OAuth2` token cache.
#[derive(Debug, Clone)]
pub struct ScimAuth {
    credentials: ScimCredentials,
    cached_token: Arc<RwLock<Option<CachedToken>>>,
    http_client: reqwest::Client,
}

impl ScimAuth {
    /// Creates an auth handler. `http_client` is only used for token requests.
    #[must_use]
    pub fn new(credentials: ScimCredentials, http_client: reqwest::Client) -> Self {
        Self {
            credentials,
            cached_token: Arc::new(RwLock::new(None)),
            http_client,
        }
    }

    /// Shorthand for static bearer auth.
    #[must_use]
    pub fn bearer(token: impl Into<String>) -> Self {
        Self::new(
            ScimCredentials::Bearer {
                token: token.into(),
            },
            reqwest::Client::new(),
        )
    }

    /// Returns the bearer token, fetching a fresh `OAuth2` token when needed.
    pub async fn get_bearer_token(&self) -> ScimClientResult<String> {
        match &self.credentials {
            ScimCredentials::Bearer { token } => Ok(token.clone()),
            ScimCredentials::OAuth2 {
                client_id,
                client_secret,
                token_endpoint,
                scopes,
            } => {
                if let Some(cached) = self.cached_token.read().await.as_ref() {
                    if !cached.is_expired() {
                        return Ok(cached.access_token.clone());
                    }
                }

                debug!(token_endpoint = %token_endpoint, "Fetching SCIM OAuth2 access token");
                let scope = scopes.join(" ");
                let mut form = vec![("grant_type", "client_credentials")];
                if !scopes.is_empty() {
                    form.push(("scope", scope.as_str()));
                }

                let response = self
                    .http_client
                    .post(token_endpoint)
                    .basic_auth(client_id, Some(client_secret))
                    .form(&form)
                    .send()
                    .await
                    .map_err(|e| {
                        ScimClientError::AuthError(format!("Token request failed: {e}"))
                    })?;

                if !response.status().is_success() {
                    let status = response.status();
                    let body = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "<no body>".to_string());
                    return Err(ScimClientError::AuthError(format!(
                        "Token endpoint returned {status}: {body}"
                    )));
                }

                let token: TokenResponse = response.json().await.map_err(|e| {
                    ScimClientError::AuthError(format!("Failed to parse token response: {e}"))
                })?;

                let expires_at = token.expires_in.map(|secs| {
                    Instant::now() + Duration::from_secs(secs.saturating_sub(EXPIRY_MARGIN_SECS))
                });

                *self.cached_token.write().await = Some(CachedToken {
                    access_token: token.access_token.clone(),
                    expires_at,
                });

                Ok(token.access_token)
            }
        }
    }

    /// Adds the `Authorization` header to a request.
    pub async fn apply(&self, builder: RequestBuilder) -> ScimClientResult<RequestBuilder> {
        let token = self.get_bearer_token().await?;
        Ok(builder.bearer_auth(token))
    }

    /// Drops the cached `OAuth2` token so the next request fetches a new one.
    pub async fn invalidate_cache(&self) {
        *self.cached_token.write().await = None;
    }
}
