//! Client credentials tokens for Microsoft Graph.

use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::fmt;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use crate::{EntraConfig, EntraCredentials, EntraError, EntraResult};

/// Tokens are replaced this long before Entra would reject them.
const REFRESH_MARGIN_MINUTES: i64 = 5;

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

/// Body of a failed token request.
#[derive(Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Clone)]
struct AccessToken {
    value: String,
    refresh_at: DateTime<Utc>,
}

impl AccessToken {
    fn is_fresh(&self) -> bool {
        Utc::now() < self.refresh_at
    }
}

/// Holds the Graph access token for one app registration.
///
/// Concurrent callers that find the token stale wait for a single refresh.
pub struct TokenCache {
    http: reqwest::Client,
    token_url: String,
    scope: String,
    client_id: String,
    client_secret: SecretString,
    current: RwLock<Option<AccessToken>>,
}

impl fmt::Debug for TokenCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCache")
            .field("token_url", &self.token_url)
            .field("scope", &self.scope)
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

impl TokenCache {
    /// Creates an empty cache; the first [`TokenCache::token`] call fetches a token.
    pub fn new(http: reqwest::Client, config: &EntraConfig, credentials: EntraCredentials) -> Self {
        let environment = &config.cloud_environment;
        Self {
            http,
            token_url: format!(
                "{}/{}/oauth2/v2.0/token",
                environment.login_endpoint(),
                config.tenant_id
            ),
            scope: format!("{}/.default", environment.graph_endpoint()),
            client_id: credentials.client_id,
            client_secret: credentials.client_secret,
            current: RwLock::new(None),
        }
    }

    /// Token endpoint for the configured tenant.
    #[must_use]
    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    /// Returns a bearer token, fetching a new one when none is cached or it is about to expire.
    pub async fn token(&self) -> EntraResult<String> {
        if let Some(token) = self.current.read().await.as_ref() {
            if token.is_fresh() {
                return Ok(token.value.clone());
            }
        }

        let mut current = self.current.write().await;
        if let Some(token) = current.as_ref() {
            if token.is_fresh() {
                return Ok(token.value.clone());
            }
        }
        let token = self.request_token().await?;
        let value = token.value.clone();
        *current = Some(token);
        Ok(value)
    }

    /// Drops the cached token so the next call fetches a new one.
    pub async fn clear(&self) {
        *self.current.write().await = None;
    }

    #[instrument(skip(self), fields(token_url = %self.token_url))]
    async fn request_token(&self) -> EntraResult<AccessToken> {
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose_secret().as_str()),
            ("scope", self.scope.as_str()),
        ];

        let response = self
            .http
            .post(&self.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| EntraError::Auth(format!("token endpoint unreachable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = match serde_json::from_str::<TokenErrorResponse>(&body) {
                Ok(err) => match err.error_description {
                    Some(description) => format!("{}: {description}", err.error),
                    None => err.error,
                },
                Err(_) => body,
            };
            return Err(EntraError::Auth(format!(
                "token endpoint returned {status}: {detail}"
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| EntraError::Auth(format!("unreadable token response: {e}")))?;

        let expires_at = Utc::now() + Duration::seconds(body.expires_in);
        let refresh_at = expires_at - Duration::minutes(REFRESH_MARGIN_MINUTES);
        info!(expires_at = %expires_at.to_rfc3339(), "Acquired Graph access token");
        debug!(refresh_at = %refresh_at.to_rfc3339(), "Token refresh scheduled");

        Ok(AccessToken {
            value: body.access_token,
            refresh_at,
        })
    }
}
