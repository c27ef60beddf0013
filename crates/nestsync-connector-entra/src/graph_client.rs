//! Authenticated, retrying GET access to Microsoft Graph.

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::retry::{RetryConfig, Transient};
use crate::{EntraError, EntraResult, TokenCache};

/// One page of a Graph collection.
#[derive(Debug, Deserialize)]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
    #[serde(rename = "@odata.nextLink")]
    pub next_link: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    code: String,
    #[serde(default)]
    message: String,
}

enum AttemptError {
    Transient(Transient),
    Fatal(EntraError),
}

impl From<EntraError> for AttemptError {
    fn from(err: EntraError) -> Self {
        Self::Fatal(err)
    }
}

impl From<reqwest::Error> for AttemptError {
    fn from(err: reqwest::Error) -> Self {
        match Transient::from_transport(&err) {
            Some(reason) => Self::Transient(reason),
            None => Self::Fatal(err.into()),
        }
    }
}

fn graph_error(status: StatusCode, body: &str) -> EntraError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => EntraError::GraphApi {
            status: status.as_u16(),
            code: envelope.error.code,
            message: envelope.error.message,
        },
        Err(_) => EntraError::GraphApi {
            status: status.as_u16(),
            code: status.canonical_reason().unwrap_or("Unknown").to_string(),
            message: body.to_string(),
        },
    }
}

/// Read-only Graph client shared by every lookup of one directory.
#[derive(Debug)]
pub struct GraphClient {
    http: reqwest::Client,
    tokens: Arc<TokenCache>,
    base_url: String,
    retry: RetryConfig,
}

impl GraphClient {
    /// `base_url` includes the API version, e.g. `https://graph.microsoft.com/v1.0`.
    pub fn new(
        http: reqwest::Client,
        tokens: Arc<TokenCache>,
        base_url: impl Into<String>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            http,
            tokens,
            base_url: base_url.into(),
            retry,
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GETs `url` and decodes the JSON body.
    ///
    /// Throttling, 5xx responses and connect or timeout failures are retried within the
    /// [`RetryConfig`] budget. Any other error status fails at once; a 401 also drops the
    /// cached token.
    #[instrument(skip(self))]
    pub async fn get<T: DeserializeOwned>(&self, url: &str) -> EntraResult<T> {
        let mut retry = 0u32;
        loop {
            let reason = match self.attempt(url).await {
                Ok(value) => return Ok(value),
                Err(AttemptError::Fatal(err)) => return Err(err),
                Err(AttemptError::Transient(reason)) => reason,
            };

            if retry >= self.retry.max_retries {
                warn!(%reason, attempts = retry + 1, "Graph request failed; giving up");
                return Err(EntraError::RetriesExhausted {
                    attempts: retry + 1,
                    last_error: reason.to_string(),
                });
            }

            let delay = self.retry.delay(retry, reason.retry_after());
            retry += 1;
            warn!(
                %reason,
                retry,
                max_retries = self.retry.max_retries,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "Graph request failed; retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn attempt<T: DeserializeOwned>(&self, url: &str) -> Result<T, AttemptError> {
        let token = self.tokens.token().await?;
        let response = self.http.get(url).bearer_auth(&token).send().await?;

        let status = response.status();
        if status.is_success() {
            let body = response.bytes().await?;
            return serde_json::from_slice(&body).map_err(|e| AttemptError::Fatal(e.into()));
        }
        if let Some(reason) = Transient::from_status(status, response.headers()) {
            return Err(AttemptError::Transient(reason));
        }
        if status == StatusCode::UNAUTHORIZED {
            self.tokens.clear().await;
        }
        let body = response.text().await.unwrap_or_default();
        Err(AttemptError::Fatal(graph_error(status, &body)))
    }

    /// Collects every item of a paged collection, following `@odata.nextLink`.
    ///
    /// Fails with [`EntraError::PageLimitExceeded`] when a next link remains after
    /// `max_pages` pages.
    #[instrument(skip(self))]
    pub async fn get_all<T: DeserializeOwned>(
        &self,
        url: &str,
        max_pages: usize,
    ) -> EntraResult<Vec<T>> {
        let mut items = Vec::new();
        let mut next = Some(url.to_string());
        let mut pages = 0usize;

        while let Some(page_url) = next.take() {
            if pages == max_pages {
                warn!(max_pages, "Listing still has pages after the page limit");
                return Err(EntraError::PageLimitExceeded {
                    url: url.to_string(),
                    max_pages,
                });
            }
            pages += 1;
            let page: Page<T> = self.get(&page_url).await?;
            debug!(page = pages, items = page.value.len(), "Fetched page");
            items.extend(page.value);
            next = page.next_link;
        }
        Ok(items)
    }
}
