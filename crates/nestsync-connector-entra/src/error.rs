//! Error types for the Entra ID connector.

use nestsync_core::SyncError;
use thiserror::Error;

/// Result type alias using `EntraError`.
pub type EntraResult<T> = Result<T, EntraError>;

/// Errors raised while reading from Microsoft Graph.
#[derive(Debug, Error)]
pub enum EntraError {
    /// Configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The token endpoint refused or failed the client credentials grant.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Graph answered with a non-retryable error status.
    #[error("Graph API error ({status}): {code} - {message}")]
    GraphApi {
        status: u16,
        code: String,
        message: String,
    },

    /// Transport failure that is not worth retrying.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body did not match the expected shape.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Throttling, 5xx or network failures outlasted the retry budget.
    #[error("Gave up after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    /// A listing still had a next page after the page cap. Partial listings are never
    /// returned because missing members would read as removals.
    #[error("Listing {url} exceeded {max_pages} pages")]
    PageLimitExceeded { url: String, max_pages: usize },
}

impl From<EntraError> for SyncError {
    fn from(err: EntraError) -> Self {
        match err {
            EntraError::Config(msg) => SyncError::Config(msg),
            other => SyncError::Source(other.to_string()),
        }
    }
}
