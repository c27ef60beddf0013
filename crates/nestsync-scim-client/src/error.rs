//! Error types for SCIM client operations.

use nestsync_core::SyncError;
use thiserror::Error;

/// Result type alias using `ScimClientError`.
pub type ScimClientResult<T> = Result<T, ScimClientError>;

/// Errors returned by the SCIM client.
#[derive(Debug, Error)]
pub enum ScimClientError {
    /// The resource does not exist on the target (404).
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// The resource already exists (409).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The target is throttling us (429).
    #[error("Rate limited (retry after {retry_after_secs:?}s)")]
    RateLimited { retry_after_secs: Option<u64> },

    /// Credentials were rejected or a token could not be obtained.
    #[error("Authentication error: {0}")]
    AuthError(String),

    /// Any other non-success status.
    #[error("SCIM error ({status}): {detail}")]
    ScimError { status: u16, detail: String },

    /// The response body could not be parsed.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Invalid client configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Connection-level failure.
    #[error("Target unreachable: {0}")]
    Unreachable(String),

    /// The request timed out.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// A retried operation kept failing.
    #[error("Maximum retries ({attempts}) exceeded: {message}")]
    MaxRetriesExceeded { attempts: u32, message: String },

    /// A listing still had resources left after the page cap.
    #[error("Listing {resource} exceeded {max_pages} pages ({collected} of {total_results} read)")]
    PageLimitExceeded {
        resource: String,
        max_pages: usize,
        collected: usize,
        total_results: i64,
    },
}

impl ScimClientError {
    /// Transport failures and throttling are worth another attempt.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Unreachable(_) | Self::Timeout(_)
        )
    }

    /// Whether the target answered with a 5xx status.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::ScimError { status, .. } if *status >= 500)
    }

    /// HTTP status behind the error, when there was a response.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::NotFound(_) => Some(404),
            Self::Conflict(_) => Some(409),
            Self::RateLimited { .. } => Some(429),
            Self::AuthError(_) => Some(401),
            Self::ScimError { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ScimClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_decode() {
            Self::ParseError(err.to_string())
        } else {
            Self::Unreachable(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ScimClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::ParseError(err.to_string())
    }
}

impl From<ScimClientError> for SyncError {
    fn from(err: ScimClientError) -> Self {
        match err {
            ScimClientError::InvalidConfig(msg) => SyncError::Config(msg),
            other => SyncError::Target {
                status: other.status(),
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(ScimClientError::RateLimited {
            retry_after_secs: None
        }
        .is_retryable());
        assert!(ScimClientError::Timeout("slow".into()).is_retryable());
        assert!(!ScimClientError::NotFound("x".into()).is_retryable());
        assert!(!ScimClientError::Conflict("x".into()).is_retryable());
        assert!(!ScimClientError::PageLimitExceeded {
            resource: "Groups".into(),
            max_pages: 3,
            collected: 3,
            total_results: 1000,
        }
        .is_retryable());
    }

    #[test]
    fn test_server_error_classification() {
        let err = ScimClientError::ScimError {
            status: 502,
            detail: "bad gateway".into(),
        };
        assert!(err.is_server_error());

        let err = ScimClientError::ScimError {
            status: 400,
            detail: "bad request".into(),
        };
        assert!(!err.is_server_error());
    }

    #[test]
    fn test_conversion_keeps_status() {
        let err: SyncError = ScimClientError::Conflict("exists".into()).into();
        match err {
            SyncError::Target { status, message } => {
                assert_eq!(status, Some(409));
                assert!(message.contains("exists"));
            }
            other => panic!("expected target error, got {other:?}"),
        }
    }

    #[test]
    fn test_page_limit_maps_to_target_without_status() {
        let err: SyncError = ScimClientError::PageLimitExceeded {
            resource: "Users".into(),
            max_pages: 2,
            collected: 200,
            total_results: 500,
        }
        .into();
        match err {
            SyncError::Target { status, message } => {
                assert_eq!(status, None);
                assert!(message.contains("exceeded 2 pages"));
            }
            other => panic!("expected target error, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_config_maps_to_config() {
        let err: SyncError = ScimClientError::InvalidConfig("bad url".into()).into();
        assert!(matches!(err, SyncError::Config(_)));
    }
}
