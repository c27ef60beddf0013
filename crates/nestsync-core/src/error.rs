//! Error Types
//!
//! This module provides the error type shared by the engine and its collaborators.
//! Connector crates convert their own errors into [`SyncError`] at the trait boundary.
//!
//! # Example
//!
//! ```
//! use nestsync_core::{SyncError, SyncResult};
//!
//! fn lookup(name: &str) -> SyncResult<String> {
//!     if name.is_empty() {
//!         return Err(SyncError::Source("empty group name".to_string()));
//!     }
//!     Ok(name.to_string())
//! }
//!
//! assert!(lookup("").is_err());
//! ```

use thiserror::Error;

/// Result type alias using [`SyncError`].
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors surfaced across the engine/collaborator boundary.
///
/// A missing root group is deliberately *not* an error: the reconciler reports it as a
/// skipped outcome so batch runs can carry on.
#[derive(Debug, Clone, Error)]
pub enum SyncError {
    /// Missing or invalid configuration. Fatal at startup.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The source directory could not be read (after the collaborator's own retries).
    #[error("Source directory error: {0}")]
    Source(String),

    /// The target platform rejected or failed a request.
    #[error("Target platform error{}: {message}", status.map(|s| format!(" ({s})")).unwrap_or_default())]
    Target {
        /// HTTP status, when the failure came from a response.
        status: Option<u16>,
        /// Error detail.
        message: String,
    },

    /// A spawned reconciliation task panicked or was cancelled.
    #[error("Task failed: {0}")]
    Task(String),
}

impl SyncError {
    /// Builds a target error without an HTTP status.
    pub fn target(message: impl Into<String>) -> Self {
        Self::Target {
            status: None,
            message: message.into(),
        }
    }

    /// Returns true if the error originated from a source directory read.
    #[must_use]
    pub fn is_source(&self) -> bool {
        matches!(self, Self::Source(_))
    }
}
