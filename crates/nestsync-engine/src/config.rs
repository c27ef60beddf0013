//! Engine tuning knobs.

use nestsync_core::{SyncError, SyncResult};

/// Default number of concurrent member-list fetches per flatten.
pub const DEFAULT_FLATTEN_CONCURRENCY: usize = 4;

/// Default number of roots reconciled concurrently in batch mode.
pub const DEFAULT_ROOT_CONCURRENCY: usize = 4;

/// Default maximum nesting depth walked below the root.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Configuration for a [`crate::Reconciler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileConfig {
    /// Concurrent member-list fetches while walking sibling subtrees.
    pub flatten_concurrency: usize,
    /// Concurrent roots in [`crate::Reconciler::reconcile_many`].
    pub root_concurrency: usize,
    /// Groups nested deeper than this are recorded but not walked.
    pub max_depth: usize,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            flatten_concurrency: DEFAULT_FLATTEN_CONCURRENCY,
            root_concurrency: DEFAULT_ROOT_CONCURRENCY,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl ReconcileConfig {
    /// Sets the flatten fetch concurrency.
    #[must_use]
    pub fn with_flatten_concurrency(mut self, value: usize) -> Self {
        self.flatten_concurrency = value;
        self
    }

    /// Sets the batch root concurrency.
    #[must_use]
    pub fn with_root_concurrency(mut self, value: usize) -> Self {
        self.root_concurrency = value;
        self
    }

    /// Sets the maximum walked depth.
    #[must_use]
    pub fn with_max_depth(mut self, value: usize) -> Self {
        self.max_depth = value;
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        if self.flatten_concurrency == 0 {
            return Err(SyncError::Config(
                "flatten_concurrency must be > 0".to_string(),
            ));
        }
        if self.root_concurrency == 0 {
            return Err(SyncError::Config("root_concurrency must be > 0".to_string()));
        }
        Ok(())
    }
}
