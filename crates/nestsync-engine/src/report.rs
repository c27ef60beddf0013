//! Reconciliation reports.

use chrono::{DateTime, Utc};
use nestsync_core::SyncError;
use serde::Serialize;

/// How a root run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RootOutcome {
    /// All phases ran. Individual mutations may still have failed; see `failures`.
    Completed,
    /// The root group does not exist in the source directory. Nothing was changed.
    SkippedRootNotFound,
}

/// Mutation kind recorded on failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationAction {
    /// Creating a missing user.
    CreateUser,
    /// Creating a missing group.
    CreateGroup,
    /// Re-checking an orphan candidate in the source.
    VerifyOrphan,
    /// Deleting an orphan group.
    DeleteGroup,
    /// Patching a group's members.
    PatchMembers,
}

/// A single failed mutation. The run continues past these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MutationFailure {
    /// Group display name or user principal handle.
    pub entity: String,
    /// What was being attempted.
    pub action: MutationAction,
    /// Error text.
    pub message: String,
}

/// Summary of one root reconciliation.
///
/// In dry-run mode the mutation counters describe what would have been done.
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileReport {
    /// Requested root group name.
    pub root: String,
    /// Whether mutations were only logged.
    pub dry_run: bool,
    /// How the run ended.
    pub outcome: RootOutcome,
    /// Run start time.
    pub started_at: DateTime<Utc>,
    /// Wall-clock duration.
    pub duration_ms: u64,
    /// Groups in the flattened source tree, root included.
    pub distinct_groups: usize,
    /// Users in the flattened source tree.
    pub distinct_users: usize,
    /// Nesting edges not followed because they closed a cycle.
    pub cycles_skipped: usize,
    /// Nesting edges not followed because of the depth limit.
    pub depth_limited: usize,
    /// Groups never walked because of the depth limit; their members were left unchanged.
    pub groups_not_walked: usize,
    /// Target users created.
    pub users_created: usize,
    /// Target groups created.
    pub groups_created: usize,
    /// Orphan groups deleted.
    pub groups_deleted: usize,
    /// Orphan candidates kept after the source re-check.
    pub orphans_retained: usize,
    /// Groups that received a membership patch.
    pub groups_patched: usize,
    /// Groups already in sync.
    pub groups_unchanged: usize,
    /// Source groups with no target counterpart at patch time.
    pub groups_missing_on_target: usize,
    /// Member references added.
    pub members_added: usize,
    /// Member references removed.
    pub members_removed: usize,
    /// Desired members that could not be resolved to a target id.
    pub members_unresolved: usize,
    /// Mutations that failed.
    pub failures: Vec<MutationFailure>,
}

impl ReconcileReport {
    pub(crate) fn new(root: &str, dry_run: bool) -> Self {
        Self {
            root: root.to_string(),
            dry_run,
            outcome: RootOutcome::Completed,
            started_at: Utc::now(),
            duration_ms: 0,
            distinct_groups: 0,
            distinct_users: 0,
            cycles_skipped: 0,
            depth_limited: 0,
            groups_not_walked: 0,
            users_created: 0,
            groups_created: 0,
            groups_deleted: 0,
            orphans_retained: 0,
            groups_patched: 0,
            groups_unchanged: 0,
            groups_missing_on_target: 0,
            members_added: 0,
            members_removed: 0,
            members_unresolved: 0,
            failures: Vec::new(),
        }
    }

    pub(crate) fn record_failure(
        &mut self,
        entity: impl Into<String>,
        action: MutationAction,
        error: &SyncError,
    ) {
        self.failures.push(MutationFailure {
            entity: entity.into(),
            action,
            message: error.to_string(),
        });
    }

    pub(crate) fn finish(&mut self) {
        let elapsed = Utc::now() - self.started_at;
        self.duration_ms = u64::try_from(elapsed.num_milliseconds()).unwrap_or(0);
    }

    /// True if the run completed without any failed mutation.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// True if the root was skipped because it does not exist in the source.
    #[must_use]
    pub fn is_skipped(&self) -> bool {
        self.outcome == RootOutcome::SkippedRootNotFound
    }
}

/// Result of one root inside a batch.
#[derive(Debug, Clone)]
pub struct RootRun {
    /// Root group name as listed.
    pub root: String,
    /// Report, or the error that aborted the root.
    pub result: Result<ReconcileReport, SyncError>,
}

impl RootRun {
    /// True if the root aborted or finished with failed mutations.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        match &self.result {
            Ok(report) => !report.is_clean(),
            Err(_) => true,
        }
    }
}
