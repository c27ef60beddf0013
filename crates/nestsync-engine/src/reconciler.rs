//! Existence and membership reconciliation for one or many roots.
//!
//! One run:
//!
//! 1. read target users and groups
//! 2. resolve the root in the source; a missing root is a skip, not an error
//! 3. flatten the source tree
//! 4. create missing users, then missing groups (empty)
//! 5. delete target groups nested under the root that left the source tree, after a live
//!    source re-check
//! 6. re-read the target so freshly created ids resolve
//! 7. patch every group's immediate members
//!
//! Reads abort the run. Individual mutations that fail are recorded in the report and the
//! run carries on.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use nestsync_core::{
    casefold, eq_ignore_case, Member, ReconciliationMaps, SourceDirectory, SourceGroup,
    SyncError, SyncResult, TargetGroup, TargetPlatform, TargetSnapshot,
};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

use crate::applier::{PatchApplier, PatchOutcome};
use crate::config::ReconcileConfig;
use crate::diff::diff_members;
use crate::flatten::HierarchyFlattener;
use crate::matcher::IdentityMatcher;
use crate::orphans::orphan_candidates;
use crate::report::{MutationAction, ReconcileReport, RootOutcome, RootRun};

/// Drives reconciliation between a source directory and a target platform.
#[derive(Clone)]
pub struct Reconciler {
    source: Arc<dyn SourceDirectory>,
    target: Arc<dyn TargetPlatform>,
    config: ReconcileConfig,
}

impl Reconciler {
    /// Creates a reconciler.
    pub fn new(
        source: Arc<dyn SourceDirectory>,
        target: Arc<dyn TargetPlatform>,
        config: ReconcileConfig,
    ) -> Self {
        Self {
            source,
            target,
            config,
        }
    }

    /// Engine configuration.
    #[must_use]
    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Reconciles the tree below the source group named `root`.
    ///
    /// Returns `Err` only when a read fails; the target may then be partially reconciled and
    /// the next run converges it.
    #[instrument(skip(self, root), fields(root = %root))]
    pub async fn reconcile(&self, root: &str, dry_run: bool) -> SyncResult<ReconcileReport> {
        let mut report = ReconcileReport::new(root, dry_run);

        let snapshot = self.read_target().await?;
        info!(
            phase = "read",
            users = snapshot.users().len(),
            groups = snapshot.groups().len(),
            "Target state loaded"
        );

        let Some(root_group) = self.resolve_root(root).await? else {
            warn!("Root group not found in source directory; skipping");
            report.outcome = RootOutcome::SkippedRootNotFound;
            report.finish();
            return Ok(report);
        };

        let flattener = HierarchyFlattener::new(
            Arc::clone(&self.source),
            self.config.flatten_concurrency,
            self.config.max_depth,
        );
        let flattened = flattener.flatten(&root_group).await?;
        let maps = flattened.maps;
        report.distinct_groups = maps.distinct_groups.len();
        report.distinct_users = maps.distinct_users.len();
        report.cycles_skipped = flattened.cycles_skipped;
        report.depth_limited = flattened.depth_limited;
        info!(
            phase = "flatten",
            groups = report.distinct_groups,
            users = report.distinct_users,
            "Source tree flattened"
        );

        if dry_run {
            info!("Dry run: no changes will be made to the target platform");
        }

        self.create_missing(&maps, &snapshot, dry_run, &mut report)
            .await;
        info!(
            phase = "create",
            users_created = report.users_created,
            groups_created = report.groups_created,
            "Missing entities created"
        );

        self.delete_orphans(&root_group, &maps, &snapshot, dry_run, &mut report)
            .await;
        info!(
            phase = "delete_orphans",
            groups_deleted = report.groups_deleted,
            orphans_retained = report.orphans_retained,
            "Orphan groups processed"
        );

        let snapshot = self.read_target().await?;
        info!(
            phase = "reread",
            users = snapshot.users().len(),
            groups = snapshot.groups().len(),
            "Target state reloaded"
        );

        self.patch_memberships(&maps, &snapshot, dry_run, &mut report)
            .await;
        info!(
            phase = "patch",
            groups_patched = report.groups_patched,
            groups_unchanged = report.groups_unchanged,
            members_added = report.members_added,
            members_removed = report.members_removed,
            "Memberships patched"
        );

        report.finish();
        info!(
            duration_ms = report.duration_ms,
            failures = report.failures.len(),
            members_unresolved = report.members_unresolved,
            groups_not_walked = report.groups_not_walked,
            "Reconciliation complete"
        );
        Ok(report)
    }

    /// Reconciles several roots concurrently, bounded by `root_concurrency`.
    ///
    /// Each root gets its own run state. Results come back in input order; one root failing
    /// never stops the others.
    pub async fn reconcile_many(&self, roots: &[String], dry_run: bool) -> Vec<RootRun> {
        let permits = Arc::new(Semaphore::new(self.config.root_concurrency.max(1)));
        let mut tasks = JoinSet::new();

        for (idx, root) in roots.iter().enumerate() {
            let reconciler = self.clone();
            let permits = Arc::clone(&permits);
            let root = root.clone();
            tasks.spawn(async move {
                let result = match permits.acquire_owned().await {
                    Ok(_permit) => reconciler.reconcile(&root, dry_run).await,
                    Err(e) => Err(SyncError::Task(format!("root semaphore closed: {e}"))),
                };
                (idx, result)
            });
        }

        let mut slots: Vec<Option<SyncResult<ReconcileReport>>> =
            (0..roots.len()).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((idx, result)) => {
                    if let Err(e) = &result {
                        error!(root = %roots[idx], error = %e, "Root reconciliation failed");
                    }
                    slots[idx] = Some(result);
                }
                Err(e) => {
                    error!(error = %e, "Reconciliation task failed");
                }
            }
        }

        roots
            .iter()
            .zip(slots)
            .map(|(root, slot)| RootRun {
                root: root.clone(),
                result: slot.unwrap_or_else(|| {
                    Err(SyncError::Task(format!(
                        "reconciliation of '{root}' did not complete"
                    )))
                }),
            })
            .collect()
    }

    async fn read_target(&self) -> SyncResult<TargetSnapshot> {
        let (users, groups) = tokio::try_join!(self.target.list_users(), self.target.list_groups())?;
        Ok(TargetSnapshot::new(users, groups))
    }

    async fn resolve_root(&self, root: &str) -> SyncResult<Option<SourceGroup>> {
        let resolved = self.source.resolve_group_by_name(root).await?;
        Ok(resolved.filter(|group| {
            let matches = eq_ignore_case(&group.display_name, root);
            if !matches {
                debug!(resolved = %group.display_name, "Resolved group name differs from root");
            }
            matches
        }))
    }

    async fn create_missing(
        &self,
        maps: &ReconciliationMaps,
        snapshot: &TargetSnapshot,
        dry_run: bool,
        report: &mut ReconcileReport,
    ) {
        let matcher = IdentityMatcher::new(snapshot);

        let mut users: Vec<_> = maps.distinct_users.iter().collect();
        users.sort_by(|a, b| a.principal_handle.cmp(&b.principal_handle));
        let mut seen_users = HashSet::new();
        for user in users {
            if matcher.find_user(user).is_some()
                || !seen_users.insert(casefold(&user.principal_handle))
            {
                continue;
            }
            info!(user = %user.principal_handle, dry_run, "Creating user");
            match self
                .target
                .create_user(&user.display_name, &user.principal_handle, dry_run)
                .await
            {
                Ok(()) => report.users_created += 1,
                Err(e) => {
                    warn!(user = %user.principal_handle, error = %e, "User creation failed");
                    report.record_failure(&user.principal_handle, MutationAction::CreateUser, &e);
                }
            }
        }

        let mut groups: Vec<_> = maps.distinct_groups.iter().collect();
        groups.sort();
        let mut seen_groups = HashSet::new();
        for name in groups {
            if matcher.find_group(name).is_some() || !seen_groups.insert(casefold(name)) {
                continue;
            }
            info!(group = %name, dry_run, "Creating group");
            match self.target.create_group(name, dry_run).await {
                Ok(()) => report.groups_created += 1,
                Err(e) => {
                    warn!(group = %name, error = %e, "Group creation failed");
                    report.record_failure(name.as_str(), MutationAction::CreateGroup, &e);
                }
            }
        }
    }

    async fn delete_orphans(
        &self,
        root: &SourceGroup,
        maps: &ReconciliationMaps,
        snapshot: &TargetSnapshot,
        dry_run: bool,
        report: &mut ReconcileReport,
    ) {
        let matcher = IdentityMatcher::new(snapshot);
        let Some(target_root) = matcher.find_group(&root.display_name) else {
            debug!("Root has no target counterpart yet; no orphans to consider");
            return;
        };

        for candidate in orphan_candidates(target_root, snapshot, maps) {
            self.delete_orphan(candidate, dry_run, report).await;
        }
    }

    async fn delete_orphan(&self, group: &TargetGroup, dry_run: bool, report: &mut ReconcileReport) {
        match self.source.group_exists_by_name(&group.display_name).await {
            Ok(true) => {
                info!(
                    group = %group.display_name,
                    "Group missing from flattened tree but present in source; keeping"
                );
                report.orphans_retained += 1;
            }
            Ok(false) => {
                info!(group = %group.display_name, id = %group.id, dry_run, "Deleting orphan group");
                match self.target.delete_group(&group.id, dry_run).await {
                    Ok(()) => report.groups_deleted += 1,
                    Err(e) => {
                        warn!(group = %group.display_name, error = %e, "Group deletion failed");
                        report.record_failure(
                            group.display_name.as_str(),
                            MutationAction::DeleteGroup,
                            &e,
                        );
                    }
                }
            }
            Err(e) => {
                warn!(
                    group = %group.display_name,
                    error = %e,
                    "Source re-check failed; keeping group"
                );
                report.orphans_retained += 1;
                report.record_failure(group.display_name.as_str(), MutationAction::VerifyOrphan, &e);
            }
        }
    }

    async fn patch_memberships(
        &self,
        maps: &ReconciliationMaps,
        snapshot: &TargetSnapshot,
        dry_run: bool,
        report: &mut ReconcileReport,
    ) {
        let matcher = IdentityMatcher::new(snapshot);
        let applier = PatchApplier::new(self.target.as_ref(), matcher);

        // Case variants of one name map to the same target group; merge their members.
        let mut desired: BTreeMap<String, (&str, HashSet<Member>)> = BTreeMap::new();
        for name in &maps.distinct_groups {
            let entry = desired
                .entry(casefold(name))
                .or_insert_with(|| (name.as_str(), HashSet::new()));
            entry.1.extend(maps.members_of(name));
        }

        for (name, members) in desired.into_values() {
            if maps.is_unwalked(name) {
                info!(
                    group = %name,
                    "Group beyond the nesting depth limit; leaving its members unchanged"
                );
                report.groups_not_walked += 1;
                continue;
            }

            let Some(group) = matcher.find_group(name) else {
                info!(group = %name, dry_run, "Group has no target counterpart; skipping patch");
                report.groups_missing_on_target += 1;
                continue;
            };

            let diff = diff_members(&members, &group.members, &matcher);
            match applier.apply(group, &diff, dry_run).await {
                Ok(outcome) => {
                    report.members_unresolved += outcome.unresolved().len();
                    match outcome {
                        PatchOutcome::Skipped { .. } => report.groups_unchanged += 1,
                        PatchOutcome::Applied { added, removed, .. } => {
                            report.groups_patched += 1;
                            report.members_added += added.len();
                            report.members_removed += removed.len();
                        }
                    }
                }
                Err(e) => {
                    warn!(group = %name, error = %e, "Membership patch failed");
                    report.record_failure(name, MutationAction::PatchMembers, &e);
                }
            }
        }
    }
}
