//! Batched membership patching.

use nestsync_core::{Member, SyncResult, TargetGroup, TargetPlatform};
use tracing::{debug, info, warn};

use crate::diff::MembershipDiff;
use crate::matcher::IdentityMatcher;

/// What happened to one group's membership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchOutcome {
    /// Nothing to add or remove after resolution; no call was made.
    Skipped {
        /// Desired members with no target counterpart yet.
        unresolved: Vec<Member>,
    },
    /// One patch request was handed to the target.
    Applied {
        /// Target ids added.
        added: Vec<String>,
        /// Target reference ids removed.
        removed: Vec<String>,
        /// Desired members with no target counterpart yet; dropped from the add set.
        unresolved: Vec<Member>,
    },
}

impl PatchOutcome {
    /// Members that could not be resolved to a target id.
    #[must_use]
    pub fn unresolved(&self) -> &[Member] {
        match self {
            Self::Skipped { unresolved } | Self::Applied { unresolved, .. } => unresolved,
        }
    }
}

/// Converts a [`MembershipDiff`] into at most one patch call.
pub struct PatchApplier<'a> {
    target: &'a dyn TargetPlatform,
    matcher: IdentityMatcher<'a>,
}

impl<'a> PatchApplier<'a> {
    /// Creates an applier resolving add ids through `matcher`.
    pub fn new(target: &'a dyn TargetPlatform, matcher: IdentityMatcher<'a>) -> Self {
        Self { target, matcher }
    }

    /// Applies `diff` to `group`.
    ///
    /// Additions are resolved to target ids; members that do not exist on the target are
    /// logged and dropped. No call is made when nothing is left to add or remove.
    pub async fn apply(
        &self,
        group: &TargetGroup,
        diff: &MembershipDiff,
        dry_run: bool,
    ) -> SyncResult<PatchOutcome> {
        let mut added = Vec::new();
        let mut removed = Vec::new();
        let mut unresolved = Vec::new();

        let mut to_add: Vec<&Member> = diff.to_add.iter().collect();
        to_add.sort_by(|a, b| a.display_name().cmp(b.display_name()));
        for member in to_add {
            match self.matcher.resolve_member_id(member) {
                Some(id) if added.iter().any(|a| a == id) => {}
                Some(id) => {
                    info!(group = %group.display_name, member = %member, dry_run, "Adding member");
                    added.push(id.to_string());
                }
                None => {
                    warn!(
                        group = %group.display_name,
                        member = %member,
                        "Member not present on target; skipping add"
                    );
                    unresolved.push(member.clone());
                }
            }
        }

        let mut to_remove: Vec<_> = diff.to_remove.iter().collect();
        to_remove.sort_by(|a, b| a.value.cmp(&b.value));
        for entry in to_remove {
            info!(
                group = %group.display_name,
                member = %entry.value,
                display = entry.display.as_deref().unwrap_or(""),
                dry_run,
                "Removing member"
            );
            removed.push(entry.value.clone());
        }

        if added.is_empty() && removed.is_empty() {
            debug!(group = %group.display_name, "Membership in sync; no patch");
            return Ok(PatchOutcome::Skipped { unresolved });
        }

        self.target
            .patch_group_members(&group.id, &added, &removed, dry_run)
            .await?;
        Ok(PatchOutcome::Applied {
            added,
            removed,
            unresolved,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use nestsync_core::{SourceUser, TargetMemberRef, TargetSnapshot, TargetUser};
    use std::sync::Mutex;

    type Patch = (String, Vec<String>, Vec<String>, bool);

    #[derive(Default)]
    struct RecordingTarget {
        patches: Mutex<Vec<Patch>>,
    }

    #[async_trait]
    impl TargetPlatform for RecordingTarget {
        async fn list_users(&self) -> SyncResult<Vec<TargetUser>> {
            Ok(vec![])
        }

        async fn list_groups(&self) -> SyncResult<Vec<TargetGroup>> {
            Ok(vec![])
        }

        async fn create_user(&self, _: &str, _: &str, _: bool) -> SyncResult<()> {
            Ok(())
        }

        async fn create_group(&self, _: &str, _: bool) -> SyncResult<()> {
            Ok(())
        }

        async fn delete_group(&self, _: &str, _: bool) -> SyncResult<()> {
            Ok(())
        }

        async fn patch_group_members(
            &self,
            group_id: &str,
            add: &[String],
            remove: &[String],
            dry_run: bool,
        ) -> SyncResult<()> {
            self.patches.lock().unwrap().push((
                group_id.to_string(),
                add.to_vec(),
                remove.to_vec(),
                dry_run,
            ));
            Ok(())
        }
    }

    fn snapshot() -> TargetSnapshot {
        TargetSnapshot::new(
            vec![TargetUser {
                id: "u-1".into(),
                user_name: "alice@contoso.com".into(),
                display_name: Some("Alice".into()),
            }],
            vec![TargetGroup {
                id: "g-1".into(),
                display_name: "Engineering".into(),
                members: vec![],
            }],
        )
    }

    fn alice(handle: &str) -> Member {
        Member::User(SourceUser::new("Alice", handle))
    }

    #[tokio::test]
    async fn test_empty_diff_makes_no_call() {
        let snapshot = snapshot();
        let target = RecordingTarget::default();
        let applier = PatchApplier::new(&target, IdentityMatcher::new(&snapshot));

        let outcome = applier
            .apply(&snapshot.groups()[0], &MembershipDiff::default(), false)
            .await
            .unwrap();

        assert!(matches!(outcome, PatchOutcome::Skipped { .. }));
        assert!(target.patches.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unresolved_adds_are_dropped() {
        let snapshot = snapshot();
        let target = RecordingTarget::default();
        let applier = PatchApplier::new(&target, IdentityMatcher::new(&snapshot));

        let mut diff = MembershipDiff::default();
        diff.to_add.insert(alice("alice@contoso.com"));
        diff.to_add.insert(alice("ghost@contoso.com"));

        let outcome = applier
            .apply(&snapshot.groups()[0], &diff, true)
            .await
            .unwrap();

        assert_eq!(outcome.unresolved().len(), 1);
        let patches = target.patches.lock().unwrap();
        assert_eq!(
            patches.as_slice(),
            &[("g-1".to_string(), vec!["u-1".to_string()], Vec::new(), true)]
        );
    }

    #[tokio::test]
    async fn test_only_unresolved_adds_makes_no_call() {
        let snapshot = snapshot();
        let target = RecordingTarget::default();
        let applier = PatchApplier::new(&target, IdentityMatcher::new(&snapshot));

        let mut diff = MembershipDiff::default();
        diff.to_add.insert(Member::group("Platform", 1));

        let outcome = applier
            .apply(&snapshot.groups()[0], &diff, false)
            .await
            .unwrap();

        assert!(
            matches!(outcome, PatchOutcome::Skipped { ref unresolved } if unresolved.len() == 1)
        );
        assert!(target.patches.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_case_variants_add_one_id() {
        let snapshot = snapshot();
        let target = RecordingTarget::default();
        let applier = PatchApplier::new(&target, IdentityMatcher::new(&snapshot));

        let mut diff = MembershipDiff::default();
        diff.to_add.insert(alice("alice@contoso.com"));
        diff.to_add.insert(alice("ALICE@contoso.com"));
        diff.to_remove.insert(TargetMemberRef::new("u-9", Some("Former")));

        applier
            .apply(&snapshot.groups()[0], &diff, false)
            .await
            .unwrap();

        let patches = target.patches.lock().unwrap();
        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].1, vec!["u-1".to_string()]);
        assert_eq!(patches[0].2, vec!["u-9".to_string()]);
    }
}
