//! Identity matching between source and target.
//!
//! Users match on principal handle vs. target user name; groups match on display name.
//! Both comparisons are case-insensitive. A target member reference only carries an
//! opaque id, so it is first resolved against the snapshot to learn what it points at.

use nestsync_core::{
    eq_ignore_case, Member, SourceUser, TargetGroup, TargetMemberRef, TargetSnapshot, TargetUser,
};

/// Matches source identities against one target snapshot.
#[derive(Debug, Clone, Copy)]
pub struct IdentityMatcher<'a> {
    snapshot: &'a TargetSnapshot,
}

impl<'a> IdentityMatcher<'a> {
    /// Creates a matcher over `snapshot`.
    #[must_use]
    pub fn new(snapshot: &'a TargetSnapshot) -> Self {
        Self { snapshot }
    }

    /// The snapshot this matcher resolves against.
    #[must_use]
    pub fn snapshot(&self) -> &'a TargetSnapshot {
        self.snapshot
    }

    /// True if `target` is the same person as `source`.
    #[must_use]
    pub fn user_matches(source: &SourceUser, target: &TargetUser) -> bool {
        eq_ignore_case(&source.principal_handle, &target.user_name)
    }

    /// True if `target` is the counterpart of the source group named `display_name`.
    #[must_use]
    pub fn group_matches(display_name: &str, target: &TargetGroup) -> bool {
        eq_ignore_case(display_name, &target.display_name)
    }

    /// Target counterpart of a source user.
    #[must_use]
    pub fn find_user(&self, source: &SourceUser) -> Option<&'a TargetUser> {
        self.snapshot.user_by_user_name(&source.principal_handle)
    }

    /// Target counterpart of a source group.
    #[must_use]
    pub fn find_group(&self, display_name: &str) -> Option<&'a TargetGroup> {
        self.snapshot.group_by_display_name(display_name)
    }

    /// Target id to reference when adding `member` to a group, if it exists yet.
    #[must_use]
    pub fn resolve_member_id(&self, member: &Member) -> Option<&'a str> {
        match member {
            Member::User(user) => self.find_user(user).map(|u| u.id.as_str()),
            Member::Group { display_name, .. } => {
                self.find_group(display_name).map(|g| g.id.as_str())
            }
        }
    }

    /// True if the existing reference `entry` already satisfies the desired `member`.
    ///
    /// A reference that resolves to a user never satisfies a group edge and vice versa.
    /// For group edges the reference's own display text is consulted only when the id is
    /// unknown to the snapshot.
    #[must_use]
    pub fn member_matches(&self, member: &Member, entry: &TargetMemberRef) -> bool {
        match member {
            Member::User(user) => self
                .snapshot
                .user_by_id(&entry.value)
                .is_some_and(|target| Self::user_matches(user, target)),
            Member::Group { display_name, .. } => {
                if let Some(group) = self.snapshot.group_by_id(&entry.value) {
                    return Self::group_matches(display_name, group);
                }
                if self.snapshot.user_by_id(&entry.value).is_some() {
                    return false;
                }
                entry
                    .display
                    .as_deref()
                    .is_some_and(|display| eq_ignore_case(display, display_name))
            }
        }
    }
}
