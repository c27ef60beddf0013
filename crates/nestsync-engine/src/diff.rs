//! Membership diff for one target group.

use std::collections::HashSet;

use nestsync_core::{Member, TargetMemberRef};

use crate::matcher::IdentityMatcher;

/// Minimal change set that turns a group's current members into its desired members.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipDiff {
    /// Desired members with no matching reference on the target.
    pub to_add: HashSet<Member>,
    /// Current references that match no desired member.
    pub to_remove: HashSet<TargetMemberRef>,
}

impl MembershipDiff {
    /// True when the group is already in sync.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

/// Computes the add/remove sets for one group.
///
/// `to_add` and `to_remove` are disjoint: an item lands in `to_add` only if no current
/// reference matches it, and a reference lands in `to_remove` only if it matches nothing
/// desired. Duplicate current references collapse.
#[must_use]
pub fn diff_members(
    desired: &HashSet<Member>,
    current: &[TargetMemberRef],
    matcher: &IdentityMatcher<'_>,
) -> MembershipDiff {
    let to_add = desired
        .iter()
        .filter(|member| !current.iter().any(|entry| matcher.member_matches(member, entry)))
        .cloned()
        .collect();

    let to_remove = current
        .iter()
        .filter(|entry| !desired.iter().any(|member| matcher.member_matches(member, entry)))
        .cloned()
        .collect();

    MembershipDiff { to_add, to_remove }
}
