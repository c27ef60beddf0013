//! Source and target identity model.
//!
//! The source side is hierarchical (groups contain users and groups); the target side is
//! flat (a group holds a list of opaque member references). Everything here is a plain
//! value built fresh for one reconciliation run.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Folds a name for case-insensitive comparison.
#[must_use]
pub fn casefold(value: &str) -> String {
    value.to_lowercase()
}

/// Case-insensitive equality used for every name/handle comparison.
#[must_use]
pub fn eq_ignore_case(a: &str, b: &str) -> bool {
    a == b || casefold(a) == casefold(b)
}

// ── Source side ───────────────────────────────────────────────────────

/// A user found in the source directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceUser {
    /// Human-readable name.
    pub display_name: String,
    /// Principal handle (UPN). Identity of the user, compared case-insensitively.
    pub principal_handle: String,
}

impl SourceUser {
    /// Creates a source user.
    pub fn new(display_name: impl Into<String>, principal_handle: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            principal_handle: principal_handle.into(),
        }
    }
}

/// A group found in the source directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceGroup {
    /// Stable directory object id.
    pub id: String,
    /// Display name; the only attribute the target platform can be matched on.
    pub display_name: String,
}

impl SourceGroup {
    /// Creates a source group.
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }
}

/// Kind discriminant of an immediate group member returned by the source directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberKind {
    /// A user account.
    User,
    /// A nested group.
    Group,
}

/// One immediate member as listed by the source directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMember {
    /// Member kind.
    pub kind: MemberKind,
    /// Directory object id.
    pub id: String,
    /// Display name.
    pub display_name: String,
    /// Principal handle, present for users.
    pub principal_handle: Option<String>,
}

impl SourceMember {
    /// Creates a user member.
    pub fn user(
        id: impl Into<String>,
        display_name: impl Into<String>,
        principal_handle: impl Into<String>,
    ) -> Self {
        Self {
            kind: MemberKind::User,
            id: id.into(),
            display_name: display_name.into(),
            principal_handle: Some(principal_handle.into()),
        }
    }

    /// Creates a group member.
    pub fn group(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            kind: MemberKind::Group,
            id: id.into(),
            display_name: display_name.into(),
            principal_handle: None,
        }
    }
}

/// Desired immediate member of a group: the target of one membership edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Member {
    /// A user member.
    User(SourceUser),
    /// A nested group member. `depth` is the nesting depth of the child (root = 0).
    Group {
        /// Display name of the nested group.
        display_name: String,
        /// Depth at which the nested group was found.
        depth: usize,
    },
}

impl Member {
    /// Creates a group member edge.
    pub fn group(display_name: impl Into<String>, depth: usize) -> Self {
        Self::Group {
            display_name: display_name.into(),
            depth,
        }
    }

    /// Display name of the member regardless of kind.
    #[must_use]
    pub fn display_name(&self) -> &str {
        match self {
            Self::User(user) => &user.display_name,
            Self::Group { display_name, .. } => display_name,
        }
    }

    /// Kind discriminant.
    #[must_use]
    pub fn kind(&self) -> MemberKind {
        match self {
            Self::User(_) => MemberKind::User,
            Self::Group { .. } => MemberKind::Group,
        }
    }
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(user) => write!(f, "user '{}' <{}>", user.display_name, user.principal_handle),
            Self::Group { display_name, .. } => write!(f, "group '{display_name}'"),
        }
    }
}

/// Flattened view of one source tree, built once per run.
#[derive(Debug, Clone, Default)]
pub struct ReconciliationMaps {
    /// Display names of every group reachable from the root, root included.
    pub distinct_groups: HashSet<String>,
    /// Every user reachable from the root.
    pub distinct_users: HashSet<SourceUser>,
    /// Group display name → immediate members.
    pub group_members: HashMap<String, HashSet<Member>>,
    /// Groups recorded as members but never walked because of the depth limit. Their
    /// immediate members are unknown, not empty.
    pub unwalked_groups: HashSet<String>,
}

impl ReconciliationMaps {
    /// Creates maps seeded with the root group.
    pub fn new(root_display_name: impl Into<String>) -> Self {
        let mut maps = Self::default();
        maps.distinct_groups.insert(root_display_name.into());
        maps
    }

    /// Records an immediate member under `group`.
    pub fn record_member(&mut self, group: &str, member: Member) {
        self.group_members
            .entry(group.to_string())
            .or_default()
            .insert(member);
    }

    /// Immediate members of `group`; empty if it has none.
    #[must_use]
    pub fn members_of(&self, group: &str) -> HashSet<Member> {
        self.group_members.get(group).cloned().unwrap_or_default()
    }

    /// True if `group` was not walked, so its membership must be left alone.
    #[must_use]
    pub fn is_unwalked(&self, group: &str) -> bool {
        self.unwalked_groups
            .iter()
            .any(|g| eq_ignore_case(g, group))
    }

    /// Case-insensitive membership test on `distinct_groups`.
    #[must_use]
    pub fn contains_group(&self, display_name: &str) -> bool {
        self.distinct_groups
            .iter()
            .any(|g| eq_ignore_case(g, display_name))
    }
}

// ── Target side ───────────────────────────────────────────────────────

/// A user record on the target platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetUser {
    /// Platform-assigned id.
    pub id: String,
    /// Login name; compared against the source principal handle.
    pub user_name: String,
    /// Display name, if the platform returned one.
    pub display_name: Option<String>,
}

/// One entry of a target group's member list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetMemberRef {
    /// Opaque reference id (user or group id).
    pub value: String,
    /// Display text, when present in the payload.
    pub display: Option<String>,
}

impl TargetMemberRef {
    /// Creates a member reference.
    pub fn new(value: impl Into<String>, display: Option<&str>) -> Self {
        Self {
            value: value.into(),
            display: display.map(String::from),
        }
    }
}

/// A group on the target platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetGroup {
    /// Platform-assigned id.
    pub id: String,
    /// Display name.
    pub display_name: String,
    /// Current immediate members.
    pub members: Vec<TargetMemberRef>,
}

/// Users and groups read from the target in one pass, with lookup indexes.
#[derive(Debug, Clone, Default)]
pub struct TargetSnapshot {
    users: Vec<TargetUser>,
    groups: Vec<TargetGroup>,
    users_by_id: HashMap<String, usize>,
    groups_by_id: HashMap<String, usize>,
    users_by_name: HashMap<String, usize>,
    groups_by_name: HashMap<String, usize>,
}

impl TargetSnapshot {
    /// Builds the snapshot and its indexes. On duplicate names the first record wins.
    pub fn new(users: Vec<TargetUser>, groups: Vec<TargetGroup>) -> Self {
        let mut users_by_id = HashMap::with_capacity(users.len());
        let mut users_by_name = HashMap::with_capacity(users.len());
        for (idx, user) in users.iter().enumerate() {
            users_by_id.entry(user.id.clone()).or_insert(idx);
            users_by_name.entry(casefold(&user.user_name)).or_insert(idx);
        }

        let mut groups_by_id = HashMap::with_capacity(groups.len());
        let mut groups_by_name = HashMap::with_capacity(groups.len());
        for (idx, group) in groups.iter().enumerate() {
            groups_by_id.entry(group.id.clone()).or_insert(idx);
            groups_by_name
                .entry(casefold(&group.display_name))
                .or_insert(idx);
        }

        Self {
            users,
            groups,
            users_by_id,
            groups_by_id,
            users_by_name,
            groups_by_name,
        }
    }

    /// All target users.
    #[must_use]
    pub fn users(&self) -> &[TargetUser] {
        &self.users
    }

    /// All target groups.
    #[must_use]
    pub fn groups(&self) -> &[TargetGroup] {
        &self.groups
    }

    /// User by platform id.
    #[must_use]
    pub fn user_by_id(&self, id: &str) -> Option<&TargetUser> {
        self.users_by_id.get(id).map(|&idx| &self.users[idx])
    }

    /// Group by platform id.
    #[must_use]
    pub fn group_by_id(&self, id: &str) -> Option<&TargetGroup> {
        self.groups_by_id.get(id).map(|&idx| &self.groups[idx])
    }

    /// User by user name, case-insensitively.
    #[must_use]
    pub fn user_by_user_name(&self, user_name: &str) -> Option<&TargetUser> {
        self.users_by_name
            .get(&casefold(user_name))
            .map(|&idx| &self.users[idx])
    }

    /// Group by display name, case-insensitively.
    #[must_use]
    pub fn group_by_display_name(&self, display_name: &str) -> Option<&TargetGroup> {
        self.groups_by_name
            .get(&casefold(display_name))
            .map(|&idx| &self.groups[idx])
    }
}
