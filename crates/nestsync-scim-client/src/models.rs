//! SCIM 2.0 wire models (RFC 7643 / RFC 7644).
//!
//! Only the attributes nestsync reads or writes are modelled; unknown attributes in
//! responses are ignored.

use nestsync_core::{TargetGroup, TargetMemberRef, TargetUser};
use serde::{Deserialize, Serialize};

/// SCIM User resource (RFC 7643 Section 4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimUser {
    /// SCIM schemas.
    #[serde(default)]
    pub schemas: Vec<String>,

    /// Target-assigned id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Unique login name.
    pub user_name: String,

    /// Display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// Whether the account is active.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}

impl ScimUser {
    /// SCIM Core User schema URI.
    pub const SCHEMA: &'static str = "urn:ietf:params:scim:schemas:core:2.0:User";

    /// Builds an active user for creation.
    pub fn new(user_name: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            schemas: vec![Self::SCHEMA.to_string()],
            id: None,
            user_name: user_name.into(),
            display_name: Some(display_name.into()),
            active: Some(true),
        }
    }

    /// Converts a listed user; users without an id are dropped.
    #[must_use]
    pub fn into_target(self) -> Option<TargetUser> {
        Some(TargetUser {
            id: self.id?,
            user_name: self.user_name,
            display_name: self.display_name,
        })
    }
}

/// SCIM Group member reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimGroupMember {
    /// Member id (user or nested group).
    pub value: String,

    /// Member display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,

    /// Member type, "User" or "Group".
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub member_type: Option<String>,

    /// Reference URI.
    #[serde(rename = "$ref", skip_serializing_if = "Option::is_none")]
    pub ref_uri: Option<String>,
}

impl ScimGroupMember {
    /// A bare reference by id, as used in PATCH values.
    pub fn reference(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            display: None,
            member_type: None,
            ref_uri: None,
        }
    }
}

/// SCIM Group resource (RFC 7643 Section 4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimGroup {
    /// SCIM schemas.
    #[serde(default)]
    pub schemas: Vec<String>,

    /// Target-assigned id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Group display name.
    pub display_name: String,

    /// Group members.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<ScimGroupMember>,
}

impl ScimGroup {
    /// SCIM Core Group schema URI.
    pub const SCHEMA: &'static str = "urn:ietf:params:scim:schemas:core:2.0:Group";

    /// Builds an empty group for creation.
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            schemas: vec![Self::SCHEMA.to_string()],
            id: None,
            display_name: display_name.into(),
            members: vec![],
        }
    }

    /// Converts a listed group; groups without an id are dropped.
    #[must_use]
    pub fn into_target(self) -> Option<TargetGroup> {
        let members = self
            .members
            .into_iter()
            .map(|m| TargetMemberRef::new(m.value, m.display.as_deref()))
            .collect();
        Some(TargetGroup {
            id: self.id?,
            display_name: self.display_name,
            members,
        })
    }
}

/// SCIM List Response (RFC 7644 Section 3.4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimListResponse<T> {
    /// SCIM schemas.
    #[serde(default)]
    pub schemas: Vec<String>,

    /// Total number of results matching the query.
    #[serde(default)]
    pub total_results: i64,

    /// 1-based index of the first result in this page.
    #[serde(default)]
    pub start_index: Option<i64>,

    /// Number of items in this page.
    #[serde(default)]
    pub items_per_page: Option<i64>,

    /// The resources in this page. Some targets omit the key on empty pages.
    #[serde(rename = "Resources", default = "Vec::new")]
    pub resources: Vec<T>,
}

impl<T> ScimListResponse<T> {
    /// SCIM List Response schema URI.
    pub const SCHEMA: &'static str = "urn:ietf:params:scim:api:messages:2.0:ListResponse";
}

/// Type alias for user list response.
pub type ScimUserListResponse = ScimListResponse<ScimUser>;

/// Type alias for group list response.
pub type ScimGroupListResponse = ScimListResponse<ScimGroup>;

/// SCIM PATCH operation (RFC 7644 Section 3.5.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimPatchOp {
    /// Operation type: add, remove, or replace.
    pub op: String,

    /// Attribute path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Operation value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
}

impl ScimPatchOp {
    /// An `op` against `members` carrying the given ids.
    fn members(op: &str, ids: &[String]) -> Result<Self, serde_json::Error> {
        let refs: Vec<ScimGroupMember> = ids.iter().map(ScimGroupMember::reference).collect();
        Ok(Self {
            op: op.to_string(),
            path: Some("members".to_string()),
            value: Some(serde_json::to_value(refs)?),
        })
    }
}

/// SCIM PATCH request (RFC 7644 Section 3.5.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScimPatchRequest {
    /// SCIM schemas.
    pub schemas: Vec<String>,

    /// Operations to perform.
    #[serde(rename = "Operations")]
    pub operations: Vec<ScimPatchOp>,
}

impl ScimPatchRequest {
    /// SCIM Patch Operation schema URI.
    pub const SCHEMA: &'static str = "urn:ietf:params:scim:api:messages:2.0:PatchOp";

    /// Builds a membership patch: an `add` op when `add` is non-empty, then a `remove` op
    /// when `remove` is non-empty. Returns `None` when there is nothing to do.
    pub fn members(add: &[String], remove: &[String]) -> Result<Option<Self>, serde_json::Error> {
        let mut operations = Vec::new();
        if !add.is_empty() {
            operations.push(ScimPatchOp::members("add", add)?);
        }
        if !remove.is_empty() {
            operations.push(ScimPatchOp::members("remove", remove)?);
        }
        if operations.is_empty() {
            return Ok(None);
        }
        Ok(Some(Self {
            schemas: vec![Self::SCHEMA.to_string()],
            operations,
        }))
    }
}
