//! Collaborator traits.
//!
//! The engine talks to the outside world only through these two seams. Paging, retries and
//! authentication are the implementor's concern; the engine sees complete lists.

use async_trait::async_trait;

use crate::error::SyncResult;
use crate::model::{SourceGroup, SourceMember, TargetGroup, TargetUser};

/// Read-only access to the authoritative, hierarchical directory.
#[async_trait]
pub trait SourceDirectory: Send + Sync {
    /// Looks a group up by display name.
    ///
    /// Returns `Ok(None)` when nothing matches; the name may belong to a user, a
    /// service principal, or a deleted group.
    async fn resolve_group_by_name(&self, name: &str) -> SyncResult<Option<SourceGroup>>;

    /// Lists the immediate members of a group, all pages.
    async fn list_group_members(&self, group_id: &str) -> SyncResult<Vec<SourceMember>>;

    /// Live existence check used before deleting a target group.
    async fn group_exists_by_name(&self, name: &str) -> SyncResult<bool> {
        Ok(self.resolve_group_by_name(name).await?.is_some())
    }
}

/// Flat-group identity platform that mirrors the source directory.
///
/// Mutating calls take `dry_run`; when set, implementations log the intended request and
/// perform no network mutation.
#[async_trait]
pub trait TargetPlatform: Send + Sync {
    /// Lists every user, all pages.
    async fn list_users(&self) -> SyncResult<Vec<TargetUser>>;

    /// Lists every group with its member references, all pages.
    async fn list_groups(&self) -> SyncResult<Vec<TargetGroup>>;

    /// Creates a user.
    async fn create_user(
        &self,
        display_name: &str,
        principal_handle: &str,
        dry_run: bool,
    ) -> SyncResult<()>;

    /// Creates an empty group.
    async fn create_group(&self, display_name: &str, dry_run: bool) -> SyncResult<()>;

    /// Deletes a group by platform id.
    async fn delete_group(&self, id: &str, dry_run: bool) -> SyncResult<()>;

    /// Adds and removes member references in one request.
    ///
    /// Must not issue any request when both lists are empty.
    async fn patch_group_members(
        &self,
        group_id: &str,
        add: &[String],
        remove: &[String],
        dry_run: bool,
    ) -> SyncResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SyncError;

    struct NamedOnly;

    #[async_trait]
    impl SourceDirectory for NamedOnly {
        async fn resolve_group_by_name(&self, name: &str) -> SyncResult<Option<SourceGroup>> {
            match name {
                "Present" => Ok(Some(SourceGroup::new("g-1", "Present"))),
                "Broken" => Err(SyncError::Source("timeout".into())),
                _ => Ok(None),
            }
        }

        async fn list_group_members(&self, _group_id: &str) -> SyncResult<Vec<SourceMember>> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn test_default_group_exists_by_name() {
        let dir = NamedOnly;
        assert!(dir.group_exists_by_name("Present").await.unwrap());
        assert!(!dir.group_exists_by_name("Gone").await.unwrap());
        assert!(dir.group_exists_by_name("Broken").await.is_err());
    }

    #[test]
    fn test_traits_are_object_safe() {
        fn takes_dyn(_: &dyn SourceDirectory) {}
        takes_dyn(&NamedOnly);
    }
}
