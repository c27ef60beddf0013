//! SCIM service provider as a nestsync target platform.

use async_trait::async_trait;
use nestsync_core::{SyncResult, TargetGroup, TargetPlatform, TargetUser};
use serde::Serialize;
use std::future::Future;
use tracing::{debug, error, info, instrument, warn};

use crate::client::ScimClient;
use crate::error::{ScimClientError, ScimClientResult};
use crate::models::{ScimGroup, ScimListResponse, ScimPatchRequest, ScimUser};
use crate::retry::RetryPolicy;

/// Resources requested per list call.
pub const DEFAULT_PAGE_SIZE: i64 = 10_000;

/// Upper bound on list calls per listing.
pub const DEFAULT_MAX_PAGES: usize = 100;

fn render<B: Serialize>(body: &B) -> String {
    serde_json::to_string(body).unwrap_or_else(|e| format!("<unserializable body: {e}>"))
}

/// Mirrors nestsync's view of the target onto a SCIM 2.0 endpoint.
///
/// Reads are fully paged and retried; mutations honour `dry_run` by logging the request
/// body instead of sending it.
#[derive(Debug, Clone)]
pub struct ScimTarget {
    client: ScimClient,
    retry: RetryPolicy,
    page_size: i64,
    max_pages: usize,
}

impl ScimTarget {
    /// Wraps a client with default paging and retry settings.
    #[must_use]
    pub fn new(client: ScimClient) -> Self {
        Self {
            client,
            retry: RetryPolicy::default(),
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    /// Overrides the retry policy used for reads.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Overrides the page size (clamped to at least 1).
    #[must_use]
    pub fn with_page_size(mut self, page_size: i64) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Overrides the page cap (clamped to at least 1).
    #[must_use]
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    /// Returns the underlying client.
    #[must_use]
    pub fn client(&self) -> &ScimClient {
        &self.client
    }

    /// Reads every page of a listing.
    ///
    /// Stops once `totalResults` resources were collected or on an empty page. Fails with
    /// [`ScimClientError::PageLimitExceeded`] when resources remain after the page cap.
    async fn collect_pages<T, F, Fut>(&self, resource: &str, fetch: F) -> ScimClientResult<Vec<T>>
    where
        F: Fn(i64, i64) -> Fut,
        Fut: Future<Output = ScimClientResult<ScimListResponse<T>>>,
    {
        let mut collected = Vec::new();
        let mut start_index: i64 = 1;
        let mut total_results: i64 = 0;

        for page in 1..=self.max_pages {
            let response = self
                .retry
                .execute(resource, || fetch(start_index, self.page_size))
                .await?;

            let fetched = response.resources.len();
            total_results = response.total_results;
            collected.extend(response.resources);
            debug!(
                resource,
                page,
                fetched,
                total_results = response.total_results,
                "Fetched page"
            );

            if fetched == 0 || collected.len() as i64 >= response.total_results {
                return Ok(collected);
            }
            start_index += fetched as i64;
        }

        warn!(
            resource,
            max_pages = self.max_pages,
            collected = collected.len(),
            total_results,
            "Listing still has resources after the page limit"
        );
        Err(ScimClientError::PageLimitExceeded {
            resource: resource.to_string(),
            max_pages: self.max_pages,
            collected: collected.len(),
            total_results,
        })
    }
}

#[async_trait]
impl TargetPlatform for ScimTarget {
    #[instrument(skip(self))]
    async fn list_users(&self) -> SyncResult<Vec<TargetUser>> {
        let users = self
            .collect_pages("Users", |start, count| self.client.list_users(start, count))
            .await?;
        Ok(users.into_iter().filter_map(ScimUser::into_target).collect())
    }

    #[instrument(skip(self))]
    async fn list_groups(&self) -> SyncResult<Vec<TargetGroup>> {
        let groups = self
            .collect_pages("Groups", |start, count| self.client.list_groups(start, count))
            .await?;
        Ok(groups.into_iter().filter_map(ScimGroup::into_target).collect())
    }

    async fn create_user(
        &self,
        display_name: &str,
        principal_handle: &str,
        dry_run: bool,
    ) -> SyncResult<()> {
        let user = ScimUser::new(principal_handle, display_name);
        let body = render(&user);
        if dry_run {
            info!(user_name = %principal_handle, body = %body, "[dry-run] Would create user");
            return Ok(());
        }

        debug!(user_name = %principal_handle, body = %body, "Creating user");
        match self.client.create_user(&user).await {
            Ok(created) => {
                info!(user_name = %principal_handle, id = ?created.id, "Created user");
                Ok(())
            }
            Err(e) => {
                error!(user_name = %principal_handle, body = %body, error = %e, "Create user failed");
                Err(e.into())
            }
        }
    }

    async fn create_group(&self, display_name: &str, dry_run: bool) -> SyncResult<()> {
        let group = ScimGroup::new(display_name);
        let body = render(&group);
        if dry_run {
            info!(group = %display_name, body = %body, "[dry-run] Would create group");
            return Ok(());
        }

        debug!(group = %display_name, body = %body, "Creating group");
        match self.client.create_group(&group).await {
            Ok(created) => {
                info!(group = %display_name, id = ?created.id, "Created group");
                Ok(())
            }
            Err(e) => {
                error!(group = %display_name, body = %body, error = %e, "Create group failed");
                Err(e.into())
            }
        }
    }

    async fn delete_group(&self, id: &str, dry_run: bool) -> SyncResult<()> {
        if dry_run {
            info!(group_id = %id, "[dry-run] Would delete group");
            return Ok(());
        }

        match self.client.delete_group(id).await {
            Ok(()) => {
                info!(group_id = %id, "Deleted group");
                Ok(())
            }
            Err(e) => {
                error!(group_id = %id, error = %e, "Delete group failed");
                Err(e.into())
            }
        }
    }

    async fn patch_group_members(
        &self,
        group_id: &str,
        add: &[String],
        remove: &[String],
        dry_run: bool,
    ) -> SyncResult<()> {
        let Some(patch) = ScimPatchRequest::members(add, remove)
            .map_err(ScimClientError::from)?
        else {
            debug!(group_id = %group_id, "No membership changes; patch skipped");
            return Ok(());
        };
        let body = render(&patch);

        if dry_run {
            info!(group_id = %group_id, body = %body, "[dry-run] Would patch group members");
            return Ok(());
        }

        debug!(group_id = %group_id, body = %body, "Patching group members");
        match self.client.patch_group(group_id, &patch).await {
            Ok(()) => {
                info!(
                    group_id = %group_id,
                    added = add.len(),
                    removed = remove.len(),
                    "Patched group members"
                );
                Ok(())
            }
            Err(e) => {
                error!(group_id = %group_id, body = %body, error = %e, "Patch group members failed");
                Err(e.into())
            }
        }
    }
}
