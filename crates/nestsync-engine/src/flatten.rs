//! Hierarchy flattening.
//!
//! Walks a source group tree depth-first and records, for every reachable group, its
//! immediate members. Sibling subtrees are walked concurrently; member-list fetches are
//! bounded by a semaphore so a wide tree cannot flood the source directory.
//!
//! Two sets keep the walk finite:
//!
//! - the ancestor path of the current group; a child already on it is a cycle, logged
//!   and not descended into
//! - the set of groups already claimed for walking in this run; a child reached again
//!   through a second parent still gets its edge recorded but is walked only once
//!
//! A group past the depth limit is recorded but not walked. Unless another path reaches it
//! within the limit, it ends up in [`ReconciliationMaps::unwalked_groups`].

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::{try_join_all, BoxFuture, FutureExt};
use nestsync_core::{
    casefold, Member, MemberKind, ReconciliationMaps, SourceDirectory, SourceGroup, SourceUser, SyncError,
    SyncResult,
};
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, info, warn};

/// Result of flattening one root.
#[derive(Debug, Clone)]
pub struct Flattened {
    /// Distinct groups, distinct users and per-group immediate members.
    pub maps: ReconciliationMaps,
    /// Membership edges that closed a cycle and were not followed.
    pub cycles_skipped: usize,
    /// Nested groups beyond the depth limit that were recorded but not walked.
    pub depth_limited: usize,
}

struct WalkState {
    maps: ReconciliationMaps,
    claimed: HashSet<String>,
    walked: HashSet<String>,
    beyond_limit: Vec<String>,
    cycles_skipped: usize,
    depth_limited: usize,
}

/// Flattens source group trees.
pub struct HierarchyFlattener {
    source: Arc<dyn SourceDirectory>,
    fetch_permits: Arc<Semaphore>,
    max_depth: usize,
}

impl HierarchyFlattener {
    /// Creates a flattener allowing `concurrency` in-flight member-list fetches.
    pub fn new(source: Arc<dyn SourceDirectory>, concurrency: usize, max_depth: usize) -> Self {
        Self {
            source,
            fetch_permits: Arc::new(Semaphore::new(concurrency.max(1))),
            max_depth,
        }
    }

    /// Flattens the tree below `root`.
    ///
    /// Any member-list fetch failure aborts the walk; partial maps are never returned.
    pub async fn flatten(&self, root: &SourceGroup) -> SyncResult<Flattened> {
        let state = Mutex::new(WalkState {
            maps: ReconciliationMaps::new(root.display_name.clone()),
            claimed: HashSet::from([root.id.clone()]),
            walked: HashSet::new(),
            beyond_limit: Vec::new(),
            cycles_skipped: 0,
            depth_limited: 0,
        });

        self.walk(root.clone(), 0, Arc::new(Vec::new()), &state)
            .await?;

        let mut state = state.into_inner();
        for name in std::mem::take(&mut state.beyond_limit) {
            if !state.walked.contains(&casefold(&name)) {
                state.maps.unwalked_groups.insert(name);
            }
        }

        info!(
            root = %root.display_name,
            groups = state.maps.distinct_groups.len(),
            users = state.maps.distinct_users.len(),
            cycles_skipped = state.cycles_skipped,
            depth_limited = state.depth_limited,
            unwalked = state.maps.unwalked_groups.len(),
            "Source hierarchy flattened"
        );

        Ok(Flattened {
            maps: state.maps,
            cycles_skipped: state.cycles_skipped,
            depth_limited: state.depth_limited,
        })
    }

    fn walk<'a>(
        &'a self,
        group: SourceGroup,
        depth: usize,
        ancestors: Arc<Vec<String>>,
        state: &'a Mutex<WalkState>,
    ) -> BoxFuture<'a, SyncResult<()>> {
        async move {
            let members = {
                let _permit = self
                    .fetch_permits
                    .acquire()
                    .await
                    .map_err(|e| SyncError::Task(format!("fetch semaphore closed: {e}")))?;
                self.source.list_group_members(&group.id).await?
            };

            debug!(
                group = %group.display_name,
                depth,
                members = members.len(),
                "Listed group members"
            );

            let mut path = Vec::with_capacity(ancestors.len() + 1);
            path.extend(ancestors.iter().cloned());
            path.push(group.id.clone());

            let child_depth = depth + 1;
            let mut children = Vec::new();
            {
                let mut st = state.lock().await;
                st.walked.insert(casefold(&group.display_name));
                for member in members {
                    match member.kind {
                        MemberKind::User => {
                            let Some(handle) = member.principal_handle else {
                                warn!(
                                    group = %group.display_name,
                                    user = %member.display_name,
                                    "User without principal handle skipped"
                                );
                                continue;
                            };
                            let user = SourceUser::new(member.display_name, handle);
                            st.maps.distinct_users.insert(user.clone());
                            st.maps
                                .record_member(&group.display_name, Member::User(user));
                        }
                        MemberKind::Group => {
                            st.maps.distinct_groups.insert(member.display_name.clone());
                            st.maps.record_member(
                                &group.display_name,
                                Member::group(member.display_name.clone(), child_depth),
                            );

                            if path.contains(&member.id) {
                                warn!(
                                    parent = %group.display_name,
                                    child = %member.display_name,
                                    "Cycle in group nesting; not descending"
                                );
                                st.cycles_skipped += 1;
                                continue;
                            }
                            if child_depth > self.max_depth {
                                warn!(
                                    parent = %group.display_name,
                                    child = %member.display_name,
                                    depth = child_depth,
                                    max_depth = self.max_depth,
                                    "Nesting depth limit reached; not descending"
                                );
                                st.depth_limited += 1;
                                st.beyond_limit.push(member.display_name);
                                continue;
                            }
                            if !st.claimed.insert(member.id.clone()) {
                                debug!(
                                    group = %member.display_name,
                                    "Group already walked through another parent"
                                );
                                continue;
                            }
                            children.push(SourceGroup::new(member.id, member.display_name));
                        }
                    }
                }
            }

            let path = Arc::new(path);
            try_join_all(
                children
                    .into_iter()
                    .map(|child| self.walk(child, child_depth, Arc::clone(&path), state)),
            )
            .await?;

            Ok(())
        }
        .boxed()
    }
}
