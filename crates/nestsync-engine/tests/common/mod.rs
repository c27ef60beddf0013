//! In-memory collaborators for engine tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tracing_subscriber::util::SubscriberInitExt;
use nestsync_core::{
    casefold, SourceDirectory, SourceGroup, SourceMember, SyncError, SyncResult, TargetGroup,
    TargetMemberRef, TargetPlatform, TargetUser,
};

/// Installs a test subscriber once; output only shows with `--nocapture`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("nestsync_engine=debug")
        .with_test_writer()
        .try_init();
}

/// Log lines captured by a thread-local subscriber.
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    /// Routes this thread's events into the buffer until the guard drops.
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.clone();
        tracing_subscriber::fmt()
            .with_env_filter("nestsync_engine=debug")
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .set_default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl std::io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

// ── Source ─────────────────────────────────────────────────────────────

/// Source directory backed by a map of group id → (name, members).
#[derive(Default)]
pub struct FakeDirectory {
    groups: HashMap<String, (String, Vec<SourceMember>)>,
    aliases: HashMap<String, String>,
    failing_lists: HashSet<String>,
    failing_lookups: HashSet<String>,
    fetch_delay: Option<Duration>,
    fetches: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn group(mut self, id: &str, name: &str, members: Vec<SourceMember>) -> Self {
        self.groups.insert(id.to_string(), (name.to_string(), members));
        self
    }

    /// Name lookup for `name` returns the group with id `id` regardless of its real name.
    pub fn alias(mut self, name: &str, id: &str) -> Self {
        self.aliases.insert(casefold(name), id.to_string());
        self
    }

    pub fn failing_list(mut self, id: &str) -> Self {
        self.failing_lists.insert(id.to_string());
        self
    }

    pub fn failing_lookup(mut self, name: &str) -> Self {
        self.failing_lookups.insert(casefold(name));
        self
    }

    pub fn with_fetch_delay(mut self, delay: Duration) -> Self {
        self.fetch_delay = Some(delay);
        self
    }

    pub fn fetches(&self) -> Vec<String> {
        self.fetches.lock().unwrap().clone()
    }

    pub fn fetch_count(&self, id: &str) -> usize {
        self.fetches().iter().filter(|f| f.as_str() == id).count()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceDirectory for FakeDirectory {
    async fn resolve_group_by_name(&self, name: &str) -> SyncResult<Option<SourceGroup>> {
        if self.failing_lookups.contains(&casefold(name)) {
            return Err(SyncError::Source(format!("lookup of '{name}' timed out")));
        }
        if let Some(id) = self.aliases.get(&casefold(name)) {
            return Ok(self
                .groups
                .get(id)
                .map(|(real, _)| SourceGroup::new(id.clone(), real.clone())));
        }
        Ok(self
            .groups
            .iter()
            .find(|(_, (real, _))| casefold(real) == casefold(name))
            .map(|(id, (real, _))| SourceGroup::new(id.clone(), real.clone())))
    }

    async fn list_group_members(&self, group_id: &str) -> SyncResult<Vec<SourceMember>> {
        self.fetches.lock().unwrap().push(group_id.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.fetch_delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing_lists.contains(group_id) {
            return Err(SyncError::Source(format!("members of {group_id}: 503")));
        }
        Ok(self
            .groups
            .get(group_id)
            .map(|(_, members)| members.clone())
            .unwrap_or_default())
    }
}

// ── Target ─────────────────────────────────────────────────────────────

/// A mutation seen by [`FakeTarget`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CreateUser { user_name: String, dry_run: bool },
    CreateGroup { name: String, dry_run: bool },
    DeleteGroup { id: String, dry_run: bool },
    Patch {
        group_id: String,
        add: Vec<String>,
        remove: Vec<String>,
        dry_run: bool,
    },
}

#[derive(Default)]
struct TargetState {
    users: Vec<TargetUser>,
    groups: Vec<TargetGroup>,
    next_id: usize,
}

/// Flat target platform that applies mutations to its own state unless `dry_run`.
#[derive(Default)]
pub struct FakeTarget {
    state: Mutex<TargetState>,
    calls: Mutex<Vec<Call>>,
    failing_users: HashSet<String>,
    failing_patches: HashSet<String>,
}

impl FakeTarget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user(self, id: &str, user_name: &str) -> Self {
        self.state.lock().unwrap().users.push(TargetUser {
            id: id.to_string(),
            user_name: user_name.to_string(),
            display_name: None,
        });
        self
    }

    pub fn group(self, id: &str, name: &str, members: &[&str]) -> Self {
        self.state.lock().unwrap().groups.push(TargetGroup {
            id: id.to_string(),
            display_name: name.to_string(),
            members: members
                .iter()
                .map(|m| TargetMemberRef::new(*m, None))
                .collect(),
        });
        self
    }

    pub fn failing_user(mut self, user_name: &str) -> Self {
        self.failing_users.insert(casefold(user_name));
        self
    }

    pub fn failing_patch(mut self, group_id: &str) -> Self {
        self.failing_patches.insert(group_id.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn mutation_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn user_id(&self, user_name: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .users
            .iter()
            .find(|u| casefold(&u.user_name) == casefold(user_name))
            .map(|u| u.id.clone())
    }

    pub fn group_id(&self, name: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .groups
            .iter()
            .find(|g| casefold(&g.display_name) == casefold(name))
            .map(|g| g.id.clone())
    }

    pub fn group_count(&self) -> usize {
        self.state.lock().unwrap().groups.len()
    }

    pub fn user_count(&self) -> usize {
        self.state.lock().unwrap().users.len()
    }

    /// Member ids of the group named `name`, sorted.
    pub fn member_ids(&self, name: &str) -> Vec<String> {
        let state = self.state.lock().unwrap();
        let mut ids: Vec<String> = state
            .groups
            .iter()
            .find(|g| casefold(&g.display_name) == casefold(name))
            .map(|g| g.members.iter().map(|m| m.value.clone()).collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl TargetPlatform for FakeTarget {
    async fn list_users(&self) -> SyncResult<Vec<TargetUser>> {
        Ok(self.state.lock().unwrap().users.clone())
    }

    async fn list_groups(&self) -> SyncResult<Vec<TargetGroup>> {
        Ok(self.state.lock().unwrap().groups.clone())
    }

    async fn create_user(
        &self,
        display_name: &str,
        principal_handle: &str,
        dry_run: bool,
    ) -> SyncResult<()> {
        self.record(Call::CreateUser {
            user_name: principal_handle.to_string(),
            dry_run,
        });
        if self.failing_users.contains(&casefold(principal_handle)) {
            return Err(SyncError::Target {
                status: Some(400),
                message: format!("invalid userName {principal_handle}"),
            });
        }
        if dry_run {
            return Ok(());
        }
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("new-u{}", state.next_id);
        state.users.push(TargetUser {
            id,
            user_name: principal_handle.to_string(),
            display_name: Some(display_name.to_string()),
        });
        Ok(())
    }

    async fn create_group(&self, display_name: &str, dry_run: bool) -> SyncResult<()> {
        self.record(Call::CreateGroup {
            name: display_name.to_string(),
            dry_run,
        });
        if dry_run {
            return Ok(());
        }
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("new-g{}", state.next_id);
        state.groups.push(TargetGroup {
            id,
            display_name: display_name.to_string(),
            members: vec![],
        });
        Ok(())
    }

    async fn delete_group(&self, id: &str, dry_run: bool) -> SyncResult<()> {
        self.record(Call::DeleteGroup {
            id: id.to_string(),
            dry_run,
        });
        if dry_run {
            return Ok(());
        }
        let mut state = self.state.lock().unwrap();
        state.groups.retain(|g| g.id != id);
        for group in &mut state.groups {
            group.members.retain(|m| m.value != id);
        }
        Ok(())
    }

    async fn patch_group_members(
        &self,
        group_id: &str,
        add: &[String],
        remove: &[String],
        dry_run: bool,
    ) -> SyncResult<()> {
        assert!(
            !(add.is_empty() && remove.is_empty()),
            "empty patch must never reach the target"
        );
        let mut sorted_add = add.to_vec();
        sorted_add.sort();
        let mut sorted_remove = remove.to_vec();
        sorted_remove.sort();
        self.record(Call::Patch {
            group_id: group_id.to_string(),
            add: sorted_add,
            remove: sorted_remove,
            dry_run,
        });
        if self.failing_patches.contains(group_id) {
            return Err(SyncError::Target {
                status: Some(500),
                message: "internal error".to_string(),
            });
        }
        if dry_run {
            return Ok(());
        }
        let mut state = self.state.lock().unwrap();
        let group = state
            .groups
            .iter_mut()
            .find(|g| g.id == group_id)
            .ok_or_else(|| SyncError::Target {
                status: Some(404),
                message: format!("group {group_id} not found"),
            })?;
        group.members.retain(|m| !remove.contains(&m.value));
        for id in add {
            if !group.members.iter().any(|m| &m.value == id) {
                group.members.push(TargetMemberRef::new(id.clone(), None));
            }
        }
        Ok(())
    }
}
