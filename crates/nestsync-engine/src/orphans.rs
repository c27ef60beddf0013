//! Orphan candidates: target groups nested under the root that left the source tree.

use std::collections::{HashSet, VecDeque};

use nestsync_core::{ReconciliationMaps, TargetGroup, TargetSnapshot};

/// Every target group reachable from `root` through group-typed member references,
/// excluding `root` itself. Breadth-first, each group at most once.
#[must_use]
pub fn nested_target_groups<'a>(
    root: &'a TargetGroup,
    snapshot: &'a TargetSnapshot,
) -> Vec<&'a TargetGroup> {
    nested_below(root, snapshot, |_| true)
}

fn nested_below<'a>(
    root: &'a TargetGroup,
    snapshot: &'a TargetSnapshot,
    descend: impl Fn(&TargetGroup) -> bool,
) -> Vec<&'a TargetGroup> {
    let mut seen: HashSet<&str> = HashSet::from([root.id.as_str()]);
    let mut queue = VecDeque::from([root]);
    let mut nested = Vec::new();

    while let Some(group) = queue.pop_front() {
        for entry in &group.members {
            let Some(child) = snapshot.group_by_id(&entry.value) else {
                continue;
            };
            if seen.insert(child.id.as_str()) {
                nested.push(child);
                if descend(child) {
                    queue.push_back(child);
                }
            }
        }
    }

    nested
}

/// Nested target groups whose names no longer appear in the flattened source tree.
///
/// Groups below an unwalked group are not considered: the source side of that subtree is
/// unknown. Candidates still need a live source check before deletion.
#[must_use]
pub fn orphan_candidates<'a>(
    root: &'a TargetGroup,
    snapshot: &'a TargetSnapshot,
    maps: &ReconciliationMaps,
) -> Vec<&'a TargetGroup> {
    nested_below(root, snapshot, |group| !maps.is_unwalked(&group.display_name))
        .into_iter()
        .filter(|group| !maps.contains_group(&group.display_name))
        .collect()
}
