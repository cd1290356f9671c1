/// Duplicate grouping by content hash.
///
/// Strategy:
/// 1. Group eligible files by size. A file with a unique size cannot have a
///    duplicate and is never read.
/// 2. Hash the remaining files in parallel (one file per task).
/// 3. Group by digest; every group of two or more becomes a [`DuplicateGroup`].
///
/// Within a group the keeper is the most recently modified member. Ties go to
/// the longest path, then to the lexicographically greatest path, so the
/// choice is deterministic across runs.
use crate::hasher::{ContentHash, ContentHasher};
use crate::model::{DuplicateGroup, DuplicateMember, ResultId};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::time::SystemTime;

/// A file considered for duplicate grouping.
#[derive(Debug, Clone)]
pub struct DedupInput {
    pub path: PathBuf,
    pub size: u64,
    pub modified: Option<SystemTime>,
}

/// Order members so the keeper sorts first.
pub fn keeper_order(a: &DuplicateMember, b: &DuplicateMember) -> Ordering {
    b.modified
        .cmp(&a.modified)
        .then_with(|| b.path.as_os_str().len().cmp(&a.path.as_os_str().len()))
        .then_with(|| b.path.cmp(&a.path))
}

/// Build a group from members sharing one hash. `None` for fewer than two.
pub fn build_group(mut members: Vec<DuplicateMember>) -> Option<DuplicateGroup> {
    if members.len() < 2 {
        return None;
    }
    debug_assert!(members.windows(2).all(|w| w[0].hash == w[1].hash));
    members.sort_by(keeper_order);
    let total_size = members.iter().map(|m| m.size).sum();
    Some(DuplicateGroup {
        group_id: ResultId::generate(),
        members,
        total_size,
    })
}

/// Find duplicate groups among `inputs`.
///
/// Files that cannot be read while hashing are left out of every group.
/// Groups are returned largest reclaimable size first.
pub fn find_duplicates(
    inputs: &[DedupInput],
    hasher: &ContentHasher,
    cancel: &AtomicBool,
) -> Vec<DuplicateGroup> {
    let mut by_size: HashMap<u64, Vec<&DedupInput>> = HashMap::new();
    for input in inputs.iter().filter(|i| hasher.is_eligible(i.size)) {
        by_size.entry(input.size).or_default().push(input);
    }

    let to_hash: Vec<PathBuf> = by_size
        .values()
        .filter(|group| group.len() > 1)
        .flat_map(|group| group.iter().map(|i| i.path.clone()))
        .collect();
    if to_hash.is_empty() {
        return Vec::new();
    }

    let lookup: HashMap<&PathBuf, &DedupInput> = inputs.iter().map(|i| (&i.path, i)).collect();
    let mut by_hash: HashMap<ContentHash, Vec<DuplicateMember>> = HashMap::new();
    for (path, hash) in hasher.hash_many(&to_hash, cancel) {
        let Some(input) = lookup.get(&path) else {
            continue;
        };
        by_hash.entry(hash).or_default().push(DuplicateMember {
            path,
            size: input.size,
            hash,
            modified: input.modified,
        });
    }

    let mut groups: Vec<DuplicateGroup> = by_hash.into_values().filter_map(build_group).collect();
    groups.sort_by(|a, b| {
        let reclaim = |g: &DuplicateGroup| g.removable().iter().map(|m| m.size).sum::<u64>();
        reclaim(b)
            .cmp(&reclaim(a))
            .then_with(|| a.members[0].path.cmp(&b.members[0].path))
    });
    groups
}
