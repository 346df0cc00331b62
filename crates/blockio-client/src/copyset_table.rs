//! Copyset routing table
//!
//! Maps `(pool, copyset)` to the current routing record: member list,
//! leader hint, unstable flag and applied-index watermark. Returned
//! records are snapshots; the table lock is never held across an RPC.

use crate::member_index::MemberIndex;
use blockio_common::{ChunkServerId, CopysetInfo, CopysetKey};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};

/// Outcome of recording a new leader for a copyset
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateLeaderOutcome {
    /// Leader recorded, unstable flag cleared
    Updated,
    /// The reported leader is not among the cached members
    UnknownMember,
    /// The copyset is not cached
    NotFound,
}

/// Routing table keyed by copyset
#[derive(Default)]
pub struct CopysetTable {
    copysets: RwLock<HashMap<CopysetKey, CopysetInfo>>,
}

impl CopysetTable {
    /// Create an empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the routing record for a copyset
    #[must_use]
    pub fn get(&self, key: &CopysetKey) -> Option<CopysetInfo> {
        self.copysets.read().get(key).cloned()
    }

    /// Install an authoritative routing record and reconcile the member index
    ///
    /// Replaces any prior record, carrying the applied-index watermark
    /// forward so it never decreases. Bindings for members that left the
    /// copyset are removed from `members`, bindings for members that
    /// joined are added. The table write lock is held across the index
    /// update (table lock before index lock), so no reader can observe
    /// the two structures disagreeing about this copyset.
    pub fn put(&self, mut info: CopysetInfo, members: &MemberIndex) {
        let key = info.key();
        let new_ids: HashSet<ChunkServerId> =
            info.members.iter().map(|m| m.chunkserver_id).collect();

        let mut copysets = self.copysets.write();
        let old_ids: HashSet<ChunkServerId> = match copysets.get(&key) {
            Some(old) => {
                info.applied_index = info.applied_index.max(old.applied_index);
                old.members.iter().map(|m| m.chunkserver_id).collect()
            }
            None => HashSet::new(),
        };
        copysets.insert(key, info);

        let removed: Vec<ChunkServerId> = old_ids.difference(&new_ids).copied().collect();
        let added: Vec<ChunkServerId> = new_ids.difference(&old_ids).copied().collect();
        if !removed.is_empty() || !added.is_empty() {
            members.rebind(key, &removed, &added);
        }
    }

    /// Record the given member as the copyset's leader
    ///
    /// Clears the unstable flag on success.
    pub fn update_leader(&self, key: &CopysetKey, leader: ChunkServerId) -> UpdateLeaderOutcome {
        match self.copysets.write().get_mut(key) {
            Some(info) => {
                if info.set_leader(leader) {
                    UpdateLeaderOutcome::Updated
                } else {
                    UpdateLeaderOutcome::UnknownMember
                }
            }
            None => UpdateLeaderOutcome::NotFound,
        }
    }

    /// Raise the applied-index watermark; no-op when the copyset is absent
    pub fn update_applied_index(&self, key: &CopysetKey, applied_index: u64) {
        if let Some(info) = self.copysets.write().get_mut(key) {
            info.update_applied_index(applied_index);
        }
    }

    /// Applied-index watermark, 0 when the copyset is absent
    #[must_use]
    pub fn applied_index(&self, key: &CopysetKey) -> u64 {
        self.copysets
            .read()
            .get(key)
            .map_or(0, |info| info.applied_index)
    }

    /// Flag the copyset's leader as probably wrong
    pub fn mark_unstable(&self, key: &CopysetKey) {
        if let Some(info) = self.copysets.write().get_mut(key) {
            info.mark_leader_unstable();
        }
    }

    /// Flag the copyset when its cached leader is the given chunkserver,
    /// or when the leader is unknown
    ///
    /// Returns whether the flag was set. Check and set happen under one
    /// write lock, so a concurrent leader change cannot slip in between.
    pub fn mark_unstable_if_led_by(&self, key: &CopysetKey, leader: ChunkServerId) -> bool {
        if let Some(info) = self.copysets.write().get_mut(key) {
            match info.leader_id() {
                Some(current) if current != leader => return false,
                _ => {
                    info.mark_leader_unstable();
                    return true;
                }
            }
        }
        false
    }

    /// Whether the next leader read must refresh
    #[must_use]
    pub fn is_leader_may_change(&self, key: &CopysetKey) -> bool {
        self.copysets
            .read()
            .get(key)
            .is_some_and(|info| info.leader_unstable)
    }

    /// Number of cached copysets
    pub fn len(&self) -> usize {
        self.copysets.read().len()
    }

    /// Check if the table is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockio_common::{CopysetId, EndPoint, MemberEntry, PoolId};

    fn ep(s: &str) -> EndPoint {
        s.parse().unwrap()
    }

    fn cs(id: u32) -> ChunkServerId {
        ChunkServerId::new(id)
    }

    fn key(pool: u32, copyset: u32) -> CopysetKey {
        CopysetKey::new(PoolId::new(pool), CopysetId::new(copyset))
    }

    fn copyset(pool: u32, copyset_id: u32, ids: &[u32]) -> CopysetInfo {
        let members = ids
            .iter()
            .map(|id| {
                MemberEntry::new(cs(*id), ep(&format!("10.0.0.{id}:8200")))
            })
            .collect();
        CopysetInfo::new(PoolId::new(pool), CopysetId::new(copyset_id), members)
    }

    #[test]
    fn test_get_returns_snapshot() {
        let table = CopysetTable::new();
        let index = MemberIndex::new();
        table.put(copyset(1, 7, &[10, 11, 12]), &index);

        let mut snapshot = table.get(&key(1, 7)).unwrap();
        snapshot.mark_leader_unstable();

        assert!(!table.is_leader_may_change(&key(1, 7)));
    }

    #[test]
    fn test_put_binds_all_members() {
        let table = CopysetTable::new();
        let index = MemberIndex::new();
        table.put(copyset(1, 7, &[10, 11, 12]), &index);

        for id in [10, 11, 12] {
            assert_eq!(index.copysets_of(cs(id)), HashSet::from([key(1, 7)]));
        }
    }

    #[test]
    fn test_put_reconciles_membership_change() {
        let table = CopysetTable::new();
        let index = MemberIndex::new();
        table.put(copyset(1, 7, &[10, 11, 12]), &index);
        table.put(copyset(1, 7, &[11, 12, 99]), &index);

        assert!(index.copysets_of(cs(10)).is_empty());
        assert_eq!(index.copysets_of(cs(99)), HashSet::from([key(1, 7)]));
        assert_eq!(index.copysets_of(cs(11)), HashSet::from([key(1, 7)]));
    }

    #[test]
    fn test_put_and_index_stay_consistent() {
        // table and index must agree after any sequence of puts
        let table = CopysetTable::new();
        let index = MemberIndex::new();
        table.put(copyset(1, 7, &[10, 11, 12]), &index);
        table.put(copyset(1, 8, &[10, 20, 21]), &index);
        table.put(copyset(1, 7, &[11, 12, 99]), &index);

        for k in [key(1, 7), key(1, 8)] {
            let info = table.get(&k).unwrap();
            for member in &info.members {
                assert!(
                    index.copysets_of(member.chunkserver_id).contains(&k),
                    "member {} of {} missing from index",
                    member.chunkserver_id,
                    k
                );
            }
        }
        assert_eq!(index.copysets_of(cs(10)), HashSet::from([key(1, 8)]));
    }

    #[test]
    fn test_put_carries_applied_index_forward() {
        let table = CopysetTable::new();
        let index = MemberIndex::new();
        table.put(copyset(1, 7, &[10, 11, 12]), &index);
        table.update_applied_index(&key(1, 7), 250);

        table.put(copyset(1, 7, &[11, 12, 99]), &index);
        assert_eq!(table.applied_index(&key(1, 7)), 250);
    }

    #[test]
    fn test_update_leader_outcomes() {
        let table = CopysetTable::new();
        let index = MemberIndex::new();
        table.put(copyset(1, 7, &[10, 11, 12]), &index);
        table.mark_unstable(&key(1, 7));

        assert_eq!(
            table.update_leader(&key(1, 7), cs(11)),
            UpdateLeaderOutcome::Updated
        );
        assert!(!table.is_leader_may_change(&key(1, 7)));

        assert_eq!(
            table.update_leader(&key(1, 7), cs(99)),
            UpdateLeaderOutcome::UnknownMember
        );
        assert_eq!(
            table.update_leader(&key(2, 2), cs(10)),
            UpdateLeaderOutcome::NotFound
        );
    }

    #[test]
    fn test_applied_index_absent_key() {
        let table = CopysetTable::new();
        assert_eq!(table.applied_index(&key(1, 7)), 0);
        // no-op rather than creating an entry
        table.update_applied_index(&key(1, 7), 10);
        assert!(table.is_empty());
    }

    #[test]
    fn test_mark_unstable_if_led_by() {
        let table = CopysetTable::new();
        let index = MemberIndex::new();
        table.put(copyset(1, 7, &[10, 11, 12]), &index);

        // leader unknown: flagged
        assert!(table.mark_unstable_if_led_by(&key(1, 7), cs(10)));

        table.update_leader(&key(1, 7), cs(11));
        // a different member is leader: untouched
        assert!(!table.mark_unstable_if_led_by(&key(1, 7), cs(10)));
        assert!(!table.is_leader_may_change(&key(1, 7)));

        // the leader itself: flagged
        assert!(table.mark_unstable_if_led_by(&key(1, 7), cs(11)));
        assert!(table.is_leader_may_change(&key(1, 7)));
    }
}
