//! Chunkserver-to-copyset reverse index
//!
//! For each chunkserver, the set of copysets it participates in. Used to
//! mass-invalidate leader hints when a chunkserver (or a whole server)
//! is reported unstable.
//!
//! Lock order: callers holding the copyset table lock may take this
//! index's lock, never the reverse. A reader that wants to touch the
//! copyset table afterwards must take a snapshot here first.

use blockio_common::{ChunkServerId, CopysetKey};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};

/// Reverse index from chunkserver id to copyset keys
#[derive(Default)]
pub struct MemberIndex {
    bindings: RwLock<HashMap<ChunkServerId, HashSet<CopysetKey>>>,
}

impl MemberIndex {
    /// Create an empty index
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that the chunkserver participates in the copyset
    pub fn add_binding(&self, chunkserver_id: ChunkServerId, key: CopysetKey) {
        self.bindings
            .write()
            .entry(chunkserver_id)
            .or_default()
            .insert(key);
    }

    /// Drop the chunkserver's participation in the copyset
    pub fn remove_binding(&self, chunkserver_id: ChunkServerId, key: CopysetKey) {
        let mut bindings = self.bindings.write();
        if let Some(keys) = bindings.get_mut(&chunkserver_id) {
            keys.remove(&key);
            if keys.is_empty() {
                bindings.remove(&chunkserver_id);
            }
        }
    }

    /// Apply a membership change for one copyset in a single critical section
    ///
    /// Readers observe either the old or the new binding set, never a
    /// half-applied mix.
    pub fn rebind(&self, key: CopysetKey, removed: &[ChunkServerId], added: &[ChunkServerId]) {
        let mut bindings = self.bindings.write();
        for id in removed {
            if let Some(keys) = bindings.get_mut(id) {
                keys.remove(&key);
                if keys.is_empty() {
                    bindings.remove(id);
                }
            }
        }
        for id in added {
            bindings.entry(*id).or_default().insert(key);
        }
    }

    /// Snapshot of the copysets the chunkserver participates in
    ///
    /// The internal lock is released before the snapshot is returned.
    #[must_use]
    pub fn copysets_of(&self, chunkserver_id: ChunkServerId) -> HashSet<CopysetKey> {
        self.bindings
            .read()
            .get(&chunkserver_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of chunkservers with at least one binding
    pub fn len(&self) -> usize {
        self.bindings.read().len()
    }

    /// Check if the index is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockio_common::{CopysetId, PoolId};

    fn key(pool: u32, copyset: u32) -> CopysetKey {
        CopysetKey::new(PoolId::new(pool), CopysetId::new(copyset))
    }

    fn cs(id: u32) -> ChunkServerId {
        ChunkServerId::new(id)
    }

    #[test]
    fn test_add_remove_binding() {
        let index = MemberIndex::new();
        index.add_binding(cs(10), key(1, 7));
        index.add_binding(cs(10), key(1, 8));

        assert_eq!(index.copysets_of(cs(10)).len(), 2);

        index.remove_binding(cs(10), key(1, 7));
        assert_eq!(index.copysets_of(cs(10)), HashSet::from([key(1, 8)]));
    }

    #[test]
    fn test_remove_last_binding_drops_entry() {
        let index = MemberIndex::new();
        index.add_binding(cs(10), key(1, 7));
        index.remove_binding(cs(10), key(1, 7));

        assert!(index.is_empty());
        assert!(index.copysets_of(cs(10)).is_empty());
    }

    #[test]
    fn test_rebind() {
        let index = MemberIndex::new();
        index.add_binding(cs(10), key(1, 7));
        index.add_binding(cs(11), key(1, 7));

        index.rebind(key(1, 7), &[cs(10)], &[cs(99)]);

        assert!(index.copysets_of(cs(10)).is_empty());
        assert_eq!(index.copysets_of(cs(11)), HashSet::from([key(1, 7)]));
        assert_eq!(index.copysets_of(cs(99)), HashSet::from([key(1, 7)]));
    }

    #[test]
    fn test_copysets_of_is_snapshot() {
        let index = MemberIndex::new();
        index.add_binding(cs(10), key(1, 7));

        let snapshot = index.copysets_of(cs(10));
        index.remove_binding(cs(10), key(1, 7));

        assert_eq!(snapshot, HashSet::from([key(1, 7)]));
    }
}
