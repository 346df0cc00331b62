//! Chunk identity table
//!
//! Maps file-relative chunk positions (and stable chunk ids) to the
//! chunk identity learned from the metadata service. Entries are
//! write-once in normal operation; an authoritative update may overwrite
//! an entry and the last writer wins, which is harmless because every
//! writer was handed the same mapping.

use blockio_common::{ChunkId, ChunkIdInfo, ChunkIndex, Error, Result};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Chunk position and chunk id lookup table
#[derive(Default)]
pub struct ChunkTable {
    by_index: RwLock<HashMap<ChunkIndex, ChunkIdInfo>>,
    by_id: RwLock<HashMap<ChunkId, ChunkIdInfo>>,
}

impl ChunkTable {
    /// Create an empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the identity of the chunk at the given position
    pub fn lookup(&self, index: ChunkIndex) -> Result<ChunkIdInfo> {
        self.by_index
            .read()
            .get(&index)
            .copied()
            .ok_or(Error::NoSuchChunk(index))
    }

    /// Install or overwrite the identity of the chunk at the given position
    pub fn upsert(&self, index: ChunkIndex, info: ChunkIdInfo) {
        self.by_index.write().insert(index, info);
    }

    /// Look up a chunk identity by its stable id
    pub fn lookup_by_id(&self, chunk_id: ChunkId) -> Option<ChunkIdInfo> {
        self.by_id.read().get(&chunk_id).copied()
    }

    /// Install or overwrite a chunk identity keyed by its stable id
    pub fn upsert_by_id(&self, chunk_id: ChunkId, info: ChunkIdInfo) {
        self.by_id.write().insert(chunk_id, info);
    }

    /// Number of positions with a cached identity
    pub fn len(&self) -> usize {
        self.by_index.read().len()
    }

    /// Check if no positions are cached
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockio_common::{CopysetId, PoolId};

    fn info(chunk: u64) -> ChunkIdInfo {
        ChunkIdInfo::new(ChunkId::new(chunk), PoolId::new(1), CopysetId::new(7))
    }

    #[test]
    fn test_lookup_roundtrip() {
        let table = ChunkTable::new();
        table.upsert(ChunkIndex::new(4), info(400));

        assert_eq!(table.lookup(ChunkIndex::new(4)).unwrap(), info(400));
    }

    #[test]
    fn test_lookup_miss() {
        let table = ChunkTable::new();
        assert!(matches!(
            table.lookup(ChunkIndex::new(9)),
            Err(Error::NoSuchChunk(_))
        ));
    }

    #[test]
    fn test_upsert_last_writer_wins() {
        let table = ChunkTable::new();
        table.upsert(ChunkIndex::new(4), info(400));
        table.upsert(ChunkIndex::new(4), info(401));

        assert_eq!(
            table.lookup(ChunkIndex::new(4)).unwrap().chunk_id,
            ChunkId::new(401)
        );
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_lookup_by_id() {
        let table = ChunkTable::new();
        assert_eq!(table.lookup_by_id(ChunkId::new(400)), None);

        table.upsert_by_id(ChunkId::new(400), info(400));
        assert_eq!(table.lookup_by_id(ChunkId::new(400)), Some(info(400)));
    }
}
