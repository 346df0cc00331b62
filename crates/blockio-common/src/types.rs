//! Core type definitions for the blockio client
//!
//! This module defines the identifiers and routing records the client
//! uses to address chunks and copysets across the cluster.

use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

/// Identifier of a logical pool
#[derive(
    Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, From, Into,
)]
pub struct PoolId(u32);

impl PoolId {
    /// Create a pool id from its numeric value
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the numeric value
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Debug for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PoolId({})", self.0)
    }
}

/// Identifier of a copyset within a pool
#[derive(
    Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, From, Into,
)]
pub struct CopysetId(u32);

impl CopysetId {
    /// Create a copyset id from its numeric value
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the numeric value
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Debug for CopysetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CopysetId({})", self.0)
    }
}

/// Stable identifier of a chunk
#[derive(
    Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, From, Into,
)]
pub struct ChunkId(u64);

impl ChunkId {
    /// Create a chunk id from its numeric value
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the numeric value
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChunkId({})", self.0)
    }
}

/// File-relative position of a chunk
#[derive(
    Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, From, Into,
)]
pub struct ChunkIndex(u64);

impl ChunkIndex {
    /// Create a chunk index from its numeric value
    #[must_use]
    pub const fn new(index: u64) -> Self {
        Self(index)
    }

    /// Get the numeric value
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for ChunkIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChunkIndex({})", self.0)
    }
}

/// Identifier of a chunkserver replica
#[derive(
    Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, From, Into,
)]
pub struct ChunkServerId(u32);

impl ChunkServerId {
    /// Create a chunkserver id from its numeric value
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the numeric value
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Debug for ChunkServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChunkServerId({})", self.0)
    }
}

/// Network endpoint of a chunkserver
///
/// Thin wrapper over `SocketAddr`; two endpoints compare equal exactly
/// when their address bytes compare equal.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub struct EndPoint(SocketAddr);

impl EndPoint {
    /// Create an endpoint from a socket address
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self(addr)
    }

    /// Get the socket address
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.0
    }

    /// Get the ip part
    #[must_use]
    pub const fn ip(&self) -> IpAddr {
        self.0.ip()
    }

    /// Get the port part
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.0.port()
    }
}

impl From<SocketAddr> for EndPoint {
    fn from(addr: SocketAddr) -> Self {
        Self(addr)
    }
}

impl FromStr for EndPoint {
    type Err = std::net::AddrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<SocketAddr>().map(Self)
    }
}

impl fmt::Debug for EndPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EndPoint({})", self.0)
    }
}

/// Composite key addressing a copyset
///
/// A structured pair rather than a concatenated string, so the key can
/// never collide across the numeric ranges of the two ids.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display)]
#[display("{pool_id}/{copyset_id}")]
pub struct CopysetKey {
    /// Pool the copyset belongs to
    pub pool_id: PoolId,
    /// Copyset id within the pool
    pub copyset_id: CopysetId,
}

impl CopysetKey {
    /// Create a copyset key
    #[must_use]
    pub const fn new(pool_id: PoolId, copyset_id: CopysetId) -> Self {
        Self {
            pool_id,
            copyset_id,
        }
    }
}

impl fmt::Debug for CopysetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CopysetKey({}/{})", self.pool_id, self.copyset_id)
    }
}

/// Stable identity of a chunk
///
/// Immutable once learned; a chunk never moves between copysets without
/// the metadata service handing out a fresh mapping.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkIdInfo {
    /// Stable chunk id
    pub chunk_id: ChunkId,
    /// Pool owning the chunk
    pub pool_id: PoolId,
    /// Copyset serving the chunk
    pub copyset_id: CopysetId,
}

impl ChunkIdInfo {
    /// Create a chunk identity record
    #[must_use]
    pub const fn new(chunk_id: ChunkId, pool_id: PoolId, copyset_id: CopysetId) -> Self {
        Self {
            chunk_id,
            pool_id,
            copyset_id,
        }
    }

    /// Key of the copyset serving this chunk
    #[must_use]
    pub const fn key(&self) -> CopysetKey {
        CopysetKey::new(self.pool_id, self.copyset_id)
    }
}

/// One replica of a copyset
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberEntry {
    /// Replica id
    pub chunkserver_id: ChunkServerId,
    /// Replica network endpoint
    pub endpoint: EndPoint,
}

impl MemberEntry {
    /// Create a member entry
    #[must_use]
    pub const fn new(chunkserver_id: ChunkServerId, endpoint: EndPoint) -> Self {
        Self {
            chunkserver_id,
            endpoint,
        }
    }
}

/// Routing record for one copyset
///
/// The member ordering is the round-robin probe order used when asking
/// the group for its leader. `current_leader_index`, when set, points at
/// a valid position in `members`. `applied_index` only ever grows.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopysetInfo {
    /// Pool the copyset belongs to
    pub pool_id: PoolId,
    /// Copyset id within the pool
    pub copyset_id: CopysetId,
    /// Replicas, in probe order
    pub members: Vec<MemberEntry>,
    /// Position of the known leader in `members`, if any
    pub current_leader_index: Option<usize>,
    /// Set when the last interaction suggests the leader has moved
    pub leader_unstable: bool,
    /// Highest consensus log index observed applied on this group
    pub applied_index: u64,
}

impl CopysetInfo {
    /// Create a routing record with no known leader
    #[must_use]
    pub fn new(pool_id: PoolId, copyset_id: CopysetId, members: Vec<MemberEntry>) -> Self {
        Self {
            pool_id,
            copyset_id,
            members,
            current_leader_index: None,
            leader_unstable: false,
            applied_index: 0,
        }
    }

    /// Key of this copyset
    #[must_use]
    pub const fn key(&self) -> CopysetKey {
        CopysetKey::new(self.pool_id, self.copyset_id)
    }

    /// The member currently recorded as leader, if known
    #[must_use]
    pub fn leader(&self) -> Option<&MemberEntry> {
        self.current_leader_index.and_then(|i| self.members.get(i))
    }

    /// Id of the member currently recorded as leader, if known
    #[must_use]
    pub fn leader_id(&self) -> Option<ChunkServerId> {
        self.leader().map(|m| m.chunkserver_id)
    }

    /// Position of the given member in the member list
    #[must_use]
    pub fn index_of(&self, id: ChunkServerId) -> Option<usize> {
        self.members.iter().position(|m| m.chunkserver_id == id)
    }

    /// Whether any member is reachable at the given endpoint
    #[must_use]
    pub fn has_member_endpoint(&self, endpoint: &EndPoint) -> bool {
        self.members.iter().any(|m| m.endpoint == *endpoint)
    }

    /// Record the given member as leader
    ///
    /// Clears the unstable flag on success. Returns `false` when the id
    /// is not among the members; the caller must then recover the member
    /// list from the metadata service.
    pub fn set_leader(&mut self, id: ChunkServerId) -> bool {
        match self.index_of(id) {
            Some(index) => {
                self.current_leader_index = Some(index);
                self.leader_unstable = false;
                true
            }
            None => false,
        }
    }

    /// Raise the applied-index watermark
    ///
    /// The watermark never decreases.
    pub fn update_applied_index(&mut self, applied_index: u64) {
        self.applied_index = self.applied_index.max(applied_index);
    }

    /// Flag the leader as probably wrong; the next read must refresh
    pub fn mark_leader_unstable(&mut self) {
        self.leader_unstable = true;
    }

    /// Clear the unstable flag
    pub fn clear_leader_unstable(&mut self) {
        self.leader_unstable = false;
    }
}
