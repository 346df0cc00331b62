//! Replica-side leader discovery
//!
//! A copyset's own members are the freshest source for "who is leader":
//! elections complete there before the metadata service hears about
//! them. The cache probes members one at a time through this trait.

use async_trait::async_trait;
use blockio_common::{ChunkServerId, CopysetKey, EndPoint, MemberEntry, Result};

/// Reply to a "who is the leader" probe
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LeaderReply {
    /// Leader id as reported by the replica; `None` when the replica
    /// only knows the leader's address
    pub chunkserver_id: Option<ChunkServerId>,
    /// Leader network endpoint
    pub endpoint: EndPoint,
}

impl LeaderReply {
    /// Reply carrying both id and endpoint
    #[must_use]
    pub const fn new(chunkserver_id: ChunkServerId, endpoint: EndPoint) -> Self {
        Self {
            chunkserver_id: Some(chunkserver_id),
            endpoint,
        }
    }

    /// Reply carrying only the leader's endpoint
    #[must_use]
    pub const fn endpoint_only(endpoint: EndPoint) -> Self {
        Self {
            chunkserver_id: None,
            endpoint,
        }
    }
}

/// Asks a single replica which member currently leads its copyset
///
/// The caller applies the per-call timeout; implementations should not
/// retry internally.
#[async_trait]
pub trait LeaderProbe: Send + Sync {
    /// Ask `member` for the current leader of `key`
    async fn get_leader(&self, key: &CopysetKey, member: &MemberEntry) -> Result<LeaderReply>;
}
