//! Error types for the blockio client

use crate::types::{ChunkIndex, ChunkServerId, CopysetId, PoolId};
use thiserror::Error;

/// Common result type for blockio client operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for the blockio client
#[derive(Debug, Error)]
pub enum Error {
    /// The copyset is not present in the routing table
    #[error("no cached copyset: pool {pool_id}, copyset {copyset_id}")]
    NoSuchCopyset {
        pool_id: PoolId,
        copyset_id: CopysetId,
    },

    /// The chunk position has no cached identity
    #[error("no cached chunk at index {0}")]
    NoSuchChunk(ChunkIndex),

    /// Leader discovery exhausted its retry budget
    #[error("leader unknown for pool {pool_id}, copyset {copyset_id} after {attempts} attempts")]
    LeaderUnknown {
        pool_id: PoolId,
        copyset_id: CopysetId,
        attempts: u32,
    },

    /// A reported leader is not among the cached members
    #[error("chunkserver {chunkserver_id} is not a member of pool {pool_id}, copyset {copyset_id}")]
    UnknownMember {
        chunkserver_id: ChunkServerId,
        pool_id: PoolId,
        copyset_id: CopysetId,
    },

    /// The metadata service failed or returned an unusable reply
    #[error("metadata service error: {0}")]
    MetadataService(String),

    /// An RPC did not complete within its deadline
    #[error("request timeout")]
    RpcTimeout,

    /// A connection to a remote peer could not be established
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
}

impl Error {
    /// Create a metadata service error
    pub fn metadata_service(msg: impl Into<String>) -> Self {
        Self::MetadataService(msg.into())
    }

    /// Check if this is a transient error worth retrying
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RpcTimeout | Self::ConnectionFailed(_) | Self::MetadataService(_)
        )
    }

    /// Check if this is a cache miss
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NoSuchCopyset { .. } | Self::NoSuchChunk(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_retryable() {
        assert!(Error::RpcTimeout.is_retryable());
        assert!(Error::ConnectionFailed("refused".into()).is_retryable());
        assert!(!Error::NoSuchChunk(ChunkIndex::new(3)).is_retryable());
    }

    #[test]
    fn test_error_not_found() {
        assert!(Error::NoSuchCopyset {
            pool_id: PoolId::new(1),
            copyset_id: CopysetId::new(7),
        }
        .is_not_found());
        assert!(!Error::RpcTimeout.is_not_found());
    }
}
