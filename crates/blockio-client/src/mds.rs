//! Metadata service client interface
//!
//! The cache consults the metadata service as its authoritative fallback
//! when the copyset itself cannot answer. The transport lives behind
//! this trait; the cache only sees decoded structs.

use async_trait::async_trait;
use blockio_common::{ChunkServerId, CopysetId, CopysetInfo, EndPoint, PoolId, Result};

/// Client view of the central metadata service
///
/// Implementations must be safe to share across concurrent request
/// tasks.
#[async_trait]
pub trait MdsClient: Send + Sync {
    /// Fetch the authoritative routing records for the given copysets
    async fn get_server_list(
        &self,
        pool_id: PoolId,
        copyset_ids: &[CopysetId],
    ) -> Result<Vec<CopysetInfo>>;

    /// Translate a replica endpoint into its chunkserver id
    async fn get_chunk_server_id(&self, endpoint: &EndPoint) -> Result<ChunkServerId>;

    /// List the chunkservers hosted on the server with the given ip
    async fn list_chunk_servers_in_server(&self, server_ip: &str) -> Result<Vec<ChunkServerId>>;
}
