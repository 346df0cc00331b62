//! Caller-facing metadata cache
//!
//! `MetaCache` ties the three tables together and runs leader discovery.
//! Resolution prefers asking the copyset's own members ("who is
//! leader"), because elections complete there first; the metadata
//! service is the slow, authoritative fallback for when the cached
//! member list itself is stale. All table reads hand out snapshots and
//! no lock is held across an RPC.

use crate::chunk_table::ChunkTable;
use crate::copyset_table::{CopysetTable, UpdateLeaderOutcome};
use crate::mds::MdsClient;
use crate::member_index::MemberIndex;
use crate::probe::{LeaderProbe, LeaderReply};
use blockio_common::{
    ChunkId, ChunkIdInfo, ChunkIndex, ChunkServerId, CopysetId, CopysetInfo, CopysetKey, EndPoint,
    Error, MetaCacheConfig, PoolId, Result,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Log only every Nth ladder exhaustion; a flapping copyset would
/// otherwise flood the error log.
const RESOLVE_FAILURE_LOG_EVERY: u64 = 10;

/// What the group probe concluded for one ladder round
enum ProbeOutcome {
    /// A member answered and the cache recorded the leader
    Resolved(ChunkServerId, EndPoint),
    /// A member answered with an endpoint the cache cannot attribute to
    /// a known member yet
    Hint(EndPoint),
    /// No member answered within its deadline
    NoAnswer,
}

/// Client-side routing cache for chunks and copysets
///
/// One instance per client process, shared across request tasks. The
/// metadata service client and the leader probe are injected at init.
pub struct MetaCache {
    config: MetaCacheConfig,
    mds: Arc<dyn MdsClient>,
    probe: Arc<dyn LeaderProbe>,
    chunks: ChunkTable,
    copysets: CopysetTable,
    members: MemberIndex,
    resolve_failures: AtomicU64,
}

impl MetaCache {
    /// Create a cache with the given configuration and collaborators
    pub fn new(
        config: MetaCacheConfig,
        mds: Arc<dyn MdsClient>,
        probe: Arc<dyn LeaderProbe>,
    ) -> Self {
        info!(
            get_leader_retry = config.get_leader_retry,
            rpc_retry_interval_us = config.rpc_retry_interval_us,
            get_leader_rpc_timeout_ms = config.get_leader_rpc_timeout_ms,
            "metadata cache initialized"
        );
        Self {
            config,
            mds,
            probe,
            chunks: ChunkTable::new(),
            copysets: CopysetTable::new(),
            members: MemberIndex::new(),
            resolve_failures: AtomicU64::new(0),
        }
    }

    /// Identity of the chunk at the given file-relative position
    pub fn lookup_chunk(&self, index: ChunkIndex) -> Result<ChunkIdInfo> {
        self.chunks.lookup(index)
    }

    /// Install or overwrite the identity of the chunk at the given position
    pub fn upsert_chunk(&self, index: ChunkIndex, info: ChunkIdInfo) {
        self.chunks.upsert(index, info);
    }

    /// Chunk identity by stable chunk id
    pub fn lookup_chunk_by_id(&self, chunk_id: ChunkId) -> Option<ChunkIdInfo> {
        self.chunks.lookup_by_id(chunk_id)
    }

    /// Install or overwrite a chunk identity keyed by its stable id
    pub fn upsert_chunk_by_id(&self, chunk_id: ChunkId, info: ChunkIdInfo) {
        self.chunks.upsert_by_id(chunk_id, info);
    }

    /// Snapshot of a cached copyset
    pub fn get_copyset(&self, pool_id: PoolId, copyset_id: CopysetId) -> Option<CopysetInfo> {
        self.copysets.get(&CopysetKey::new(pool_id, copyset_id))
    }

    /// Install an authoritative copyset record and reconcile the member index
    pub fn put_copyset(&self, info: CopysetInfo) {
        self.copysets.put(info, &self.members);
    }

    /// Record a chunkserver-to-copyset participation learned out of band
    pub fn add_member_binding(
        &self,
        chunkserver_id: ChunkServerId,
        pool_id: PoolId,
        copyset_id: CopysetId,
    ) {
        self.members
            .add_binding(chunkserver_id, CopysetKey::new(pool_id, copyset_id));
    }

    /// Raise the applied-index watermark for a copyset
    pub fn update_applied_index(&self, pool_id: PoolId, copyset_id: CopysetId, applied_index: u64) {
        self.copysets
            .update_applied_index(&CopysetKey::new(pool_id, copyset_id), applied_index);
    }

    /// Applied-index watermark for a copyset, 0 when uncached
    pub fn applied_index(&self, pool_id: PoolId, copyset_id: CopysetId) -> u64 {
        self.copysets
            .applied_index(&CopysetKey::new(pool_id, copyset_id))
    }

    /// Whether the copyset's next leader read must refresh
    pub fn is_leader_may_change(&self, pool_id: PoolId, copyset_id: CopysetId) -> bool {
        self.copysets
            .is_leader_may_change(&CopysetKey::new(pool_id, copyset_id))
    }

    /// Record a leader learned from a "not leader, try X" redirect
    ///
    /// Memory-only; never issues an RPC. A redirect naming a member the
    /// cache has not heard of flags the entry so the next resolve runs
    /// the refresh ladder.
    pub fn update_leader(
        &self,
        pool_id: PoolId,
        copyset_id: CopysetId,
        leader: ChunkServerId,
        endpoint: EndPoint,
    ) {
        let key = CopysetKey::new(pool_id, copyset_id);
        match self.copysets.update_leader(&key, leader) {
            UpdateLeaderOutcome::Updated => {
                debug!(copyset = %key, leader = %leader, endpoint = %endpoint, "leader updated from redirect");
            }
            UpdateLeaderOutcome::UnknownMember => {
                debug!(copyset = %key, leader = %leader, endpoint = %endpoint, "redirect to unknown member");
                self.copysets.mark_unstable(&key);
            }
            UpdateLeaderOutcome::NotFound => {
                debug!(copyset = %key, "redirect for uncached copyset ignored");
            }
        }
    }

    /// Flag every copyset this chunkserver leads (or may lead) for refresh
    ///
    /// Copysets led by a different member are untouched. Members are not
    /// evicted.
    pub fn set_chunkserver_unstable(&self, chunkserver_id: ChunkServerId) {
        warn!(chunkserver = %chunkserver_id, "chunkserver reported unstable");
        // snapshot first: the member index lock must not be held while
        // touching the copyset table
        for key in self.members.copysets_of(chunkserver_id) {
            self.copysets.mark_unstable_if_led_by(&key, chunkserver_id);
        }
    }

    /// Flag every copyset led by any chunkserver on the given server
    ///
    /// Best-effort: a metadata service failure is logged and returned,
    /// and the cache stays usable with its current hints.
    pub async fn set_server_unstable(&self, server_ip: &str) -> Result<()> {
        warn!(server = server_ip, "server reported unstable");
        let ids = match self.mds.list_chunk_servers_in_server(server_ip).await {
            Ok(ids) => ids,
            Err(err) => {
                warn!(server = server_ip, error = %err, "listing chunkservers on unstable server failed");
                return Err(err);
            }
        };
        for id in ids {
            self.set_chunkserver_unstable(id);
        }
        Ok(())
    }

    /// Resolve the current leader of a copyset
    ///
    /// Serves from cache when the entry is trusted; otherwise runs the
    /// bounded refresh ladder: probe the members in order, fall back to
    /// the metadata service, sleep, repeat. Exhausting the budget
    /// returns [`Error::LeaderUnknown`] and leaves the entry flagged so
    /// the next call refreshes again.
    pub async fn resolve_leader(
        &self,
        pool_id: PoolId,
        copyset_id: CopysetId,
        force_refresh: bool,
    ) -> Result<(ChunkServerId, EndPoint)> {
        let key = CopysetKey::new(pool_id, copyset_id);
        let mut info = self.copysets.get(&key).ok_or(Error::NoSuchCopyset {
            pool_id,
            copyset_id,
        })?;

        if !force_refresh && !info.leader_unstable {
            if let Some(leader) = info.leader() {
                return Ok((leader.chunkserver_id, leader.endpoint));
            }
        }

        let mut attempts = 0;
        while attempts < self.config.get_leader_retry {
            attempts += 1;

            let hint = match self.probe_and_update(&key, &info).await? {
                ProbeOutcome::Resolved(id, endpoint) => return Ok((id, endpoint)),
                ProbeOutcome::Hint(endpoint) => Some(endpoint),
                ProbeOutcome::NoAnswer => None,
            };

            info!(
                copyset = %key,
                "leader probe unresolved, refreshing copyset from metadata service"
            );

            match self.refresh_from_mds(&key, hint).await {
                Ok(Some((id, endpoint))) => return Ok((id, endpoint)),
                Ok(None) => {
                    // fresh member list installed; probe again right away
                    info = self.copysets.get(&key).ok_or(Error::NoSuchCopyset {
                        pool_id,
                        copyset_id,
                    })?;
                    continue;
                }
                Err(err) => {
                    warn!(copyset = %key, error = %err, "copyset refresh from metadata service failed");
                    // the refresh may have installed a new record before
                    // failing; the next round must probe the current list
                    info = self.copysets.get(&key).ok_or(Error::NoSuchCopyset {
                        pool_id,
                        copyset_id,
                    })?;
                }
            }

            tokio::time::sleep(self.config.retry_interval()).await;
        }

        self.copysets.mark_unstable(&key);
        let failures = self.resolve_failures.fetch_add(1, Ordering::Relaxed);
        if failures % RESOLVE_FAILURE_LOG_EVERY == 0 {
            error!(copyset = %key, attempts, "get leader failed after retry");
        }
        Err(Error::LeaderUnknown {
            pool_id,
            copyset_id,
            attempts,
        })
    }

    /// One round of the group probe, applying whatever it learned
    async fn probe_and_update(&self, key: &CopysetKey, info: &CopysetInfo) -> Result<ProbeOutcome> {
        let Some(reply) = self.probe_group(key, info).await else {
            return Ok(ProbeOutcome::NoAnswer);
        };
        match reply.chunkserver_id {
            Some(id) => match self.copysets.update_leader(key, id) {
                UpdateLeaderOutcome::Updated => Ok(ProbeOutcome::Resolved(id, reply.endpoint)),
                UpdateLeaderOutcome::UnknownMember => Ok(ProbeOutcome::Hint(reply.endpoint)),
                UpdateLeaderOutcome::NotFound => Err(Error::NoSuchCopyset {
                    pool_id: key.pool_id,
                    copyset_id: key.copyset_id,
                }),
            },
            None => Ok(ProbeOutcome::Hint(reply.endpoint)),
        }
    }

    /// Ask the members, starting at the last known leader and wrapping,
    /// until one answers within its deadline
    async fn probe_group(&self, key: &CopysetKey, info: &CopysetInfo) -> Option<LeaderReply> {
        let total = info.members.len();
        if total == 0 {
            return None;
        }
        let start = info.current_leader_index.unwrap_or(0).min(total - 1);
        for offset in 0..total {
            let member = &info.members[(start + offset) % total];
            match tokio::time::timeout(
                self.config.probe_timeout(),
                self.probe.get_leader(key, member),
            )
            .await
            {
                Ok(Ok(reply)) => return Some(reply),
                Ok(Err(err)) => {
                    debug!(copyset = %key, member = %member.chunkserver_id, error = %err, "leader probe failed");
                }
                Err(_) => {
                    debug!(copyset = %key, member = %member.chunkserver_id, "leader probe timed out");
                }
            }
        }
        None
    }

    /// Pull the authoritative record, install it, and confirm a hinted
    /// leader endpoint against it when one was carried over
    ///
    /// `Ok(Some(..))` means the hint was confirmed and recorded;
    /// `Ok(None)` means the record was installed but the leader is still
    /// undecided. An empty reply counts as a metadata service failure.
    async fn refresh_from_mds(
        &self,
        key: &CopysetKey,
        hint: Option<EndPoint>,
    ) -> Result<Option<(ChunkServerId, EndPoint)>> {
        let list = self
            .mds
            .get_server_list(key.pool_id, &[key.copyset_id])
            .await?;
        let Some(refreshed) = list.into_iter().find(|c| c.key() == *key) else {
            return Err(Error::metadata_service(format!(
                "metadata service returned no record for copyset {key}"
            )));
        };

        let confirm = hint.filter(|endpoint| refreshed.has_member_endpoint(endpoint));
        self.copysets.put(refreshed, &self.members);

        if let Some(endpoint) = confirm {
            let id = self.mds.get_chunk_server_id(&endpoint).await?;
            if self.copysets.update_leader(key, id) == UpdateLeaderOutcome::Updated {
                debug!(copyset = %key, leader = %id, "leader confirmed via metadata service");
                return Ok(Some((id, endpoint)));
            }
        }
        Ok(None)
    }
}
