//! Blockio Client - Metadata cache
//!
//! This crate keeps the client-side routing table of the blockio block
//! store: which copyset serves a chunk, which replica currently leads
//! that copyset, and where that leader listens. Lookups are served from
//! memory; entries are refreshed on demand and flagged stale when
//! redirects, timeouts or unstable-node reports suggest the leader has
//! moved.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  Request path   │  (per-chunk read/write)
//! └────────┬────────┘
//!          │
//! ┌────────▼────────┐
//! │    MetaCache    │
//! │  - ChunkTable   │  chunk position → chunk identity
//! │  - CopysetTable │  (pool, copyset) → members + leader hint
//! │  - MemberIndex  │  chunkserver → copysets (mass invalidation)
//! └────┬───────┬────┘
//!      │       │
//! ┌────▼───┐ ┌─▼───────────┐
//! │ Copyset│ │  Metadata   │
//! │ peers  │ │  service    │  (authoritative fallback)
//! └────────┘ └─────────────┘
//! ```
//!
//! The cache is an optimistic hint store: a stale answer is detectable
//! by the caller (redirect, connection failure) and healable by the next
//! resolve. No lock is ever held across an RPC.

pub mod cache;
pub mod chunk_table;
pub mod copyset_table;
pub mod mds;
pub mod member_index;
pub mod probe;

pub use cache::MetaCache;
pub use chunk_table::ChunkTable;
pub use copyset_table::{CopysetTable, UpdateLeaderOutcome};
pub use mds::MdsClient;
pub use member_index::MemberIndex;
pub use probe::{LeaderProbe, LeaderReply};
