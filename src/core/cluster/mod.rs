// src/core/cluster/mod.rs

//! C1: Raft-replicated cluster state.
//!
//! [`ClusterHandle`] is the single entry point the rest of the process uses:
//! it owns the `openraft::Raft` instance, proposes commands on the leader
//! (or forwards detection to the caller so C2 can redirect), and exposes a
//! read-only mirror of the [`ClusterFsm`] for queries that don't need to go
//! through consensus.

pub mod commands;
pub mod fsm;
pub mod lifecycle;
pub mod node;
pub mod raft_network;
pub mod raft_store;
pub mod raft_types;
pub mod token;

pub use commands::{ClusterCommand, ClusterCommandKind, ClusterNote};
pub use fsm::ClusterFsm;
pub use node::{Node, NodeStatus, NodeTable};
pub use raft_types::{ClusterApplyResponse, NodeId, RaftInstance, TypeConfig};
pub use token::ClusterTokenIssuer;

use crate::core::errors::{FleetError, FleetResult};
use openraft::BasicNode;
use raft_store::MemStorage;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[derive(Clone)]
pub struct ClusterHandle {
    pub raft: Arc<RaftInstance>,
    pub self_id: NodeId,
    pub token_issuer: Arc<ClusterTokenIssuer>,
    fsm_mirror: watch::Receiver<Arc<ClusterFsm>>,
    /// Per-node monotonic counter backing each proposal's `monotonic_seq`
    ///`).
    next_seq: Arc<AtomicU64>,
}

impl ClusterHandle {
    /// Starts a fresh `openraft::Raft` instance over HTTP transport. Does
    /// NOT bootstrap or join a cluster — callers invoke [`lifecycle::bootstrap`]
    /// or send a join request afterward, per 's explicit two-step
    /// "start, then join-or-bootstrap" sequencing.
    pub async fn start(
        self_id: NodeId,
        event_ring_capacity: usize,
        cache_path: Option<PathBuf>,
        cluster_secret: Vec<u8>,
        heartbeat_interval_ms: u64,
        election_timeout_min_ms: u64,
        election_timeout_max_ms: u64,
    ) -> FleetResult<Self> {
        let (storage, fsm_mirror) = MemStorage::new(event_ring_capacity, cache_path);
        let (log_store, state_machine) = raft_store::adapt(storage);

        let config = Arc::new(
            openraft::Config {
                heartbeat_interval: heartbeat_interval_ms,
                election_timeout_min: election_timeout_min_ms,
                election_timeout_max: election_timeout_max_ms,
                ..Default::default()
            }
            .validate()
            .map_err(|e| FleetError::Internal(format!("invalid raft config: {e}")))?,
        );

        let raft = openraft::Raft::new(
            self_id,
            config,
            raft_network::HttpRaftNetworkFactory,
            log_store,
            state_machine,
        )
        .await
        .map_err(|e| FleetError::Internal(format!("failed to start raft instance: {e}")))?;

        Ok(Self {
            raft: Arc::new(raft),
            self_id,
            token_issuer: Arc::new(ClusterTokenIssuer::new(cluster_secret, self_id)),
            fsm_mirror,
            next_seq: Arc::new(AtomicU64::new(1)),
        })
    }

    pub fn is_leader(&self) -> bool {
        lifecycle::is_leader(&self.raft, self.self_id)
    }

    pub fn current_leader(&self) -> Option<NodeId> {
        lifecycle::current_leader_id(&self.raft)
    }

    /// The node's current Raft term, for the `RAFT_TERM` gauge.
    pub fn current_term(&self) -> u64 {
        self.raft.metrics().borrow().current_term
    }

    /// Returns the leader's `Node` entry, if known and present in the FSM's
    /// membership table.
    pub fn leader_node(&self) -> Option<Node> {
        let leader_id = self.current_leader()?;
        self.fsm_mirror.borrow().nodes.get(&leader_id).cloned()
    }

    /// A read-only snapshot of the replicated state machine. Cheap: it's an
    /// `Arc` clone of the last-applied mirror, not a fresh serialization.
    pub fn fsm(&self) -> Arc<ClusterFsm> {
        self.fsm_mirror.borrow().clone()
    }

    /// Proposes a command through consensus. Must only be called on the
    /// leader; callers check [`ClusterHandle::is_leader`] first and forward
    /// to the leader via C2 otherwise.
    pub async fn propose(&self, kind: ClusterCommandKind) -> FleetResult<ClusterApplyResponse> {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let cmd = ClusterCommand::new(self.self_id, seq, kind);
        let resp = self
            .raft
            .client_write(cmd)
            .await
            .map_err(|e| FleetError::Internal(format!("raft client_write failed: {e}")))?;
        Ok(resp.data)
    }

    pub async fn bootstrap(&self, self_node: &Node) -> FleetResult<()> {
        lifecycle::bootstrap(&self.raft, self_node).await
    }

    pub async fn accept_join(&self, joining_node: Node) -> FleetResult<()> {
        lifecycle::accept_join(&self.raft, joining_node).await
    }

    pub async fn remove_peer(&self, node_id: NodeId) -> FleetResult<()> {
        lifecycle::remove_peer(&self.raft, node_id).await
    }

    /// Peer address table as `{node_id: raft_address}`, used to seed a new
    /// `HttpRaftNetworkFactory` client or for diagnostics.
    pub fn peer_addresses(&self) -> BTreeMap<NodeId, BasicNode> {
        self.fsm_mirror
            .borrow()
            .nodes
            .iter()
            .map(|n| (n.node_uuid, BasicNode { addr: n.raft_address.clone() }))
            .collect()
    }
}

pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(500);
