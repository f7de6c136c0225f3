// src/core/cluster/lifecycle.rs

//! Bootstrap, join, accept-join, reset and remove-peer.
//!
//! These are the operator-facing membership operations layered on top of
//! the raw `openraft::Raft` handle; everything else (note/backup-target/job
//! CRUD) goes through `ClusterHandle::propose` directly.

use crate::core::cluster::node::Node;
use crate::core::cluster::raft_types::{NodeId, RaftInstance};
use crate::core::errors::{FleetError, FleetResult};
use openraft::BasicNode;
use std::collections::BTreeMap;
use tracing::info;

/// Initializes a brand-new single-node cluster with `self_node` as the sole
/// voter. Fails if the Raft log already has committed entries.
pub async fn bootstrap(raft: &RaftInstance, self_node: &Node) -> FleetResult<()> {
    let mut members: BTreeMap<NodeId, BasicNode> = BTreeMap::new();
    members.insert(
        self_node.node_uuid,
        BasicNode { addr: self_node.raft_address.clone() },
    );
    raft.initialize(members).await.map_err(|e| {
        FleetError::Internal(format!("cluster bootstrap failed: {e}"))
    })?;
    info!(node = %self_node.node_uuid, "cluster bootstrapped as single-node");
    Ok(())
}

/// Called on the *joining* node: contacts `leader_api_endpoint`'s accept-join
/// route over HTTP so the leader can add us as a learner and then a voter.
/// The HTTP call itself lives in the router/http layer; this just wraps the
/// two-phase handshake the leader performs once asked (see [`accept_join`]).
pub async fn accept_join(raft: &RaftInstance, joining_node: Node) -> FleetResult<()> {
    let node_id = joining_node.node_uuid;
    let basic = BasicNode { addr: joining_node.raft_address.clone() };

    raft.add_learner(node_id, basic, true).await.map_err(|e| {
        FleetError::Internal(format!("add_learner failed for {node_id}: {e}"))
    })?;

    let metrics = raft.metrics().borrow().clone();
    let mut voters: std::collections::BTreeSet<NodeId> = metrics
        .membership_config
        .membership()
        .voter_ids()
        .collect();
    voters.insert(node_id);

    raft.change_membership(voters, false).await.map_err(|e| {
        FleetError::Internal(format!("change_membership failed promoting {node_id}: {e}"))
    })?;

    info!(node = %node_id, "accepted peer into cluster membership");
    Ok(())
}

/// Removes a peer from voting membership. The
/// caller is responsible for also emitting a `NodeLeave` command so the FSM
/// drops the node from the membership table; this only touches Raft voters.
pub async fn remove_peer(raft: &RaftInstance, node_id: NodeId) -> FleetResult<()> {
    let metrics = raft.metrics().borrow().clone();
    let voters: std::collections::BTreeSet<NodeId> = metrics
        .membership_config
        .membership()
        .voter_ids()
        .filter(|id| *id != node_id)
        .collect();

    if voters.is_empty() {
        return Err(FleetError::Validation(
            "refusing to remove the last voter in the cluster".into(),
        ));
    }

    raft.change_membership(voters, false).await.map_err(|e| {
        FleetError::Internal(format!("change_membership failed removing {node_id}: {e}"))
    })?;
    info!(node = %node_id, "removed peer from cluster membership");
    Ok(())
}

/// Returns whether `raft` currently believes itself the leader.
pub fn is_leader(raft: &RaftInstance, self_id: NodeId) -> bool {
    raft.metrics().borrow().current_leader == Some(self_id)
}

/// Resolves the current leader's `Node` entry from the membership table,
/// used by C2 to forward a write that landed on a follower.
pub fn current_leader_id(raft: &RaftInstance) -> Option<NodeId> {
    raft.metrics().borrow().current_leader
}
