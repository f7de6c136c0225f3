// src/server/http/cluster_handlers.rs

//! Operator-facing membership routes.

use super::envelope::{respond, ApiError, ApiResult};
use crate::core::cluster::{ClusterCommandKind, Node, NodeStatus};
use crate::core::errors::FleetError;
use crate::server::context::ServerState;
use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Deserialize)]
pub struct BootstrapRequest {
    pub hostname: String,
    pub api_endpoint: String,
    pub raft_address: String,
}

/// `POST /api/cluster`: initializes a brand-new single-node cluster with
/// this node as the sole voter, then records itself in the FSM's node table.
pub async fn bootstrap(State(state): State<Arc<ServerState>>, Json(req): Json<BootstrapRequest>) -> ApiResult<Node> {
    let self_node = Node {
        node_uuid: state.cluster.self_id,
        hostname: req.hostname,
        api_endpoint: req.api_endpoint,
        status: NodeStatus::Online,
        raft_address: req.raft_address,
        last_heartbeat_ms: Utc::now().timestamp_millis(),
    };
    state.cluster.bootstrap(&self_node).await.map_err(ApiError::from)?;
    state
        .cluster
        .propose(ClusterCommandKind::NodeJoin(self_node.clone()))
        .await
        .map_err(ApiError::from)?;
    respond(Ok(self_node))
}

#[derive(Deserialize)]
pub struct JoinRequest {
    pub leader_api_endpoint: String,
    pub hostname: String,
    pub api_endpoint: String,
    pub raft_address: String,
}

/// `POST /api/cluster/join`: called on the *joining* node. Asks the named
/// leader to accept us, over the same skip-verify pool C2 uses for
/// intra-cluster hops.
pub async fn join(State(state): State<Arc<ServerState>>, Json(req): Json<JoinRequest>) -> ApiResult<Node> {
    let self_node = Node {
        node_uuid: state.cluster.self_id,
        hostname: req.hostname,
        api_endpoint: req.api_endpoint,
        status: NodeStatus::Joining,
        raft_address: req.raft_address,
        last_heartbeat_ms: Utc::now().timestamp_millis(),
    };

    let url = format!("{}/api/cluster/accept-join", req.leader_api_endpoint.trim_end_matches('/'));
    let resp = state
        .pools
        .skip_verify
        .post(&url)
        .json(&self_node)
        .send()
        .await
        .map_err(FleetError::from)
        .map_err(ApiError::from)?;

    if !resp.status().is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ApiError(FleetError::ForwardFailed {
            node: req.leader_api_endpoint,
            reason: body,
        }));
    }
    respond(Ok(self_node))
}

/// `POST /api/cluster/accept-join`: called on the *leader* by a joining
/// node. Adds it as a Raft learner then voter, and replicates a `NodeJoin`
/// so every node's FSM mirror sees the new member.
pub async fn accept_join(State(state): State<Arc<ServerState>>, Json(node): Json<Node>) -> ApiResult<Node> {
    state.cluster.accept_join(node.clone()).await.map_err(ApiError::from)?;
    let mut joined = node;
    joined.status = NodeStatus::Online;
    state
        .cluster
        .propose(ClusterCommandKind::NodeJoin(joined.clone()))
        .await
        .map_err(ApiError::from)?;
    respond(Ok(joined))
}

#[derive(Deserialize)]
pub struct RemovePeerRequest {
    pub node_uuid: Uuid,
}

/// `POST /api/cluster/remove-peer`: removes a Raft voter and replicates the
/// matching `NodeLeave` so the membership table stays in sync with
/// consensus.
pub async fn remove_peer(State(state): State<Arc<ServerState>>, Json(req): Json<RemovePeerRequest>) -> ApiResult<()> {
    state.cluster.remove_peer(req.node_uuid).await.map_err(ApiError::from)?;
    state
        .cluster
        .propose(ClusterCommandKind::NodeLeave { node_uuid: req.node_uuid })
        .await
        .map_err(ApiError::from)?;
    respond(Ok(()))
}

#[derive(Serialize)]
pub struct NodesResponse {
    pub nodes: Vec<Node>,
}

/// `GET /api/cluster/nodes`: a read-only snapshot, no consensus round-trip.
pub async fn nodes(State(state): State<Arc<ServerState>>) -> ApiResult<NodesResponse> {
    let fsm = state.cluster.fsm();
    let nodes = fsm.nodes.iter().cloned().collect();
    respond(Ok(NodesResponse { nodes }))
}

/// `DELETE /api/cluster/reset-node`: wipes this node's local Raft log and
/// cached FSM snapshot so a subsequent restart starts clean. Refuses while
/// this node is the leader, since that would strand the cluster without a
/// quorum source until the restart completes.
pub async fn reset_node(State(state): State<Arc<ServerState>>) -> ApiResult<String> {
    if state.cluster.is_leader() {
        return Err(ApiError(FleetError::InvalidState(
            "refusing to reset the current leader; remove it as a peer first".into(),
        )));
    }
    let raft_dir = state.config.lock().await.cluster.raft_dir.clone();
    let _ = std::fs::remove_file(std::path::Path::new(&raft_dir).join("node_id"));
    let _ = std::fs::remove_file(std::path::Path::new(&raft_dir).join("fsm.cache"));
    respond(Ok("local cluster state cleared; restart this node to rejoin as a fresh node".to_string()))
}
