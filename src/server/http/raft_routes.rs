// src/server/http/raft_routes.rs

//! `/raft/*` node-to-node RPC routes. These always reply
//! `200 OK` with a JSON `Result<Resp, String>` body, mirroring the contract
//! `HttpRaftNetwork::post` expects — the HTTP layer never fails a well-formed
//! Raft RPC, only the inner consensus call can.

use crate::core::cluster::raft_types::{NodeId, TypeConfig};
use crate::server::context::ServerState;
use axum::extract::State;
use axum::Json;
use openraft::raft::{
    AppendEntriesRequest, AppendEntriesResponse, InstallSnapshotRequest, InstallSnapshotResponse,
    VoteRequest, VoteResponse,
};
use std::sync::Arc;

pub async fn append_entries(
    State(state): State<Arc<ServerState>>,
    Json(rpc): Json<AppendEntriesRequest<TypeConfig>>,
) -> Json<Result<AppendEntriesResponse<NodeId>, String>> {
    Json(state.cluster.raft.append_entries(rpc).await.map_err(|e| e.to_string()))
}

pub async fn vote(
    State(state): State<Arc<ServerState>>,
    Json(rpc): Json<VoteRequest<NodeId>>,
) -> Json<Result<VoteResponse<NodeId>, String>> {
    Json(state.cluster.raft.vote(rpc).await.map_err(|e| e.to_string()))
}

pub async fn install_snapshot(
    State(state): State<Arc<ServerState>>,
    Json(rpc): Json<InstallSnapshotRequest<TypeConfig>>,
) -> Json<Result<InstallSnapshotResponse<NodeId>, String>> {
    Json(state.cluster.raft.install_snapshot(rpc).await.map_err(|e| e.to_string()))
}
