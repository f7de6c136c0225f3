// src/server/http/zfs_handlers.rs

//! `/api/zfs/datasets/*` routes. Pool-level detail (`zpool`
//! status/iostat) has no adapter behind it — `ZfsAdapter` only wraps
//! dataset-level `zfs(8)` subcommands — so a "pool" here is just the
//! dataset rooted at the given name, listed via `list_descendants`.

use super::envelope::{respond, ApiResult};
use crate::core::adapters::zfs::{DatasetInfo, SnapshotInfo};
use crate::server::context::ServerState;
use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

pub async fn dataset_info(State(state): State<Arc<ServerState>>, Path(dataset): Path<String>) -> ApiResult<DatasetInfo> {
    respond(state.zfs.dataset_info(&dataset).await)
}

pub async fn list_children(State(state): State<Arc<ServerState>>, Path(dataset): Path<String>) -> ApiResult<Vec<String>> {
    respond(state.zfs.list_descendants(&dataset).await)
}

pub async fn list_snapshots(State(state): State<Arc<ServerState>>, Path(dataset): Path<String>) -> ApiResult<Vec<SnapshotInfo>> {
    respond(state.zfs.list_snapshots(&dataset).await)
}

#[derive(Deserialize)]
pub struct CreateSnapshotRequest {
    pub snap_name: String,
    #[serde(default)]
    pub recursive: bool,
}

pub async fn create_snapshot(
    State(state): State<Arc<ServerState>>,
    Path(dataset): Path<String>,
    Json(req): Json<CreateSnapshotRequest>,
) -> ApiResult<()> {
    respond(state.zfs.create_snapshot(&dataset, &req.snap_name, req.recursive).await)
}

#[derive(Deserialize)]
pub struct DestroyRequest {
    #[serde(default)]
    pub recursive: bool,
}

pub async fn destroy(
    State(state): State<Arc<ServerState>>,
    Path(target): Path<String>,
    Json(req): Json<DestroyRequest>,
) -> ApiResult<()> {
    respond(state.zfs.destroy(&target, req.recursive).await)
}

#[derive(Deserialize)]
pub struct RenameRequest {
    pub to: String,
}

pub async fn rename(
    State(state): State<Arc<ServerState>>,
    Path(from): Path<String>,
    Json(req): Json<RenameRequest>,
) -> ApiResult<()> {
    respond(state.zfs.rename(&from, &req.to).await)
}

#[derive(Deserialize)]
pub struct RollbackRequest {
    #[serde(default)]
    pub destroy_newer: bool,
}

pub async fn rollback(
    State(state): State<Arc<ServerState>>,
    Path(snapshot): Path<String>,
    Json(req): Json<RollbackRequest>,
) -> ApiResult<()> {
    respond(state.zfs.rollback(&snapshot, req.destroy_newer).await)
}
