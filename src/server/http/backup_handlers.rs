// src/server/http/backup_handlers.rs

//! Backup target/job/event routes. Writes go
//! through Raft (`ClusterCommandKind::BackupTarget*`/`BackupJob*`); reads
//! come straight off the local FSM mirror.

use super::envelope::{respond, ApiError, ApiResult};
use crate::core::backup::model::{BackupEvent, BackupJob, BackupTarget};
use crate::core::backup::schedule::JobSchedule;
use crate::core::backup::{restore, RestoreOptions};
use crate::core::cluster::ClusterCommandKind;
use crate::core::errors::FleetError;
use crate::server::context::ServerState;
use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

pub async fn list_targets(State(state): State<Arc<ServerState>>) -> ApiResult<Vec<BackupTarget>> {
    respond(Ok(state.cluster.fsm().backup_targets.values().cloned().collect()))
}

pub async fn create_target(State(state): State<Arc<ServerState>>, Json(target): Json<BackupTarget>) -> ApiResult<BackupTarget> {
    if state.cluster.fsm().backup_targets.contains_key(&target.id) {
        return Err(ApiError(FleetError::AlreadyExists(format!("backup target {}", target.id))));
    }
    state.cluster.propose(ClusterCommandKind::BackupTargetCreate(target.clone())).await.map_err(ApiError::from)?;
    respond(Ok(target))
}

pub async fn update_target(State(state): State<Arc<ServerState>>, Json(target): Json<BackupTarget>) -> ApiResult<BackupTarget> {
    if !state.cluster.fsm().backup_targets.contains_key(&target.id) {
        return Err(ApiError(FleetError::NotFound(format!("backup target {}", target.id))));
    }
    state.cluster.propose(ClusterCommandKind::BackupTargetUpdate(target.clone())).await.map_err(ApiError::from)?;
    respond(Ok(target))
}

pub async fn delete_target(State(state): State<Arc<ServerState>>, Path(id): Path<Uuid>) -> ApiResult<()> {
    if !state.cluster.fsm().backup_targets.contains_key(&id) {
        return Err(ApiError(FleetError::NotFound(format!("backup target {id}"))));
    }
    respond(state.cluster.propose(ClusterCommandKind::BackupTargetDelete { id }).await)
}

/// `POST /api/backup/targets/:id/validate`: probes the endpoint by listing
/// its dataset via the adapter, recording the outcome in the FSM either way.
pub async fn validate_target(State(state): State<Arc<ServerState>>, Path(id): Path<Uuid>) -> ApiResult<()> {
    let target = state
        .cluster
        .fsm()
        .backup_targets
        .get(&id)
        .cloned()
        .ok_or_else(|| FleetError::NotFound(format!("backup target {id}")))
        .map_err(ApiError::from)?;

    let (validated_at, last_error) = match state.zfs.dataset_info(&target.endpoint).await {
        Ok(_) => (Some(Utc::now().timestamp_millis()), None),
        Err(e) => (None, Some(e.to_string())),
    };
    respond(
        state
            .cluster
            .propose(ClusterCommandKind::BackupTargetValidate { id, validated_at: validated_at.unwrap_or(0), last_error })
            .await,
    )
}

pub async fn list_jobs(State(state): State<Arc<ServerState>>) -> ApiResult<Vec<BackupJob>> {
    respond(Ok(state.cluster.fsm().backup_jobs.values().cloned().collect()))
}

pub async fn create_job(State(state): State<Arc<ServerState>>, Json(job): Json<BackupJob>) -> ApiResult<BackupJob> {
    if state.cluster.fsm().backup_jobs.contains_key(&job.id) {
        return Err(ApiError(FleetError::AlreadyExists(format!("backup job {}", job.id))));
    }
    JobSchedule::parse(&job.schedule).map_err(ApiError::from)?;
    state.cluster.propose(ClusterCommandKind::BackupJobCreate(job.clone())).await.map_err(ApiError::from)?;
    respond(Ok(job))
}

pub async fn update_job(State(state): State<Arc<ServerState>>, Json(job): Json<BackupJob>) -> ApiResult<BackupJob> {
    if !state.cluster.fsm().backup_jobs.contains_key(&job.id) {
        return Err(ApiError(FleetError::NotFound(format!("backup job {}", job.id))));
    }
    JobSchedule::parse(&job.schedule).map_err(ApiError::from)?;
    state.cluster.propose(ClusterCommandKind::BackupJobUpdate(job.clone())).await.map_err(ApiError::from)?;
    respond(Ok(job))
}

pub async fn delete_job(State(state): State<Arc<ServerState>>, Path(id): Path<Uuid>) -> ApiResult<()> {
    if !state.cluster.fsm().backup_jobs.contains_key(&id) {
        return Err(ApiError(FleetError::NotFound(format!("backup job {id}"))));
    }
    respond(state.cluster.propose(ClusterCommandKind::BackupJobDelete { id }).await)
}

/// `POST /api/backup/jobs/:id/run`: queues an out-of-schedule run on the
/// scheduler's work channel, same path as a cron tick firing early.
pub async fn run_job(State(state): State<Arc<ServerState>>, Path(id): Path<Uuid>) -> ApiResult<()> {
    if !state.cluster.fsm().backup_jobs.contains_key(&id) {
        return Err(ApiError(FleetError::NotFound(format!("backup job {id}"))));
    }
    if state.backup_scheduler.run_now(id).await {
        respond(Ok(()))
    } else {
        Err(ApiError(FleetError::InvalidState("backup job is not enabled or scheduler queue is full".into())))
    }
}

#[derive(Deserialize)]
pub struct RestoreRequest {
    pub target_dataset: String,
    pub destination_dataset: String,
    pub snapshot: Option<String>,
    #[serde(default)]
    pub force: bool,
    #[serde(default)]
    pub with_intermediates: bool,
    #[serde(default)]
    pub rollback: bool,
}

pub async fn restore_dataset(State(state): State<Arc<ServerState>>, Json(req): Json<RestoreRequest>) -> ApiResult<u64> {
    let outcome = restore::restore(
        &state.zfs,
        &req.target_dataset,
        &req.destination_dataset,
        req.snapshot.as_deref(),
        RestoreOptions { force: req.force, with_intermediates: req.with_intermediates, rollback: req.rollback },
    )
    .await;
    respond(outcome.map(|o| o.moved_bytes))
}

pub async fn list_events(State(state): State<Arc<ServerState>>) -> ApiResult<Vec<BackupEvent>> {
    respond(Ok(state.cluster.fsm().events().cloned().collect()))
}

pub async fn get_event(State(state): State<Arc<ServerState>>, Path(id): Path<Uuid>) -> ApiResult<BackupEvent> {
    respond(state.cluster.fsm().event(&id).cloned().ok_or_else(|| FleetError::NotFound(format!("backup event {id}"))))
}

pub async fn event_progress(State(state): State<Arc<ServerState>>, Path(id): Path<Uuid>) -> ApiResult<BackupEvent> {
    get_event(State(state), Path(id)).await
}
