// src/server/http/guest_handlers.rs

//! VM and jail lifecycle routes.
//! Both kinds share one `GuestOrchestrator`, so the handlers here differ
//! only in which `GuestKind` they pass through to it.

use super::envelope::{respond, ApiError, ApiResult};
use crate::core::errors::FleetError;
use crate::core::guest::{Guest, GuestAction, GuestKind, GuestNetwork, GuestStorage, UsageSample};
use crate::server::context::ServerState;
use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Deserialize)]
pub struct CreateGuestRequest {
    pub guest: Guest,
    #[serde(default)]
    pub storages: Vec<GuestStorage>,
    #[serde(default)]
    pub networks: Vec<GuestNetwork>,
}

async fn create(state: Arc<ServerState>, kind: GuestKind, req: CreateGuestRequest) -> ApiResult<Guest> {
    if req.guest.kind != kind {
        return Err(ApiError(FleetError::Validation(format!(
            "guest.kind must be {kind:?} on this route"
        ))));
    }
    respond(
        state
            .guests
            .create_guest(req.guest, req.storages, req.networks)
            .await,
    )
}

pub async fn create_vm(State(state): State<Arc<ServerState>>, Json(req): Json<CreateGuestRequest>) -> ApiResult<Guest> {
    create(state, GuestKind::Vm, req).await
}

pub async fn create_jail(State(state): State<Arc<ServerState>>, Json(req): Json<CreateGuestRequest>) -> ApiResult<Guest> {
    create(state, GuestKind::Jail, req).await
}

pub async fn get(State(state): State<Arc<ServerState>>, Path(guest_id): Path<u32>) -> ApiResult<Guest> {
    respond(state.guests.get(guest_id).ok_or_else(|| FleetError::NotFound(format!("guest {guest_id}"))))
}

pub async fn list(State(state): State<Arc<ServerState>>) -> ApiResult<Vec<Guest>> {
    respond(Ok(state.guests.list()))
}

#[derive(Deserialize)]
pub struct EditGuestRequest {
    pub description: String,
}

pub async fn edit(
    State(state): State<Arc<ServerState>>,
    Path(guest_id): Path<u32>,
    Json(req): Json<EditGuestRequest>,
) -> ApiResult<Guest> {
    respond(state.guests.edit_guest(guest_id, req.description).await)
}

pub async fn delete(State(state): State<Arc<ServerState>>, Path(guest_id): Path<u32>) -> ApiResult<()> {
    respond(state.guests.delete_guest(guest_id).await)
}

#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionRequest {
    Start,
    Stop,
    Reboot,
    Shutdown,
}

impl From<ActionRequest> for GuestAction {
    fn from(a: ActionRequest) -> Self {
        match a {
            ActionRequest::Start => GuestAction::Start,
            ActionRequest::Stop => GuestAction::Stop,
            ActionRequest::Reboot => GuestAction::Reboot,
            ActionRequest::Shutdown => GuestAction::Shutdown,
        }
    }
}

#[derive(Deserialize)]
pub struct ActionBody {
    pub action: ActionRequest,
}

pub async fn action(
    State(state): State<Arc<ServerState>>,
    Path(guest_id): Path<u32>,
    Json(req): Json<ActionBody>,
) -> ApiResult<Guest> {
    respond(state.guests.perform_action(guest_id, req.action.into()).await)
}

#[derive(Deserialize)]
pub struct HardwareRequest {
    pub cpu: Option<u32>,
    pub ram_bytes: Option<u64>,
}

pub async fn modify_hardware(
    State(state): State<Arc<ServerState>>,
    Path(guest_id): Path<u32>,
    Json(req): Json<HardwareRequest>,
) -> ApiResult<Guest> {
    respond(state.guests.modify_hardware(guest_id, req.cpu, req.ram_bytes))
}

#[derive(Serialize)]
pub struct StatsResponse {
    pub samples: Vec<UsageSample>,
}

/// `GET /api/vm/:id/stats`: the last hour of the 5s usage-stats poller.
pub async fn stats(State(state): State<Arc<ServerState>>, Path(guest_id): Path<u32>) -> ApiResult<StatsResponse> {
    respond(Ok(StatsResponse { samples: state.guests.stats.samples(guest_id) }))
}
