// src/server/http/network_handlers.rs

//! `/api/network/switch/*` routes. Only `Switch` has a grounded
//! model backing it; `object`/`dhcp` sub-resources named alongside it have
//! no corresponding entity and are out of scope here.

use super::envelope::{respond, ApiResult};
use crate::core::guest::Switch;
use crate::server::context::ServerState;
use axum::extract::{Path, State};
use axum::Json;
use std::sync::Arc;
use uuid::Uuid;

pub async fn list(State(state): State<Arc<ServerState>>) -> ApiResult<Vec<Switch>> {
    respond(Ok(state.guests.list_switches()))
}

pub async fn create(State(state): State<Arc<ServerState>>, Json(switch): Json<Switch>) -> ApiResult<Switch> {
    respond(state.guests.create_switch(switch))
}

pub async fn delete(State(state): State<Arc<ServerState>>, Path(switch_id): Path<Uuid>) -> ApiResult<()> {
    respond(state.guests.delete_switch(switch_id))
}
