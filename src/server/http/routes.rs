// src/server/http/routes.rs

//! Assembles the full HTTP router. Every `/api/*` route passes
//! through [`route_or_forward`] first, so a write aimed at a non-leader
//! node gets proxied to the current leader before any handler runs;
//! `/raft/*` is mounted outside that layer since it IS the consensus
//! transport.

use super::{backup_handlers, cluster_handlers, console_ws, guest_handlers, network_handlers, raft_routes, zfs_handlers};
use crate::core::router::{route_or_forward, RoutingState};
use crate::server::context::ServerState;
use axum::middleware;
use axum::routing::{delete, get, patch, post};
use axum::Router;
use std::sync::Arc;

pub fn build_router(state: Arc<ServerState>) -> Router {
    let routing_state = RoutingState { cluster: state.cluster.clone(), pools: state.pools.clone() };

    let api = Router::new()
        .route("/api/cluster", post(cluster_handlers::bootstrap))
        .route("/api/cluster/join", post(cluster_handlers::join))
        .route("/api/cluster/accept-join", post(cluster_handlers::accept_join))
        .route("/api/cluster/remove-peer", post(cluster_handlers::remove_peer))
        .route("/api/cluster/nodes", get(cluster_handlers::nodes))
        .route("/api/cluster/reset-node", delete(cluster_handlers::reset_node))
        .route("/api/vm", post(guest_handlers::create_vm).get(guest_handlers::list))
        .route("/api/vm/:id", get(guest_handlers::get).patch(guest_handlers::edit).delete(guest_handlers::delete))
        .route("/api/vm/:id/action", post(guest_handlers::action))
        .route("/api/vm/:id/hardware", patch(guest_handlers::modify_hardware))
        .route("/api/vm/:id/stats", get(guest_handlers::stats))
        .route("/api/vm/:id/console", get(console_ws::console))
        .route("/api/jail", post(guest_handlers::create_jail).get(guest_handlers::list))
        .route("/api/jail/:id", get(guest_handlers::get).patch(guest_handlers::edit).delete(guest_handlers::delete))
        .route("/api/jail/:id/action", post(guest_handlers::action))
        .route("/api/jail/:id/hardware", patch(guest_handlers::modify_hardware))
        .route("/api/jail/:id/console", get(console_ws::console))
        .route("/api/network/switch", get(network_handlers::list).post(network_handlers::create))
        .route("/api/network/switch/:id", delete(network_handlers::delete))
        .route(
            "/api/zfs/datasets/:dataset",
            get(zfs_handlers::dataset_info).patch(zfs_handlers::rename).delete(zfs_handlers::destroy),
        )
        .route("/api/zfs/datasets/:dataset/children", get(zfs_handlers::list_children))
        .route(
            "/api/zfs/datasets/:dataset/snapshots",
            get(zfs_handlers::list_snapshots).post(zfs_handlers::create_snapshot),
        )
        .route("/api/zfs/snapshots/:snapshot/rollback", post(zfs_handlers::rollback))
        .route(
            "/api/backup/targets",
            get(backup_handlers::list_targets).post(backup_handlers::create_target).patch(backup_handlers::update_target),
        )
        .route("/api/backup/targets/:id", delete(backup_handlers::delete_target))
        .route("/api/backup/targets/:id/validate", post(backup_handlers::validate_target))
        .route(
            "/api/backup/jobs",
            get(backup_handlers::list_jobs).post(backup_handlers::create_job).patch(backup_handlers::update_job),
        )
        .route("/api/backup/jobs/:id", delete(backup_handlers::delete_job))
        .route("/api/backup/jobs/:id/run", post(backup_handlers::run_job))
        .route("/api/backup/restore", post(backup_handlers::restore_dataset))
        .route("/api/backup/events", get(backup_handlers::list_events))
        .route("/api/backup/events/:id", get(backup_handlers::get_event))
        .route("/api/backup/events/:id/progress", get(backup_handlers::event_progress))
        .layer(middleware::from_fn_with_state(routing_state, route_or_forward));

    let raft = Router::new()
        .route("/raft/append-entries", post(raft_routes::append_entries))
        .route("/raft/vote", post(raft_routes::vote))
        .route("/raft/install-snapshot", post(raft_routes::install_snapshot));

    Router::new().merge(api).merge(raft).with_state(state)
}
