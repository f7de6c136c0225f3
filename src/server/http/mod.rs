// src/server/http/mod.rs

//! The HTTP surface: one axum router per resource group, an
//! envelope/error layer shared by all of them, and the Raft RPC routes
//! that never go through the router-forwarding middleware.

pub mod backup_handlers;
pub mod cluster_handlers;
pub mod console_ws;
pub mod envelope;
pub mod guest_handlers;
pub mod network_handlers;
pub mod raft_routes;
pub mod routes;
pub mod zfs_handlers;

pub use routes::build_router;
