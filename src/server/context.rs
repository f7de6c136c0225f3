// src/server/context.rs

//! Process-wide state (design note: "global singletons... become
//! explicitly-passed services constructed by a root supervisor"). Every
//! HTTP handler reaches its dependencies through `Arc<ServerState>`; nothing
//! here is a lazy-static or thread-local.

use crate::config::Config;
use crate::core::adapters::ZfsAdapter;
use crate::core::backup::scheduler::{BackupScheduler, ScheduledRun};
use crate::core::cluster::ClusterHandle;
use crate::core::events::EventBus;
use crate::core::guest::GuestOrchestrator;
use crate::core::replication::ReplicationEngine;
use crate::core::router::RouterPools;
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinSet;

/// Every long-lived service the HTTP and background layers touch.
pub struct ServerState {
    pub config: Mutex<Config>,
    pub cluster: Arc<ClusterHandle>,
    pub guests: Arc<GuestOrchestrator>,
    pub replication: Arc<ReplicationEngine>,
    pub zfs: Arc<ZfsAdapter>,
    pub backup_scheduler: Arc<BackupScheduler>,
    pub pools: Arc<RouterPools>,
    pub events: EventBus,
}

/// Everything `initialization::setup` produces and `spawner`/the connection
/// loop consume to bring the node up.
pub struct ServerContext {
    pub state: Arc<ServerState>,
    pub listener: super::listener::TlsOrTcpListener,
    pub shutdown_tx: watch::Sender<bool>,
    pub background_tasks: JoinSet<anyhow::Result<()>>,
    pub backup_work_rx: mpsc::Receiver<ScheduledRun>,
}
