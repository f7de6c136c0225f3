// src/server/initialization.rs

//! Brings a loaded [`Config`] up to a bound listener and running cluster
//! handle. Does NOT bootstrap or join a cluster itself -- that's an explicit
//! operator call through the cluster HTTP routes, mirroring the two-step
//! "start, then join-or-bootstrap" sequencing `ClusterHandle::start` already
//! assumes.

use super::context::{ServerContext, ServerState};
use super::listener::TlsOrTcpListener;
use crate::config::Config;
use crate::core::adapters::{HypervisorAdapter, JailAdapter, ZfsAdapter};
use crate::core::backup::scheduler::BackupScheduler;
use crate::core::cluster::ClusterHandle;
use crate::core::events::EventBus;
use crate::core::guest::GuestOrchestrator;
use crate::core::replication::ReplicationEngine;
use crate::core::router::RouterPools;
use anyhow::{anyhow, Result};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use sysinfo::System;
use tokio::net::TcpListener;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinSet;
use tokio_rustls::{rustls, TlsAcceptor};
use tracing::info;
use uuid::Uuid;

/// Builds every long-lived service and binds the listening socket, but
/// leaves the node outside any cluster until an operator bootstraps or
/// joins it through `/cluster/*`.
pub async fn setup(config: Config) -> Result<ServerContext> {
    info!(host = %config.host, port = config.port, "starting fleetd node");

    let acceptor = setup_tls(&config).await?;
    let listener_inner = TcpListener::bind((config.host.as_str(), config.port)).await?;
    info!("listening on {}:{}", config.host, config.port);
    let listener = TlsOrTcpListener::new(listener_inner, acceptor);

    std::fs::create_dir_all(&config.cluster.raft_dir)
        .map_err(|e| anyhow!("failed to create raft_dir '{}': {e}", config.cluster.raft_dir))?;
    let self_id = load_or_create_node_id(&config.cluster.raft_dir)?;
    let cache_path = Some(PathBuf::from(&config.cluster.raft_dir).join("fsm.cache"));

    let cluster = ClusterHandle::start(
        self_id,
        config.cluster.event_ring_capacity,
        cache_path,
        config.cluster.shared_secret.clone().into_bytes(),
        config.cluster.heartbeat_interval_ms,
        config.cluster.election_timeout_min_ms,
        config.cluster.election_timeout_max_ms,
    )
    .await
    .map_err(|e| anyhow!("failed to start cluster handle: {e}"))?;
    let cluster = Arc::new(cluster);
    info!(node_id = %self_id, "cluster handle started");

    let command_timeout = Duration::from_secs(config.adapters.command_timeout_secs);
    let zfs = Arc::new(ZfsAdapter::new(config.adapters.zfs_bin.clone(), command_timeout));
    let hypervisor = HypervisorAdapter::new(config.adapters.hypervisor_bin.clone(), command_timeout);
    let jail = JailAdapter::new(config.adapters.jail_bin.clone(), command_timeout);

    let host_logical_cores = detect_logical_cores();
    let guests = Arc::new(GuestOrchestrator::new(
        hypervisor,
        jail,
        config.adapters.pci_passthrough_devices.clone(),
        host_logical_cores,
    ));

    let replication = Arc::new(ReplicationEngine::new(zfs.clone()));
    let (backup_scheduler, backup_work_rx) = BackupScheduler::new(cluster.clone());
    let backup_scheduler = Arc::new(backup_scheduler);

    let pools = Arc::new(RouterPools::build());
    let events = EventBus::default();

    let state = Arc::new(ServerState {
        config: Mutex::new(config),
        cluster,
        guests,
        replication,
        zfs,
        backup_scheduler,
        pools,
        events,
    });

    let (shutdown_tx, _) = watch::channel(false);

    Ok(ServerContext {
        state,
        listener,
        shutdown_tx,
        background_tasks: JoinSet::new(),
        backup_work_rx,
    })
}

/// A node's Raft identity has to survive restarts, or every restart looks
/// like a brand-new peer to the rest of the cluster. Cached next to the
/// Raft log itself rather than in the TOML config, since it's derived state
/// (generated once on first boot), not something an operator sets.
fn load_or_create_node_id(raft_dir: &str) -> Result<Uuid> {
    let path = Path::new(raft_dir).join("node_id");
    if let Ok(raw) = std::fs::read_to_string(&path) {
        let trimmed = raw.trim();
        if let Ok(id) = Uuid::parse_str(trimmed) {
            return Ok(id);
        }
        return Err(anyhow!("'{}' does not contain a valid node id", path.display()));
    }
    let id = Uuid::new_v4();
    std::fs::write(&path, id.to_string())
        .map_err(|e| anyhow!("failed to persist node id to '{}': {e}", path.display()))?;
    Ok(id)
}

fn detect_logical_cores() -> u32 {
    let mut sys = System::new();
    sys.refresh_cpu_all();
    sys.cpus().len().max(1) as u32
}

async fn setup_tls(config: &Config) -> Result<Option<TlsAcceptor>> {
    if !config.tls.enabled {
        return Ok(None);
    }
    info!("TLS is enabled, loading certificate and key");
    let certs = load_certs(&config.tls.cert_path)?;
    let key = load_key(&config.tls.key_path)?;
    let server_config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)?;
    Ok(Some(TlsAcceptor::from(Arc::new(server_config))))
}

fn load_certs(path: &str) -> Result<Vec<rustls::pki_types::CertificateDer<'static>>> {
    let cert_file =
        File::open(path).map_err(|e| anyhow!("failed to open certificate file '{path}': {e}"))?;
    let mut cert_reader = BufReader::new(cert_file);
    let certs = rustls_pemfile::certs(&mut cert_reader).collect::<Result<Vec<_>, _>>()?;
    if certs.is_empty() {
        return Err(anyhow!("no certificates found in '{path}'"));
    }
    Ok(certs)
}

fn load_key(path: &str) -> Result<rustls::pki_types::PrivateKeyDer<'static>> {
    let key_file =
        File::open(path).map_err(|e| anyhow!("failed to open private key file '{path}': {e}"))?;
    let mut key_reader = BufReader::new(key_file);
    rustls_pemfile::private_key(&mut key_reader)?
        .ok_or_else(|| anyhow!("no private key found in '{path}'"))
}
