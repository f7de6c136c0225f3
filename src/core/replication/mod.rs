// src/core/replication/mod.rs

//! C4: ZFS-level replication primitives — Match, Sync, Clone,
//! Revert, Rotate, and retention, all serialized per-dataset by guid.

pub mod clone;
pub mod locks;
pub mod match_engine;
pub mod retention;
pub mod revert;
pub mod rotate;
pub mod sync;
pub mod types;

use crate::core::adapters::zfs::ZfsAdapter;
use crate::core::errors::FleetResult;
use locks::DatasetLockTable;
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;
use types::RunReport;

/// Ties the pure matching logic and the locking table to a concrete ZFS
/// adapter; this is what C5's backup runner and the HTTP handlers hold.
pub struct ReplicationEngine {
    zfs: Arc<ZfsAdapter>,
    locks: DatasetLockTable,
}

impl ReplicationEngine {
    pub fn new(zfs: Arc<ZfsAdapter>) -> Self {
        Self { zfs, locks: DatasetLockTable::new() }
    }

    /// Acquires the per-dataset sync lock directly, for the backup runner,
    /// which drives the send/receive transfer itself (progress events,
    /// cancellation, bandwidth throttling) instead of going through a
    /// one-shot engine method.
    pub async fn lock_for_sync(&self, source_dataset: &str) -> OwnedMutexGuard<()> {
        self.locks.acquire_one(source_dataset).await
    }

    pub async fn clone_tree(&self, source_root: &str, destination_root: &str) -> FleetResult<RunReport> {
        let _guard = self.locks.acquire_one(source_root).await;
        clone::clone_tree(&self.zfs, source_root, destination_root).await
    }

    pub async fn revert(&self, source_root: &str, snapshot_name: &str) -> FleetResult<revert::RevertOutcome> {
        let _guard = self.locks.acquire_one(source_root).await;
        revert::revert_tree(&self.zfs, source_root, snapshot_name).await
    }

    pub async fn rotate(&self, target_dataset: &str) -> FleetResult<rotate::RotateOutcome> {
        let _guard = self.locks.acquire_one(target_dataset).await;
        rotate::rotate_replica(&self.zfs, target_dataset).await
    }

    pub async fn apply_retention(&self, dataset: &str, prefix: &str, retain: u32, protected_guid: Option<&str>) -> FleetResult<u32> {
        let _guard = self.locks.acquire_one(dataset).await;
        retention::apply_retention(&self.zfs, dataset, prefix, retain, protected_guid).await
    }
}
