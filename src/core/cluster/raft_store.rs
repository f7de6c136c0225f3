// src/core/cluster/raft_store.rs

//! In-memory combined `RaftStorage` (openraft v1 API) wrapping [`ClusterFsm`].
//!
//! Wrapped by `openraft::storage::Adaptor::new(store)` to produce the v2
//! `(RaftLogStorage, RaftStateMachine)` split required by `Raft::new`. The
//! Raft log itself lives only in memory — on restart a node rejoins and
//! catches up via snapshot/replication rather than replaying a local log —
//! but the state machine is mirrored to a bincode file on disk after every
//! batch of applies so a restarted node has a warm local cache to serve
//! reads from before it catches back up (operators
//! expect a freshly restarted node not to report an empty cluster).

use crate::core::cluster::commands::ClusterCommand;
use crate::core::cluster::fsm::ClusterFsm;
use crate::core::cluster::raft_types::{ClusterApplyResponse, NodeId, TypeConfig};
use openraft::storage::{Adaptor, RaftLogReader, RaftSnapshotBuilder, RaftStorage};
use openraft::{
    BasicNode, Entry, LogId, LogState, RaftLogId, Snapshot, SnapshotMeta, StorageError,
    StoredMembership, Vote,
};
use std::collections::BTreeMap;
use std::io::Cursor;
use std::ops::RangeBounds;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::warn;

/// Combined in-memory Raft log + state machine storage.
pub struct MemStorage {
    vote: Option<Vote<NodeId>>,
    log: BTreeMap<u64, Entry<TypeConfig>>,
    committed: Option<LogId<NodeId>>,
    last_purged: Option<LogId<NodeId>>,
    last_applied: Option<LogId<NodeId>>,
    last_membership: StoredMembership<NodeId, BasicNode>,
    pub fsm: ClusterFsm,
    snapshot: Option<Snapshot<TypeConfig>>,
    /// Republishes a fresh `ClusterFsm` snapshot after every applied batch
    /// so the server layer can serve reads without reaching into Raft's
    /// storage internals.
    fsm_mirror_tx: watch::Sender<Arc<ClusterFsm>>,
    cache_path: Option<PathBuf>,
}

impl MemStorage {
    pub fn new(
        event_ring_capacity: usize,
        cache_path: Option<PathBuf>,
    ) -> (Self, watch::Receiver<Arc<ClusterFsm>>) {
        let fsm = cache_path
            .as_ref()
            .and_then(|p| std::fs::read(p).ok())
            .and_then(|bytes| bincode::serde::decode_from_slice(&bytes, bincode::config::standard()).ok())
            .map(|(fsm, _): (ClusterFsm, usize)| fsm)
            .unwrap_or_else(|| ClusterFsm::new(event_ring_capacity));

        let (fsm_mirror_tx, fsm_mirror_rx) = watch::channel(Arc::new(fsm.clone()));

        let storage = Self {
            vote: None,
            log: BTreeMap::new(),
            committed: None,
            last_purged: None,
            last_applied: None,
            last_membership: StoredMembership::default(),
            fsm,
            snapshot: None,
            fsm_mirror_tx,
            cache_path,
        };
        (storage, fsm_mirror_rx)
    }

    fn flush_cache(&self) {
        let _ = self.fsm_mirror_tx.send(Arc::new(self.fsm.clone()));
        let Some(path) = &self.cache_path else { return };
        match bincode::serde::encode_to_vec(&self.fsm, bincode::config::standard()) {
            Ok(bytes) => {
                if let Err(e) = std::fs::write(path, bytes) {
                    warn!(error = %e, path = %path.display(), "failed to persist cluster FSM cache");
                }
            }
            Err(e) => warn!(error = %e, "failed to encode cluster FSM cache"),
        }
    }
}

impl RaftLogReader<TypeConfig> for MemStorage {
    async fn try_get_log_entries<RB>(
        &mut self,
        range: RB,
    ) -> Result<Vec<Entry<TypeConfig>>, StorageError<NodeId>>
    where
        RB: RangeBounds<u64> + Clone + std::fmt::Debug + Send,
    {
        Ok(self.log.range(range).map(|(_, e)| e.clone()).collect())
    }
}

pub struct MemLogReader {
    log: BTreeMap<u64, Entry<TypeConfig>>,
}

impl RaftLogReader<TypeConfig> for MemLogReader {
    async fn try_get_log_entries<RB>(
        &mut self,
        range: RB,
    ) -> Result<Vec<Entry<TypeConfig>>, StorageError<NodeId>>
    where
        RB: RangeBounds<u64> + Clone + std::fmt::Debug + Send,
    {
        Ok(self.log.range(range).map(|(_, e)| e.clone()).collect())
    }
}

pub struct MemSnapshotBuilder {
    last_applied: Option<LogId<NodeId>>,
    last_membership: StoredMembership<NodeId, BasicNode>,
    fsm: ClusterFsm,
}

impl RaftSnapshotBuilder<TypeConfig> for MemSnapshotBuilder {
    async fn build_snapshot(&mut self) -> Result<Snapshot<TypeConfig>, StorageError<NodeId>> {
        let data = bincode::serde::encode_to_vec(&self.fsm, bincode::config::standard())
            .unwrap_or_default();

        let snap_id = format!(
            "{}-{}",
            self.last_applied.map(|l| l.index).unwrap_or(0),
            self.last_applied.map(|l| l.leader_id.term).unwrap_or(0),
        );

        Ok(Snapshot {
            meta: SnapshotMeta {
                last_log_id: self.last_applied,
                last_membership: self.last_membership.clone(),
                snapshot_id: snap_id,
            },
            snapshot: Box::new(Cursor::new(data)),
        })
    }
}

impl RaftStorage<TypeConfig> for MemStorage {
    type LogReader = MemLogReader;
    type SnapshotBuilder = MemSnapshotBuilder;

    async fn save_vote(&mut self, vote: &Vote<NodeId>) -> Result<(), StorageError<NodeId>> {
        self.vote = Some(*vote);
        Ok(())
    }

    async fn read_vote(&mut self) -> Result<Option<Vote<NodeId>>, StorageError<NodeId>> {
        Ok(self.vote)
    }

    async fn get_log_state(&mut self) -> Result<LogState<TypeConfig>, StorageError<NodeId>> {
        let last = self.log.values().next_back().map(|e| *e.get_log_id());
        Ok(LogState {
            last_purged_log_id: self.last_purged,
            last_log_id: last,
        })
    }

    async fn save_committed(
        &mut self,
        committed: Option<LogId<NodeId>>,
    ) -> Result<(), StorageError<NodeId>> {
        self.committed = committed;
        Ok(())
    }

    async fn read_committed(&mut self) -> Result<Option<LogId<NodeId>>, StorageError<NodeId>> {
        Ok(self.committed)
    }

    async fn get_log_reader(&mut self) -> Self::LogReader {
        MemLogReader {
            log: self.log.clone(),
        }
    }

    async fn append_to_log<I>(&mut self, entries: I) -> Result<(), StorageError<NodeId>>
    where
        I: IntoIterator<Item = Entry<TypeConfig>> + Send,
    {
        for entry in entries {
            self.log.insert(entry.get_log_id().index, entry);
        }
        Ok(())
    }

    async fn delete_conflict_logs_since(
        &mut self,
        log_id: LogId<NodeId>,
    ) -> Result<(), StorageError<NodeId>> {
        self.log.retain(|&idx, _| idx < log_id.index);
        Ok(())
    }

    async fn purge_logs_upto(&mut self, log_id: LogId<NodeId>) -> Result<(), StorageError<NodeId>> {
        self.log.retain(|&idx, _| idx > log_id.index);
        self.last_purged = Some(log_id);
        Ok(())
    }

    async fn last_applied_state(
        &mut self,
    ) -> Result<(Option<LogId<NodeId>>, StoredMembership<NodeId, BasicNode>), StorageError<NodeId>>
    {
        Ok((self.last_applied, self.last_membership.clone()))
    }

    async fn apply_to_state_machine(
        &mut self,
        entries: &[Entry<TypeConfig>],
    ) -> Result<Vec<ClusterApplyResponse>, StorageError<NodeId>> {
        let mut responses = Vec::with_capacity(entries.len());

        for entry in entries {
            self.last_applied = Some(*entry.get_log_id());

            match &entry.payload {
                openraft::EntryPayload::Blank => {
                    responses.push(ClusterApplyResponse { applied: false });
                }
                openraft::EntryPayload::Normal(cmd) => {
                    let applied = self.fsm.apply(cmd);
                    responses.push(ClusterApplyResponse { applied });
                }
                openraft::EntryPayload::Membership(m) => {
                    self.last_membership =
                        StoredMembership::new(Some(*entry.get_log_id()), m.clone());
                    responses.push(ClusterApplyResponse { applied: false });
                }
            }
        }

        self.flush_cache();

        Ok(responses)
    }

    async fn get_snapshot_builder(&mut self) -> Self::SnapshotBuilder {
        MemSnapshotBuilder {
            last_applied: self.last_applied,
            last_membership: self.last_membership.clone(),
            fsm: self.fsm.clone(),
        }
    }

    async fn begin_receiving_snapshot(
        &mut self,
    ) -> Result<Box<Cursor<Vec<u8>>>, StorageError<NodeId>> {
        Ok(Box::new(Cursor::new(Vec::new())))
    }

    async fn install_snapshot(
        &mut self,
        meta: &SnapshotMeta<NodeId, BasicNode>,
        snapshot: Box<Cursor<Vec<u8>>>,
    ) -> Result<(), StorageError<NodeId>> {
        if let Ok((fsm, _)) = bincode::serde::decode_from_slice::<ClusterFsm, _>(
            snapshot.get_ref(),
            bincode::config::standard(),
        ) {
            self.fsm = fsm;
        }
        self.last_applied = meta.last_log_id;
        self.last_membership = meta.last_membership.clone();
        self.flush_cache();
        Ok(())
    }

    async fn get_current_snapshot(
        &mut self,
    ) -> Result<Option<Snapshot<TypeConfig>>, StorageError<NodeId>> {
        Ok(self.snapshot.clone())
    }
}

/// Splits a [`MemStorage`] into the `(RaftLogStorage, RaftStateMachine)` pair
/// `Raft::new` expects under the openraft v2 split-storage API.
pub fn adapt(
    storage: MemStorage,
) -> (
    openraft::storage::Adaptor<TypeConfig, MemStorage>,
    openraft::storage::Adaptor<TypeConfig, MemStorage>,
) {
    Adaptor::new(storage)
}
