// src/core/cluster/fsm.rs

//! The deterministic state machine replicated by Raft.
//!
//! Holds node membership, shared notes, backup targets/jobs, and a bounded
//! ring of backup events. `apply` is pure — no I/O, no subprocess spawns —
//! so it can be called identically on every node and twice on the same
//! node without divergence.

use crate::core::backup::model::{BackupEvent, BackupEventStatus, BackupJob, BackupTarget};
use crate::core::cluster::commands::{ClusterCommand, ClusterCommandKind, ClusterNote};
use crate::core::cluster::node::{Node, NodeStatus, NodeTable};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use uuid::Uuid;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterFsm {
    pub nodes: NodeTable,
    pub notes: BTreeMap<Uuid, ClusterNote>,
    pub backup_targets: BTreeMap<Uuid, BackupTarget>,
    pub backup_jobs: BTreeMap<Uuid, BackupJob>,
    /// Terminal events age out of this ring;
    /// `running` events are always retained regardless of ring position.
    events: VecDeque<BackupEvent>,
    events_by_id: BTreeMap<Uuid, usize>,
    event_ring_capacity: usize,
    /// Last applied `monotonic_seq` per issuer, used to dedupe re-applies of
    /// an already-committed command (idempotence, ).
    last_seq_by_issuer: BTreeMap<Uuid, u64>,
}

impl ClusterFsm {
    pub fn new(event_ring_capacity: usize) -> Self {
        Self {
            event_ring_capacity,
            ..Default::default()
        }
    }

    /// Applies a committed command. Returns `true` if it changed state (for
    /// callers that only want to publish on real transitions).
    pub fn apply(&mut self, command: &ClusterCommand) -> bool {
        let last_seq = self
            .last_seq_by_issuer
            .get(&command.issuer_node)
            .copied()
            .unwrap_or(0);
        if command.monotonic_seq <= last_seq && last_seq != 0 {
            // Already applied (or stale re-delivery); idempotent no-op.
            return false;
        }
        self.last_seq_by_issuer
            .insert(command.issuer_node, command.monotonic_seq);

        match &command.kind {
            ClusterCommandKind::NodeJoin(node) => {
                self.nodes.insert(node.clone());
            }
            ClusterCommandKind::NodeLeave { node_uuid } => {
                self.nodes.remove(node_uuid);
            }
            ClusterCommandKind::NodeStatus { node_uuid, status } => {
                self.nodes.set_status(node_uuid, *status);
            }

            ClusterCommandKind::NoteCreate(note) => {
                self.notes.insert(note.id, note.clone());
            }
            ClusterCommandKind::NoteUpdate { id, title, body, updated_at } => {
                if let Some(n) = self.notes.get_mut(id) {
                    n.title = title.clone();
                    n.body = body.clone();
                    n.updated_at = *updated_at;
                }
            }
            ClusterCommandKind::NoteDelete { id } => {
                self.notes.remove(id);
            }

            ClusterCommandKind::BackupTargetCreate(t) => {
                self.backup_targets.insert(t.id, t.clone());
            }
            ClusterCommandKind::BackupTargetUpdate(t) => {
                self.backup_targets.insert(t.id, t.clone());
            }
            ClusterCommandKind::BackupTargetDelete { id } => {
                self.backup_targets.remove(id);
            }
            ClusterCommandKind::BackupTargetValidate { id, validated_at, last_error } => {
                if let Some(t) = self.backup_targets.get_mut(id) {
                    t.validated_at = Some(*validated_at);
                    t.last_error = last_error.clone();
                }
            }

            ClusterCommandKind::BackupJobCreate(j) => {
                self.backup_jobs.insert(j.id, j.clone());
            }
            ClusterCommandKind::BackupJobUpdate(j) => {
                self.backup_jobs.insert(j.id, j.clone());
            }
            ClusterCommandKind::BackupJobDelete { id } => {
                self.backup_jobs.remove(id);
            }

            ClusterCommandKind::BackupEventStart { id, job_id, source_dataset, target_endpoint, mode, started_at } => {
                let event = BackupEvent::new_running(
                    *job_id,
                    source_dataset.clone(),
                    target_endpoint.clone(),
                    *mode,
                    *started_at,
                );
                let mut event = event;
                event.id = *id;
                self.push_event(event);
            }
            ClusterCommandKind::BackupEventProgress { id, moved_bytes, total_bytes } => {
                if let Some(event) = self.event_mut(id) {
                    // Invariant (Open Question): progress is
                    // monotonic non-decreasing, never regresses on replay.
                    event.moved_bytes = event.moved_bytes.max(*moved_bytes);
                    event.total_bytes = event.total_bytes.max(*total_bytes);
                }
            }
            ClusterCommandKind::BackupEventComplete { id, status, error_kind, completed_at, final_bytes } => {
                if let Some(event) = self.event_mut(id) {
                    // A terminal status is set once; a second
                    // completion for the same id (replay) is a no-op.
                    if !event.status.is_terminal() {
                        event.status = *status;
                        event.error_kind = error_kind.clone();
                        event.completed_at = Some(*completed_at);
                        event.moved_bytes = event.moved_bytes.max(*final_bytes);
                    }
                }
                self.prune_terminal_events();
            }
        }
        true
    }

    fn event_mut(&mut self, id: &Uuid) -> Option<&mut BackupEvent> {
        let idx = *self.events_by_id.get(id)?;
        self.events.get_mut(idx)
    }

    fn push_event(&mut self, event: BackupEvent) {
        self.events_by_id.insert(event.id, self.events.len());
        self.events.push_back(event);
        self.prune_terminal_events();
    }

    /// Drops the oldest *terminal* events once the ring exceeds capacity;
    /// `running` events are never dropped regardless of age.
    fn prune_terminal_events(&mut self) {
        while self.events.len() > self.event_ring_capacity {
            let oldest_terminal_idx = self
                .events
                .iter()
                .position(|e| e.status.is_terminal());
            match oldest_terminal_idx {
                Some(idx) => {
                    self.events.remove(idx);
                    self.rebuild_event_index();
                }
                None => break, // every remaining event is running; stop pruning
            }
        }
    }

    fn rebuild_event_index(&mut self) {
        self.events_by_id.clear();
        for (i, e) in self.events.iter().enumerate() {
            self.events_by_id.insert(e.id, i);
        }
    }

    pub fn running_events_for_job(&self, job_id: Uuid) -> Vec<&BackupEvent> {
        self.events
            .iter()
            .filter(|e| e.job_id == Some(job_id) && e.status == BackupEventStatus::Running)
            .collect()
    }

    pub fn event(&self, id: &Uuid) -> Option<&BackupEvent> {
        self.events_by_id.get(id).and_then(|&i| self.events.get(i))
    }

    pub fn events(&self) -> impl Iterator<Item = &BackupEvent> {
        self.events.iter()
    }

    pub fn node_status_snapshot(&self) -> Vec<(Uuid, NodeStatus)> {
        self.nodes.iter().map(|n| (n.node_uuid, n.status)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::backup::model::ReplicationMode;

    fn node(hostname: &str) -> Node {
        Node {
            node_uuid: Uuid::new_v4(),
            hostname: hostname.to_string(),
            api_endpoint: format!("{hostname}:7620"),
            status: NodeStatus::Online,
            raft_address: format!("{hostname}:7621"),
            last_heartbeat_ms: 0,
        }
    }

    #[test]
    fn apply_is_idempotent_on_replay() {
        let mut fsm = ClusterFsm::new(100);
        let issuer = Uuid::new_v4();
        let n = node("a");
        let cmd = ClusterCommand::new(issuer, 1, ClusterCommandKind::NodeJoin(n.clone()));

        fsm.apply(&cmd);
        let snapshot1 = format!("{:?}", fsm.nodes.iter().collect::<Vec<_>>());
        fsm.apply(&cmd); // replay the same committed command
        let snapshot2 = format!("{:?}", fsm.nodes.iter().collect::<Vec<_>>());

        assert_eq!(snapshot1, snapshot2);
        assert_eq!(fsm.nodes.len(), 1);
    }

    #[test]
    fn at_most_one_running_event_per_job() {
        let mut fsm = ClusterFsm::new(100);
        let issuer = Uuid::new_v4();
        let job_id = Uuid::new_v4();
        let event_id = Uuid::new_v4();

        fsm.apply(&ClusterCommand::new(
            issuer,
            1,
            ClusterCommandKind::BackupEventStart {
                id: event_id,
                job_id: Some(job_id),
                source_dataset: "tank/db".into(),
                target_endpoint: "backup@host:tank/db".into(),
                mode: ReplicationMode::Sync,
                started_at: 0,
            },
        ));
        assert_eq!(fsm.running_events_for_job(job_id).len(), 1);

        fsm.apply(&ClusterCommand::new(
            issuer,
            2,
            ClusterCommandKind::BackupEventComplete {
                id: event_id,
                status: BackupEventStatus::Success,
                error_kind: None,
                completed_at: 10,
                final_bytes: 1024,
            },
        ));
        assert_eq!(fsm.running_events_for_job(job_id).len(), 0);
        assert_eq!(fsm.event(&event_id).unwrap().status, BackupEventStatus::Success);
    }

    #[test]
    fn terminal_status_set_exactly_once() {
        let mut fsm = ClusterFsm::new(100);
        let issuer = Uuid::new_v4();
        let event_id = Uuid::new_v4();

        fsm.apply(&ClusterCommand::new(
            issuer,
            1,
            ClusterCommandKind::BackupEventStart {
                id: event_id,
                job_id: None,
                source_dataset: "tank/db".into(),
                target_endpoint: "backup@host:tank/db".into(),
                mode: ReplicationMode::Sync,
                started_at: 0,
            },
        ));
        fsm.apply(&ClusterCommand::new(
            issuer,
            2,
            ClusterCommandKind::BackupEventComplete {
                id: event_id,
                status: BackupEventStatus::Success,
                error_kind: None,
                completed_at: 5,
                final_bytes: 100,
            },
        ));
        // A later, conflicting completion must not override the first.
        fsm.apply(&ClusterCommand::new(
            issuer,
            3,
            ClusterCommandKind::BackupEventComplete {
                id: event_id,
                status: BackupEventStatus::Failed,
                error_kind: Some("send".into()),
                completed_at: 6,
                final_bytes: 50,
            },
        ));
        assert_eq!(fsm.event(&event_id).unwrap().status, BackupEventStatus::Success);
    }
}
