// src/core/cluster/commands.rs

//! The command set: the only mutations that ever enter the Raft
//! log. Each command is a self-describing record `{kind, payload, issuer_node,
//! monotonic_seq}` — here modeled as an outer `ClusterCommand` envelope
//! wrapping a `ClusterCommandKind` payload enum, so the envelope fields are
//! shared by every variant instead of duplicated per-variant.

use crate::core::backup::model::{BackupEventStatus, BackupJob, BackupTarget, ReplicationMode};
use crate::core::cluster::node::{Node, NodeStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClusterNote {
    pub id: Uuid,
    pub title: String,
    pub body: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ClusterCommandKind {
    NodeJoin(Node),
    NodeLeave { node_uuid: Uuid },
    NodeStatus { node_uuid: Uuid, status: NodeStatus },

    NoteCreate(ClusterNote),
    NoteUpdate { id: Uuid, title: String, body: String, updated_at: i64 },
    NoteDelete { id: Uuid },

    BackupTargetCreate(BackupTarget),
    BackupTargetUpdate(BackupTarget),
    BackupTargetDelete { id: Uuid },
    BackupTargetValidate { id: Uuid, validated_at: i64, last_error: Option<String> },

    BackupJobCreate(BackupJob),
    BackupJobUpdate(BackupJob),
    BackupJobDelete { id: Uuid },

    BackupEventStart {
        id: Uuid,
        job_id: Option<Uuid>,
        source_dataset: String,
        target_endpoint: String,
        mode: ReplicationMode,
        started_at: i64,
    },
    BackupEventProgress {
        id: Uuid,
        moved_bytes: u64,
        total_bytes: u64,
    },
    BackupEventComplete {
        id: Uuid,
        status: BackupEventStatus,
        error_kind: Option<String>,
        completed_at: i64,
        final_bytes: u64,
    },
}

/// A replicated mutation proposed to C1. `monotonic_seq` is per-`issuer_node`
/// so the FSM can dedupe `(issuer_node, monotonic_seq)` pairs without a
/// globally agreed counter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClusterCommand {
    pub issuer_node: Uuid,
    pub monotonic_seq: u64,
    pub kind: ClusterCommandKind,
}

impl ClusterCommand {
    pub fn new(issuer_node: Uuid, monotonic_seq: u64, kind: ClusterCommandKind) -> Self {
        Self { issuer_node, monotonic_seq, kind }
    }

    /// A stable label for metrics (`CLUSTER_COMMANDS_APPLIED_TOTAL`).
    pub fn label(&self) -> &'static str {
        match &self.kind {
            ClusterCommandKind::NodeJoin(_) => "node_join",
            ClusterCommandKind::NodeLeave { .. } => "node_leave",
            ClusterCommandKind::NodeStatus { .. } => "node_status",
            ClusterCommandKind::NoteCreate(_) => "note_create",
            ClusterCommandKind::NoteUpdate { .. } => "note_update",
            ClusterCommandKind::NoteDelete { .. } => "note_delete",
            ClusterCommandKind::BackupTargetCreate(_) => "backup_target_create",
            ClusterCommandKind::BackupTargetUpdate(_) => "backup_target_update",
            ClusterCommandKind::BackupTargetDelete { .. } => "backup_target_delete",
            ClusterCommandKind::BackupTargetValidate { .. } => "backup_target_validate",
            ClusterCommandKind::BackupJobCreate(_) => "backup_job_create",
            ClusterCommandKind::BackupJobUpdate(_) => "backup_job_update",
            ClusterCommandKind::BackupJobDelete { .. } => "backup_job_delete",
            ClusterCommandKind::BackupEventStart { .. } => "backup_event_start",
            ClusterCommandKind::BackupEventProgress { .. } => "backup_event_progress",
            ClusterCommandKind::BackupEventComplete { .. } => "backup_event_complete",
        }
    }
}
