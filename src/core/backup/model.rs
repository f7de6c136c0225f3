// src/core/backup/model.rs

//! Entities for the backup orchestrator (C5).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReplicationMode {
    Sync,
    Clone,
    Revert,
    Rotate,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackupTarget {
    pub id: Uuid,
    pub name: String,
    /// `user@host:dataset` style endpoint; credentials live at the OS level.
    pub endpoint: String,
    pub enabled: bool,
    pub validated_at: Option<i64>,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetentionPolicy {
    pub retain: u32,
    pub prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackupJob {
    pub id: Uuid,
    pub name: String,
    pub target_id: Uuid,
    pub source_dataset: String,
    /// Cron-like schedule expression, validated at create time.
    pub schedule: String,
    pub mode: ReplicationMode,
    pub bandwidth_limit_bytes_per_sec: Option<u64>,
    pub retention_policy: RetentionPolicy,
    pub enabled: bool,
    /// Node that should run this job; `None` means "the leader".
    pub runner_node: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BackupEventStatus {
    Running,
    Success,
    Failed,
    Interrupted,
}

impl BackupEventStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, BackupEventStatus::Running)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackupEvent {
    pub id: Uuid,
    pub job_id: Option<Uuid>,
    pub source_dataset: String,
    pub target_endpoint: String,
    pub mode: ReplicationMode,
    pub status: BackupEventStatus,
    pub started_at: i64,
    pub completed_at: Option<i64>,
    pub moved_bytes: u64,
    pub total_bytes: u64,
    pub error_kind: Option<String>,
}

impl BackupEvent {
    pub fn new_running(job_id: Option<Uuid>, source_dataset: String, target_endpoint: String, mode: ReplicationMode, started_at: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_id,
            source_dataset,
            target_endpoint,
            mode,
            status: BackupEventStatus::Running,
            started_at,
            completed_at: None,
            moved_bytes: 0,
            total_bytes: 0,
            error_kind: None,
        }
    }
}
