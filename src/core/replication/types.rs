// src/core/replication/types.rs

//! Replication entities: transient task descriptors plus the run
//! report C4 hands back to C5/the HTTP layer.

use crate::core::backup::model::ReplicationMode;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReplicationTask {
    pub source_endpoint: String,
    pub target_endpoint: String,
    pub mode: ReplicationMode,
    pub runner_node: Uuid,
    pub base_snapshot: Option<String>,
    pub resume_token: Option<String>,
}

/// One line of the per-dataset event log a `Sync`/`Clone`/`Revert`/`Rotate`
/// run produces.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatasetRunOutcome {
    pub dataset: String,
    pub outcome: DatasetOutcome,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum DatasetOutcome {
    Success { new_snapshot_guid: String },
    Skipped { reason: String },
    Failed { reason: String },
}

/// A whole run's status is `success` iff every dataset either succeeded or
/// was intentionally skipped.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunReport {
    pub outcomes: Vec<DatasetRunOutcome>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|o| !matches!(o.outcome, DatasetOutcome::Failed { .. }))
    }

    pub fn total_moved_hint(&self) -> usize {
        self.outcomes.iter().filter(|o| matches!(o.outcome, DatasetOutcome::Success { .. })).count()
    }
}
