// src/core/cluster/raft_types.rs

//! openraft type configuration for the replicated cluster state machine (C1).
//!
//! Node identity is the node's own `Uuid` rather than a synthetic `u64`, so no
//! hash-derived ID mapping is needed between the membership table and Raft.

use crate::core::cluster::commands::ClusterCommand;
use openraft::{BasicNode, Entry, TokioRuntime};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClusterApplyResponse {
    pub applied: bool,
}

openraft::declare_raft_types!(
    pub TypeConfig:
        D            = ClusterCommand,
        R            = ClusterApplyResponse,
        NodeId       = Uuid,
        Node         = BasicNode,
        Entry        = Entry<TypeConfig>,
        SnapshotData = Cursor<Vec<u8>>,
        AsyncRuntime = TokioRuntime,
);

pub type NodeId = Uuid;
pub type RaftInstance = openraft::Raft<TypeConfig>;
