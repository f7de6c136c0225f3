// src/core/cluster/node.rs

//! The `Node` entity and the in-memory table C2 reads to locate owners.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Online,
    Offline,
    Joining,
    Leaving,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    pub node_uuid: Uuid,
    pub hostname: String,
    pub api_endpoint: String,
    pub status: NodeStatus,
    pub raft_address: String,
    /// Millisecond UTC timestamp of the last heartbeat seen from this node.
    pub last_heartbeat_ms: i64,
}

/// The replicated membership table. Keyed by `node_uuid` (invariant: unique).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeTable {
    nodes: BTreeMap<Uuid, Node>,
}

impl NodeTable {
    pub fn insert(&mut self, node: Node) {
        self.nodes.insert(node.node_uuid, node);
    }

    pub fn remove(&mut self, node_uuid: &Uuid) -> Option<Node> {
        self.nodes.remove(node_uuid)
    }

    pub fn get(&self, node_uuid: &Uuid) -> Option<&Node> {
        self.nodes.get(node_uuid)
    }

    pub fn set_status(&mut self, node_uuid: &Uuid, status: NodeStatus) -> bool {
        if let Some(n) = self.nodes.get_mut(node_uuid) {
            n.status = status;
            true
        } else {
            false
        }
    }

    pub fn by_hostname(&self, hostname: &str) -> Option<&Node> {
        self.nodes.values().find(|n| n.hostname == hostname)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn contains(&self, node_uuid: &Uuid) -> bool {
        self.nodes.contains_key(node_uuid)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_node(hostname: &str) -> Node {
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
    fn lookup_by_hostname_finds_node() {
        let mut table = NodeTable::default();
        let a = sample_node("a");
        let a_id = a.node_uuid;
        table.insert(a);
        assert_eq!(table.by_hostname("a").unwrap().node_uuid, a_id);
        assert!(table.by_hostname("b").is_none());
    }

    #[test]
    fn remove_trims_peer_set() {
        let mut table = NodeTable::default();
        let a = sample_node("a");
        let id = a.node_uuid;
        table.insert(a);
        assert_eq!(table.len(), 1);
        table.remove(&id);
        assert!(table.is_empty());
    }
}
