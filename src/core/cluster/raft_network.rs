// src/core/cluster/raft_network.rs

//! HTTP transport for openraft RPCs.
//!
//! Unlike the gRPC transport some clusters use, this node-to-node hop rides
//! the same `reqwest` + `axum` stack the router (C2) already uses for user
//! traffic, POSTing JSON bodies to `/raft/append-entries`, `/raft/vote`, and
//! `/raft/install-snapshot` on the target's `raft_address`. Each peer gets
//! its own short-lived client built from the skip-verify pool (intra-cluster
//! hops trust the cluster membership list, not the TLS chain, per C2).

use crate::core::cluster::raft_types::{NodeId, TypeConfig};
use openraft::error::{InstallSnapshotError, RPCError, RaftError, Unreachable};
use openraft::network::{RPCOption, RaftNetwork, RaftNetworkFactory};
use openraft::raft::{
    AppendEntriesRequest, AppendEntriesResponse, InstallSnapshotRequest, InstallSnapshotResponse,
    VoteRequest, VoteResponse,
};
use openraft::{AnyError, BasicNode};
use reqwest::Client;
use std::time::Duration;

fn unreachable_err(msg: impl std::fmt::Display) -> Unreachable {
    Unreachable::new(&AnyError::error(msg.to_string()))
}

pub struct HttpRaftNetwork {
    base_url: String,
    client: Client,
}

impl HttpRaftNetwork {
    /// The server side (`server::http::routes::raft_*`) always replies with
    /// `Result<Resp, String>` JSON, whether the inner `raft.*` call
    /// succeeded or not, so a structured failure is distinguishable from a
    /// transport failure instead of a failed JSON parse.
    async fn post<Req: serde::Serialize, Resp: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &Req,
    ) -> Result<Resp, String> {
        let resp = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        let parsed: Result<Resp, String> = resp.json().await.map_err(|e| e.to_string())?;
        parsed
    }
}

impl RaftNetwork<TypeConfig> for HttpRaftNetwork {
    async fn append_entries(
        &mut self,
        rpc: AppendEntriesRequest<TypeConfig>,
        _option: RPCOption,
    ) -> Result<AppendEntriesResponse<NodeId>, RPCError<NodeId, BasicNode, RaftError<NodeId>>> {
        self.post("/raft/append-entries", &rpc)
            .await
            .map_err(|e| RPCError::Unreachable(unreachable_err(e)))
    }

    async fn vote(
        &mut self,
        rpc: VoteRequest<NodeId>,
        _option: RPCOption,
    ) -> Result<VoteResponse<NodeId>, RPCError<NodeId, BasicNode, RaftError<NodeId>>> {
        self.post("/raft/vote", &rpc)
            .await
            .map_err(|e| RPCError::Unreachable(unreachable_err(e)))
    }

    async fn install_snapshot(
        &mut self,
        rpc: InstallSnapshotRequest<TypeConfig>,
        _option: RPCOption,
    ) -> Result<
        InstallSnapshotResponse<NodeId>,
        RPCError<NodeId, BasicNode, RaftError<NodeId, InstallSnapshotError>>,
    > {
        self.post("/raft/install-snapshot", &rpc)
            .await
            .map_err(|e| RPCError::Unreachable(unreachable_err(e)))
    }
}

pub struct HttpRaftNetworkFactory;

impl RaftNetworkFactory<TypeConfig> for HttpRaftNetworkFactory {
    type Network = HttpRaftNetwork;

    async fn new_client(&mut self, _target: NodeId, node: &BasicNode) -> Self::Network {
        let base_url = if node.addr.starts_with("http") {
            node.addr.clone()
        } else {
            format!("https://{}", node.addr)
        };
        let client = Client::builder()
            .danger_accept_invalid_certs(true)
            .connect_timeout(Duration::from_secs(3))
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_else(|_| Client::new());
        HttpRaftNetwork { base_url, client }
    }
}
