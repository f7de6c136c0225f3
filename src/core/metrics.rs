// src/core/metrics.rs

//! Defines and registers Prometheus metrics for cluster and node monitoring.
//!
//! Uses `lazy_static` so metrics are registered exactly once for the process
//! lifetime, mirroring how the rest of the ambient stack (config, logging)
//! is wired up as process-wide singletons through a root supervisor.

use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Gauge, GaugeVec, Histogram, TextEncoder, register_counter,
    register_counter_vec, register_gauge, register_gauge_vec, register_histogram,
};

lazy_static! {
    // --- Cluster (C1) ---
    pub static ref RAFT_TERM: Gauge =
        register_gauge!("fleetd_raft_term", "Current Raft term observed by this node.").unwrap();
    pub static ref RAFT_IS_LEADER: Gauge =
        register_gauge!("fleetd_raft_is_leader", "1 if this node believes it is the Raft leader.").unwrap();
    pub static ref CLUSTER_COMMANDS_APPLIED_TOTAL: CounterVec = register_counter_vec!(
        "fleetd_cluster_commands_applied_total",
        "Total cluster commands applied to the FSM, labeled by command kind.",
        &["kind"]
    )
    .unwrap();
    pub static ref CLUSTER_PROPOSE_TIMEOUTS_TOTAL: Counter = register_counter!(
        "fleetd_cluster_propose_timeouts_total",
        "Total Raft proposals that timed out (surfaced as ClusterUnavailable)."
    )
    .unwrap();

    // --- Router (C2) ---
    pub static ref PROXY_REQUESTS_TOTAL: CounterVec = register_counter_vec!(
        "fleetd_proxy_requests_total",
        "Total requests forwarded to a peer node, labeled by outcome.",
        &["outcome"]
    )
    .unwrap();
    pub static ref PROXY_LATENCY_SECONDS: Histogram = register_histogram!(
        "fleetd_proxy_latency_seconds",
        "Latency of forwarded requests in seconds."
    )
    .unwrap();

    // --- Guests (C3) ---
    pub static ref GUESTS_TOTAL: GaugeVec = register_gauge_vec!(
        "fleetd_guests_total",
        "Number of guests known locally, labeled by kind and lifecycle state.",
        &["kind", "state"]
    )
    .unwrap();
    pub static ref GUEST_ACTIONS_TOTAL: CounterVec = register_counter_vec!(
        "fleetd_guest_actions_total",
        "Total guest lifecycle actions performed, labeled by action and outcome.",
        &["action", "outcome"]
    )
    .unwrap();

    // --- Replication (C4) ---
    pub static ref REPLICATION_RUNS_TOTAL: CounterVec = register_counter_vec!(
        "fleetd_replication_runs_total",
        "Total replication runs, labeled by mode and outcome.",
        &["mode", "outcome"]
    )
    .unwrap();
    pub static ref REPLICATION_BYTES_MOVED_TOTAL: Counter = register_counter!(
        "fleetd_replication_bytes_moved_total",
        "Total bytes moved by completed replication runs."
    )
    .unwrap();

    // --- Backup scheduler (C5) ---
    pub static ref BACKUP_JOBS_RUNNING: Gauge = register_gauge!(
        "fleetd_backup_jobs_running",
        "Number of backup jobs currently running on this node."
    )
    .unwrap();
    pub static ref BACKUP_EVENTS_TOTAL: CounterVec = register_counter_vec!(
        "fleetd_backup_events_total",
        "Total backup events terminated, labeled by status.",
        &["status"]
    )
    .unwrap();

    // --- Adapters (C6) ---
    pub static ref ADAPTER_CALLS_TOTAL: CounterVec = register_counter_vec!(
        "fleetd_adapter_calls_total",
        "Total external adapter invocations, labeled by adapter and outcome.",
        &["adapter", "outcome"]
    )
    .unwrap();
}

/// Gathers all registered metrics and encodes them in the Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder.encode_to_string(&metric_families).unwrap()
}
