// src/config.rs

//! Manages node configuration: loading from TOML, resolving defaults, and validation.

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use tracing::warn;

/// Configuration for TLS used both for the public API and cluster-internal hops.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct TlsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_cert_path")]
    pub cert_path: String,
    #[serde(default = "default_key_path")]
    pub key_path: String,
}

fn default_cert_path() -> String {
    "fleetd.crt".to_string()
}
fn default_key_path() -> String {
    "fleetd.key".to_string()
}

/// Configuration for the Prometheus metrics exporter (ambient stack).
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MetricsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

fn default_true() -> bool {
    true
}
fn default_metrics_port() -> u16 {
    9878
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            port: default_metrics_port(),
        }
    }
}

/// Raft / cluster coordination settings (C1, ).
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ClusterConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Directory where the Raft log, snapshots and the durable FSM cache live.
    #[serde(default = "default_raft_dir")]
    pub raft_dir: String,
    #[serde(default = "default_heartbeat_ms")]
    pub heartbeat_interval_ms: u64,
    #[serde(default = "default_election_timeout_min_ms")]
    pub election_timeout_min_ms: u64,
    #[serde(default = "default_election_timeout_max_ms")]
    pub election_timeout_max_ms: u64,
    /// Bounded window a write proposal waits for commit before surfacing
    /// `ClusterUnavailable`.
    #[serde(default = "default_propose_timeout_ms")]
    pub propose_timeout_ms: u64,
    /// How many terminal backup events to retain in the replicated ring
    /// before the oldest are dropped.
    #[serde(default = "default_event_ring_capacity")]
    pub event_ring_capacity: usize,
    /// Shared secret backing `X-Cluster-Token` HMACs; must match across
    /// every node in the cluster (distributed out of band at join time).
    #[serde(default)]
    pub shared_secret: String,
}

fn default_raft_dir() -> String {
    "fleetd_data/raft".to_string()
}
fn default_heartbeat_ms() -> u64 {
    250
}
fn default_election_timeout_min_ms() -> u64 {
    800
}
fn default_election_timeout_max_ms() -> u64 {
    1500
}
fn default_propose_timeout_ms() -> u64 {
    5000
}
fn default_event_ring_capacity() -> usize {
    2000
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            raft_dir: default_raft_dir(),
            heartbeat_interval_ms: default_heartbeat_ms(),
            election_timeout_min_ms: default_election_timeout_min_ms(),
            election_timeout_max_ms: default_election_timeout_max_ms(),
            propose_timeout_ms: default_propose_timeout_ms(),
            event_ring_capacity: default_event_ring_capacity(),
            shared_secret: String::new(),
        }
    }
}

/// Request router / reverse proxy tuning (C2, ).
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RouterConfig {
    #[serde(default = "default_max_idle_conns")]
    pub max_idle_conns: usize,
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    #[serde(default = "default_dial_timeout_secs")]
    pub dial_timeout_secs: u64,
    #[serde(default = "default_tls_timeout_secs")]
    pub tls_timeout_secs: u64,
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,
}

fn default_max_idle_conns() -> usize {
    32
}
fn default_idle_timeout_secs() -> u64 {
    60
}
fn default_dial_timeout_secs() -> u64 {
    5
}
fn default_tls_timeout_secs() -> u64 {
    5
}
fn default_flush_interval_ms() -> u64 {
    50
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            max_idle_conns: default_max_idle_conns(),
            idle_timeout_secs: default_idle_timeout_secs(),
            dial_timeout_secs: default_dial_timeout_secs(),
            tls_timeout_secs: default_tls_timeout_secs(),
            flush_interval_ms: default_flush_interval_ms(),
        }
    }
}

/// Paths and timeouts for the external CLI adapters (C6, ).
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AdaptersConfig {
    #[serde(default = "default_zfs_bin")]
    pub zfs_bin: String,
    #[serde(default = "default_hypervisor_bin")]
    pub hypervisor_bin: String,
    #[serde(default = "default_jail_bin")]
    pub jail_bin: String,
    #[serde(default = "default_adapter_timeout_secs")]
    pub command_timeout_secs: u64,
    /// Grace window between SIGTERM and SIGKILL.
    #[serde(default = "default_kill_grace_secs")]
    pub kill_grace_secs: u64,
    /// Host PCI device addresses available for VM passthrough.
    #[serde(default)]
    pub pci_passthrough_devices: Vec<String>,
}

fn default_zfs_bin() -> String {
    "zfs".to_string()
}
fn default_hypervisor_bin() -> String {
    "bhyvectl".to_string()
}
fn default_jail_bin() -> String {
    "jail".to_string()
}
fn default_adapter_timeout_secs() -> u64 {
    30
}
fn default_kill_grace_secs() -> u64 {
    5
}

impl Default for AdaptersConfig {
    fn default() -> Self {
        Self {
            zfs_bin: default_zfs_bin(),
            hypervisor_bin: default_hypervisor_bin(),
            jail_bin: default_jail_bin(),
            command_timeout_secs: default_adapter_timeout_secs(),
            kill_grace_secs: default_kill_grace_secs(),
            pci_passthrough_devices: Vec::new(),
        }
    }
}

/// Backup scheduler tuning (C5, ).
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BackupConfig {
    /// Minimum interval between `BackupEventProgress` commands for a single
    /// run.
    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,
}

fn default_progress_interval_ms() -> u64 {
    2000
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            progress_interval_ms: default_progress_interval_ms(),
        }
    }
}

/// A raw representation of the config file before validation and resolution,
/// mirroring the reference implementation's `RawConfig` -> `Config` split.
#[derive(Deserialize)]
struct RawConfig {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default)]
    hostname: Option<String>,
    #[serde(default = "default_log_level")]
    log_level: String,
    #[serde(default)]
    tls: TlsConfig,
    #[serde(default)]
    cluster: ClusterConfig,
    #[serde(default)]
    router: RouterConfig,
    #[serde(default)]
    adapters: AdaptersConfig,
    #[serde(default)]
    backup: BackupConfig,
    #[serde(default)]
    metrics: MetricsConfig,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    7620
}
fn default_log_level() -> String {
    "info".to_string()
}

/// The final, validated, and resolved node configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub hostname: String,
    pub log_level: String,
    pub tls: TlsConfig,
    pub cluster: ClusterConfig,
    pub router: RouterConfig,
    pub adapters: AdaptersConfig,
    pub backup: BackupConfig,
    pub metrics: MetricsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            hostname: resolve_hostname(None),
            log_level: default_log_level(),
            tls: TlsConfig::default(),
            cluster: ClusterConfig::default(),
            router: RouterConfig::default(),
            adapters: AdaptersConfig::default(),
            backup: BackupConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

fn resolve_hostname(configured: Option<String>) -> String {
    configured
        .filter(|h| !h.trim().is_empty())
        .or_else(|| hostname::get().ok().and_then(|h| h.into_string().ok()))
        .unwrap_or_else(|| "localhost".to_string())
}

impl Config {
    /// Creates a new `Config` instance by reading and parsing a TOML file.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at '{path}'"))?;
        let raw: RawConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse TOML from '{path}'"))?;

        let config = Config {
            host: raw.host,
            port: raw.port,
            hostname: resolve_hostname(raw.hostname),
            log_level: raw.log_level,
            tls: raw.tls,
            cluster: raw.cluster,
            router: raw.router,
            adapters: raw.adapters,
            backup: raw.backup,
            metrics: raw.metrics,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates the resolved configuration to ensure logical consistency.
    fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(anyhow!("port cannot be 0"));
        }
        if self.hostname.trim().is_empty() {
            return Err(anyhow!("hostname cannot be empty"));
        }

        if self.cluster.election_timeout_min_ms >= self.cluster.election_timeout_max_ms {
            return Err(anyhow!(
                "cluster.election_timeout_min_ms must be less than election_timeout_max_ms"
            ));
        }
        if self.cluster.heartbeat_interval_ms * 2 > self.cluster.election_timeout_min_ms {
            warn!(
                "cluster.heartbeat_interval_ms ({}) is more than half of election_timeout_min_ms ({}); elections may thrash",
                self.cluster.heartbeat_interval_ms, self.cluster.election_timeout_min_ms
            );
        }
        if self.cluster.enabled && self.cluster.shared_secret.trim().is_empty() {
            return Err(anyhow!(
                "cluster.shared_secret must be set to a non-empty value when cluster.enabled is true"
            ));
        }

        if self.tls.enabled {
            if self.tls.cert_path.trim().is_empty() {
                return Err(anyhow!("tls.cert_path cannot be empty when TLS is enabled"));
            }
            if self.tls.key_path.trim().is_empty() {
                return Err(anyhow!("tls.key_path cannot be empty when TLS is enabled"));
            }
        }

        if self.metrics.enabled {
            if self.metrics.port == 0 {
                return Err(anyhow!("metrics.port cannot be 0"));
            }
            if self.metrics.port == self.port {
                return Err(anyhow!(
                    "metrics.port cannot be the same as the main API port"
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let cfg = Config::default();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_zero_port() {
        let mut cfg = Config::default();
        cfg.port = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_metrics_port_collision() {
        let mut cfg = Config::default();
        cfg.metrics.port = cfg.port;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_inverted_election_timeouts() {
        let mut cfg = Config::default();
        cfg.cluster.election_timeout_min_ms = 2000;
        cfg.cluster.election_timeout_max_ms = 1000;
        assert!(cfg.validate().is_err());
    }
}
