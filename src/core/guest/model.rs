// src/core/guest/model.rs

//! Guest entities: a VM or a jail, plus their storage/network
//! attachments and the switches they attach to.

use crate::core::adapters::jail::JailHook;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GuestKind {
    Vm,
    Jail,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JailType {
    Freebsd,
    Linux,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TimeOffset {
    Utc,
    Localtime,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CloudInit {
    pub user: Option<String>,
    pub meta: Option<String>,
    pub network: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VncConfig {
    pub enabled: bool,
    pub port: Option<u16>,
    pub password: Option<String>,
    pub resolution: Option<String>,
    pub wait: bool,
}

/// Exec scripts keyed by jail lifecycle hook.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExecScripts {
    pub prestart: Option<String>,
    pub start: Option<String>,
    pub poststart: Option<String>,
    pub prestop: Option<String>,
    pub stop: Option<String>,
    pub poststop: Option<String>,
}

impl ExecScripts {
    pub fn get(&self, hook: JailHook) -> Option<&str> {
        match hook {
            JailHook::PreStart => self.prestart.as_deref(),
            JailHook::Start => self.start.as_deref(),
            JailHook::PostStart => self.poststart.as_deref(),
            JailHook::PreStop => self.prestop.as_deref(),
            JailHook::Stop => self.stop.as_deref(),
            JailHook::PostStop => self.poststop.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GuestLifecycleState {
    Undefined,
    Defined,
    Running,
    Paused,
    Shutoff,
    Deleted,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Guest {
    pub guest_id: u32,
    pub name: String,
    pub kind: GuestKind,
    pub owner_node: Uuid,
    pub description: String,
    pub cpu: u32,
    pub ram_bytes: u64,
    pub networks: Vec<Uuid>,
    pub storages: Vec<Uuid>,
    /// VM only.
    pub pci_passthrough: Vec<String>,
    /// VM only: each entry is a host logical core index.
    pub cpu_pins: Vec<u32>,
    pub boot_order: Vec<Uuid>,
    pub start_at_boot: bool,
    pub lifecycle_state: GuestLifecycleState,
    /// Seconds to wait for a graceful shutdown before escalating to `stop`
    ///.
    pub shutdown_wait_time: u64,

    // Jail-only fields.
    pub jail_type: Option<JailType>,
    pub jail_allow_opts: Vec<String>,
    pub exec_scripts: ExecScripts,
    pub fstab: Vec<String>,
    pub jail_devfs_ruleset: Option<String>,

    // VM-only fields.
    pub vnc: Option<VncConfig>,
    pub serial_console: bool,
    pub tpm: bool,
    pub time_offset: TimeOffset,
    pub cloud_init: CloudInit,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    Zvol,
    Raw,
    Iso,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum StorageEmulation {
    VirtioBlk,
    AhciHd,
    Nvme,
    AhciCd,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GuestStorage {
    pub id: Uuid,
    pub guest_id: u32,
    pub dataset_ref: String,
    pub kind: StorageKind,
    pub emulation: StorageEmulation,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SwitchKind {
    Standard,
    Manual,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NetworkEmulation {
    Virtio,
    E1000,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GuestNetwork {
    pub id: Uuid,
    pub guest_id: u32,
    pub switch_id: Uuid,
    pub switch_kind: SwitchKind,
    pub mac: Option<String>,
    pub emulation: NetworkEmulation,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Switch {
    pub id: Uuid,
    pub kind: SwitchKind,
    pub name: String,
    pub uplinks: Vec<String>,
    pub vlan: Option<u16>,
    pub mtu: Option<u32>,
}

/// One usage-stats sample (backs `GET /api/vm/:id/stats`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct UsageSample {
    pub ts: i64,
    pub cpu_pct: f32,
    pub mem_bytes: u64,
    pub rx_bytes: u64,
    pub tx_bytes: u64,
}
