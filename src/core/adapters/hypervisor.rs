// src/core/adapters/hypervisor.rs

//! Hypervisor CLI adapter: materializes a VM's declarative spec
//! against the host's bhyve/QEMU-style CLI and reports observed state back
//! for C3's reconciliation pass.

use crate::core::adapters::process;
use crate::core::errors::{FleetResult, UpstreamKind};
use crate::core::guest::model::{Guest, UsageSample};
use std::net::TcpListener;
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);
const DEFAULT_RETRIES: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservedPowerState {
    Running,
    Stopped,
    Paused,
    Unknown,
}

pub struct HypervisorAdapter {
    binary: String,
    timeout: Duration,
}

impl HypervisorAdapter {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self { binary: binary.into(), timeout }
    }

    async fn run(&self, args: &[&str]) -> FleetResult<String> {
        let out = process::run(UpstreamKind::Hypervisor, &self.binary, args, self.timeout, DEFAULT_RETRIES).await?;
        Ok(out.stdout)
    }

    /// Defines (or redefines) a guest; idempotent on `guest_id`.
    pub async fn define(&self, guest: &Guest) -> FleetResult<()> {
        let id = guest.guest_id.to_string();
        let ram = guest.ram_bytes.to_string();
        let cpu = guest.cpu.to_string();
        self.run(&["define", "--id", &id, "--ram", &ram, "--cpu", &cpu, "--name", &guest.name])
            .await?;
        Ok(())
    }

    pub async fn undefine(&self, guest_id: u32) -> FleetResult<()> {
        let id = guest_id.to_string();
        self.run(&["undefine", "--id", &id]).await?;
        Ok(())
    }

    pub async fn start(&self, guest_id: u32) -> FleetResult<()> {
        self.run(&["start", "--id", &guest_id.to_string()]).await?;
        Ok(())
    }

    pub async fn stop(&self, guest_id: u32, force: bool) -> FleetResult<()> {
        let id = guest_id.to_string();
        let mut args = vec!["stop", "--id", &id];
        if force {
            args.push("--force");
        }
        self.run(&args).await?;
        Ok(())
    }

    pub async fn reboot(&self, guest_id: u32) -> FleetResult<()> {
        self.run(&["reboot", "--id", &guest_id.to_string()]).await?;
        Ok(())
    }

    pub async fn pause(&self, guest_id: u32) -> FleetResult<()> {
        self.run(&["pause", "--id", &guest_id.to_string()]).await?;
        Ok(())
    }

    pub async fn resume(&self, guest_id: u32) -> FleetResult<()> {
        self.run(&["resume", "--id", &guest_id.to_string()]).await?;
        Ok(())
    }

    /// Parses the observed power state from `status --id N` output, used by
    /// C3's reconciliation pass to detect drift from the declared spec.
    pub async fn observed_state(&self, guest_id: u32) -> FleetResult<ObservedPowerState> {
        let stdout = self.run(&["status", "--id", &guest_id.to_string()]).await?;
        Ok(match stdout.trim() {
            "running" => ObservedPowerState::Running,
            "stopped" => ObservedPowerState::Stopped,
            "paused" => ObservedPowerState::Paused,
            _ => ObservedPowerState::Unknown,
        })
    }
    /// Spawns an interactive console session attached to the guest's PTY
    ///.
    pub fn console(&self, guest_id: u32) -> FleetResult<tokio::process::Child> {
        process::spawn_interactive(
            UpstreamKind::Hypervisor,
            &self.binary,
            &["console", "--id", &guest_id.to_string()],
        )
    }

    /// Parses `usage --id N` output ("cpu_pct mem_bytes rx_bytes tx_bytes")
    /// for the 5s usage-stats poller backing `GET /api/vm/:id/stats`.
    pub async fn usage(&self, guest_id: u32, ts: i64) -> FleetResult<UsageSample> {
        let stdout = self.run(&["usage", "--id", &guest_id.to_string()]).await?;
        let fields: Vec<&str> = stdout.trim().split_whitespace().collect();
        let cpu_pct = fields.first().and_then(|s| s.parse().ok()).unwrap_or(0.0);
        let mem_bytes = fields.get(1).and_then(|s| s.parse().ok()).unwrap_or(0);
        let rx_bytes = fields.get(2).and_then(|s| s.parse().ok()).unwrap_or(0);
        let tx_bytes = fields.get(3).and_then(|s| s.parse().ok()).unwrap_or(0);
        Ok(UsageSample { ts, cpu_pct, mem_bytes, rx_bytes, tx_bytes })
    }

    /// Whether `port` is already bound on the host, outside of anything this
    /// process has reserved. Catches a port left open by a process started
    /// before this daemon, or one bound directly by an operator.
    pub fn vnc_port_in_use(port: u16) -> bool {
        TcpListener::bind(("0.0.0.0", port)).is_err()
    }
}

impl Default for HypervisorAdapter {
    fn default() -> Self {
        Self::new("bhyvectl", DEFAULT_TIMEOUT)
    }
}
