// src/core/adapters/jail.rs

//! Jail CLI adapter: wraps FreeBSD `jail(8)`/`jexec(8)` for
//! jail-kind guests. Linux jails reuse the same
//! shape over an equivalent `systemd-nspawn`-style binary configured at
//! startup; both speak through this one adapter so C3 stays hypervisor/jail
//! agnostic above this layer.

use crate::core::adapters::process;
use crate::core::errors::{FleetResult, UpstreamKind};
use crate::core::guest::model::Guest;
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);
const DEFAULT_RETRIES: u32 = 1;

pub struct JailAdapter {
    binary: String,
    timeout: Duration,
}

impl JailAdapter {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self { binary: binary.into(), timeout }
    }

    async fn run(&self, args: &[&str]) -> FleetResult<String> {
        let out = process::run(UpstreamKind::Jail, &self.binary, args, self.timeout, DEFAULT_RETRIES).await?;
        Ok(out.stdout)
    }

    /// Creates (or re-creates) a jail from its guest spec. `allow_opts` map
    /// 1:1 to `allow.<opt>=1` jail parameters.
    pub async fn create(&self, guest: &Guest) -> FleetResult<()> {
        let id = guest.guest_id.to_string();
        let mut args: Vec<String> = vec!["-c".into(), format!("name={}", guest.name), format!("jid={id}")];
        for opt in &guest.jail_allow_opts {
            args.push(format!("allow.{opt}=1"));
        }
        if let Some(devfs) = &guest.jail_devfs_ruleset {
            args.push(format!("devfs_ruleset={devfs}"));
        }
        let refs: Vec<&str> = args.iter().map(String::as_str).collect();
        self.run(&refs).await?;
        self.run_exec_script(guest, JailHook::PreStart).await?;
        Ok(())
    }

    pub async fn start(&self, guest: &Guest) -> FleetResult<()> {
        self.run(&["-m", &format!("name={}", guest.name), "-c"]).await?;
        self.run_exec_script(guest, JailHook::Start).await?;
        self.run_exec_script(guest, JailHook::PostStart).await?;
        Ok(())
    }

    pub async fn stop(&self, guest: &Guest) -> FleetResult<()> {
        self.run_exec_script(guest, JailHook::PreStop).await?;
        self.run(&["-r", &guest.name]).await?;
        self.run_exec_script(guest, JailHook::Stop).await?;
        self.run_exec_script(guest, JailHook::PostStop).await?;
        Ok(())
    }

    pub async fn destroy(&self, guest_name: &str) -> FleetResult<()> {
        self.run(&["-r", guest_name]).await?;
        Ok(())
    }

    /// Spawns an interactive shell inside the jail.
    pub fn console(&self, guest_name: &str) -> FleetResult<tokio::process::Child> {
        process::spawn_interactive(UpstreamKind::Jail, "jexec", &[guest_name, "/bin/sh"])
    }

    pub async fn is_running(&self, guest_name: &str) -> FleetResult<bool> {
        let stdout = self.run(&["-lhnj", guest_name]).await.unwrap_or_default();
        Ok(stdout.lines().count() > 1)
    }

    async fn run_exec_script(&self, guest: &Guest, hook: JailHook) -> FleetResult<()> {
        let Some(script) = guest.exec_scripts.get(hook) else { return Ok(()) };
        if script.is_empty() {
            return Ok(());
        }
        process::run(UpstreamKind::Jail, "jexec", &[guest.name.as_str(), "sh", "-c", script], self.timeout, 0).await?;
        Ok(())
    }
}

impl Default for JailAdapter {
    fn default() -> Self {
        Self::new("jail", DEFAULT_TIMEOUT)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JailHook {
    PreStart,
    Start,
    PostStart,
    PreStop,
    Stop,
    PostStop,
}
