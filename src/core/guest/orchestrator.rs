// src/core/guest/orchestrator.rs

//! C3: guest lifecycle orchestration.
//!
//! Owns the local guest/storage/network tables (storage schema itself is a
//! non-goal, so these are in-memory, keyed by the same ids the
//! HTTP layer hands back to callers) plus the global reservation table and
//! the hypervisor/jail adapters used to materialize and reconcile state.
//! Per-guest operations are serialized by a lock keyed by `guest_id`.

use crate::core::adapters::{HypervisorAdapter, JailAdapter};
use crate::core::errors::{FleetError, FleetResult};
use crate::core::guest::model::{
    Guest, GuestKind, GuestLifecycleState, GuestNetwork, GuestStorage, Switch,
};
use crate::core::guest::reservations::ReservationTable;
use crate::core::guest::stats::UsageStatsStore;
use crate::core::guest::{state_machine, validation};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuestAction {
    Start,
    Stop,
    Reboot,
    Shutdown,
}

pub struct GuestOrchestrator {
    guests: DashMap<u32, Guest>,
    storages: DashMap<Uuid, GuestStorage>,
    networks: DashMap<Uuid, GuestNetwork>,
    switches: DashMap<Uuid, Switch>,
    /// One async lock per guest_id, created on first touch.
    guest_locks: DashMap<u32, Arc<AsyncMutex<()>>>,
    reservations: ReservationTable,
    pub stats: UsageStatsStore,
    hypervisor: HypervisorAdapter,
    jail: JailAdapter,
    host_ppt_table: Vec<String>,
    host_logical_cores: u32,
}

impl GuestOrchestrator {
    pub fn new(
        hypervisor: HypervisorAdapter,
        jail: JailAdapter,
        host_ppt_table: Vec<String>,
        host_logical_cores: u32,
    ) -> Self {
        Self {
            guests: DashMap::new(),
            storages: DashMap::new(),
            networks: DashMap::new(),
            switches: DashMap::new(),
            guest_locks: DashMap::new(),
            reservations: ReservationTable::new(),
            stats: UsageStatsStore::new(),
            hypervisor,
            jail,
            host_ppt_table,
            host_logical_cores,
        }
    }

    fn lock_for(&self, guest_id: u32) -> Arc<AsyncMutex<()>> {
        self.guest_locks.entry(guest_id).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
    }

    /// Samples every running VM's usage into its stats ring on the 5s
    /// poller tick. Jail guests have no usage adapter yet, so they're
    /// skipped rather than recorded as zeroes.
    pub async fn poll_usage_stats(&self, ts: i64) {
        let running: Vec<u32> = self
            .guests
            .iter()
            .filter(|g| g.kind == GuestKind::Vm && g.lifecycle_state == GuestLifecycleState::Running)
            .map(|g| g.guest_id)
            .collect();
        for guest_id in running {
            match self.hypervisor.usage(guest_id, ts).await {
                Ok(sample) => self.stats.record(guest_id, sample),
                Err(e) => tracing::warn!(guest_id, error = %e, "failed to poll guest usage"),
            }
        }
    }

    pub fn get(&self, guest_id: u32) -> Option<Guest> {
        self.guests.get(&guest_id).map(|g| g.clone())
    }

    pub fn list(&self) -> Vec<Guest> {
        self.guests.iter().map(|g| g.clone()).collect()
    }

    /// `CreateGuest(kind, spec)`. Validates, reserves global
    /// resources, writes the store rows, then materializes via C6; on
    /// materialization failure rolls back the store rows (the `Reservation`
    /// guard releases itself on drop unless committed).
    pub async fn create_guest(
        &self,
        mut guest: Guest,
        storages: Vec<GuestStorage>,
        networks: Vec<GuestNetwork>,
    ) -> FleetResult<Guest> {
        validation::validate_guest_shape(&guest)?;

        if self.guests.contains_key(&guest.guest_id) {
            return Err(FleetError::AlreadyExists(format!("guest_id {}", guest.guest_id)));
        }

        let lock = self.lock_for(guest.guest_id);
        let _permit = lock.lock().await;

        let reserved_pci = self.reservations.reserved_pci_ids();
        validation::validate_pci_passthrough(&guest.pci_passthrough, &self.host_ppt_table, &reserved_pci)?;
        let reserved_pins = self.reservations.reserved_cpu_pins();
        validation::validate_cpu_pins(&guest.cpu_pins, self.host_logical_cores, &reserved_pins)?;

        let vnc_port = guest.vnc.as_ref().and_then(|v| v.port);
        if let Some(port) = vnc_port {
            if HypervisorAdapter::vnc_port_in_use(port) {
                return Err(FleetError::ResourceBusy(format!("vnc port {port} already in use on host")));
            }
        }
        let reservation = self
            .reservations
            .reserve(&guest.pci_passthrough, &guest.cpu_pins, vnc_port)?;

        for storage in &storages {
            self.storages.insert(storage.id, storage.clone());
        }
        for network in &networks {
            self.networks.insert(network.id, network.clone());
        }
        guest.storages = storages.iter().map(|s| s.id).collect();
        guest.networks = networks.iter().map(|n| n.id).collect();
        guest.lifecycle_state = GuestLifecycleState::Defined;
        self.guests.insert(guest.guest_id, guest.clone());

        let materialize_result = match guest.kind {
            GuestKind::Vm => self.hypervisor.define(&guest).await,
            GuestKind::Jail => self.jail.create(&guest).await,
        };

        match materialize_result {
            Ok(()) => {
                reservation.commit();
                Ok(guest)
            }
            Err(e) => {
                // Rollback: delete the store rows created by this call.
                self.guests.remove(&guest.guest_id);
                for storage in &storages {
                    self.storages.remove(&storage.id);
                }
                for network in &networks {
                    self.networks.remove(&network.id);
                }
                drop(reservation); // releases pci/pins/vnc reserved above
                Err(e)
            }
        }
    }

    pub async fn edit_guest(&self, guest_id: u32, description: String) -> FleetResult<Guest> {
        let lock = self.lock_for(guest_id);
        let _permit = lock.lock().await;
        let mut entry = self
            .guests
            .get_mut(&guest_id)
            .ok_or_else(|| FleetError::NotFound(format!("guest {guest_id}")))?;
        entry.description = description;
        Ok(entry.clone())
    }

    /// Cascade: detach/destroy storages, detach networks, delete the
    /// hypervisor/jail definition, delete the store row.
    pub async fn delete_guest(&self, guest_id: u32) -> FleetResult<()> {
        let lock = self.lock_for(guest_id);
        let _permit = lock.lock().await;

        let guest = self
            .guests
            .get(&guest_id)
            .map(|g| g.clone())
            .ok_or_else(|| FleetError::NotFound(format!("guest {guest_id}")))?;

        if matches!(guest.lifecycle_state, GuestLifecycleState::Running | GuestLifecycleState::Paused) {
            return Err(FleetError::InvalidState("guest must be shutoff before deletion".into()));
        }

        for id in &guest.storages {
            self.storages.remove(id);
        }
        for id in &guest.networks {
            self.networks.remove(id);
        }

        match guest.kind {
            GuestKind::Vm => self.hypervisor.undefine(guest.guest_id).await?,
            GuestKind::Jail => self.jail.destroy(&guest.name).await?,
        }

        self.guests.remove(&guest_id);
        self.stats.forget(guest_id);
        self.guest_locks.remove(&guest_id);
        Ok(())
    }

    /// `PerformAction(action)`. `shutdown` waits `shutdown_wait_time` seconds
    /// then escalates to `stop`.
    pub async fn perform_action(&self, guest_id: u32, action: GuestAction) -> FleetResult<Guest> {
        let lock = self.lock_for(guest_id);
        let _permit = lock.lock().await;

        let guest = self
            .guests
            .get(&guest_id)
            .map(|g| g.clone())
            .ok_or_else(|| FleetError::NotFound(format!("guest {guest_id}")))?;

        let new_state = match action {
            GuestAction::Start => {
                state_machine::transition(guest.lifecycle_state, GuestLifecycleState::Running)?;
                match guest.kind {
                    GuestKind::Vm => self.hypervisor.start(guest.guest_id).await?,
                    GuestKind::Jail => self.jail.start(&guest).await?,
                }
                GuestLifecycleState::Running
            }
            GuestAction::Stop => {
                state_machine::transition(guest.lifecycle_state, GuestLifecycleState::Shutoff)?;
                match guest.kind {
                    GuestKind::Vm => self.hypervisor.stop(guest.guest_id, true).await?,
                    GuestKind::Jail => self.jail.stop(&guest).await?,
                }
                GuestLifecycleState::Shutoff
            }
            GuestAction::Reboot => {
                if guest.kind == GuestKind::Vm {
                    self.hypervisor.reboot(guest.guest_id).await?;
                } else {
                    self.jail.stop(&guest).await?;
                    self.jail.start(&guest).await?;
                }
                GuestLifecycleState::Running
            }
            GuestAction::Shutdown => {
                state_machine::transition(guest.lifecycle_state, GuestLifecycleState::Shutoff)?;
                match guest.kind {
                    GuestKind::Vm => {
                        match self.hypervisor.stop(guest.guest_id, false).await {
                            Ok(()) => {}
                            Err(_) => {
                                tokio::time::sleep(std::time::Duration::from_secs(guest.shutdown_wait_time)).await;
                                self.hypervisor.stop(guest.guest_id, true).await?;
                            }
                        }
                    }
                    GuestKind::Jail => self.jail.stop(&guest).await?,
                }
                GuestLifecycleState::Shutoff
            }
        };

        let mut entry = self.guests.get_mut(&guest_id).unwrap();
        entry.lifecycle_state = new_state;
        Ok(entry.clone())
    }

    /// Hardware edits are only accepted while `Shutoff`.
    pub fn modify_hardware(&self, guest_id: u32, cpu: Option<u32>, ram_bytes: Option<u64>) -> FleetResult<Guest> {
        let mut entry = self
            .guests
            .get_mut(&guest_id)
            .ok_or_else(|| FleetError::NotFound(format!("guest {guest_id}")))?;
        state_machine::requires_shutoff_for_hardware_edit(entry.lifecycle_state)?;
        if let Some(cpu) = cpu {
            entry.cpu = cpu;
        }
        if let Some(ram) = ram_bytes {
            validation::validate_ram(ram)?;
            entry.ram_bytes = ram;
        }
        Ok(entry.clone())
    }

    /// Spawns an interactive console session for a guest. Returns the live child process;
    /// the WS handler owns pumping bytes between it and the socket.
    pub fn console(&self, guest_id: u32) -> FleetResult<tokio::process::Child> {
        let guest = self
            .guests
            .get(&guest_id)
            .map(|g| g.clone())
            .ok_or_else(|| FleetError::NotFound(format!("guest {guest_id}")))?;
        match guest.kind {
            GuestKind::Vm => self.hypervisor.console(guest_id),
            GuestKind::Jail => self.jail.console(&guest.name),
        }
    }

    pub fn list_switches(&self) -> Vec<Switch> {
        self.switches.iter().map(|s| s.clone()).collect()
    }

    pub fn create_switch(&self, switch: Switch) -> FleetResult<Switch> {
        if self.switches.contains_key(&switch.id) {
            return Err(FleetError::AlreadyExists(format!("switch {}", switch.id)));
        }
        self.switches.insert(switch.id, switch.clone());
        Ok(switch)
    }

    /// Refuses to delete a switch still referenced by a `GuestNetwork`
    /// attachment, keeping the arena-style tables consistent.
    pub fn delete_switch(&self, switch_id: Uuid) -> FleetResult<()> {
        if !self.switches.contains_key(&switch_id) {
            return Err(FleetError::NotFound(format!("switch {switch_id}")));
        }
        if self.networks.iter().any(|n| n.switch_id == switch_id) {
            return Err(FleetError::InvalidState(
                "switch is still attached to at least one guest network".into(),
            ));
        }
        self.switches.remove(&switch_id);
        Ok(())
    }
}
