// src/core/guest/reservations.rs

//! Global resource reservations: PCI passthrough ids, CPU pins, and VNC
//! ports. Guarded by a single `parking_lot::Mutex` — these sets are
//! small and reservation is on the cold create/edit path, not the hot path.

use crate::core::errors::{FleetError, FleetResult};
use parking_lot::Mutex;
use std::collections::HashSet;

#[derive(Debug, Default)]
struct ReservationState {
    pci_ids: HashSet<String>,
    cpu_pins: HashSet<u32>,
    vnc_ports: HashSet<u16>,
}

pub struct ReservationTable {
    state: Mutex<ReservationState>,
}

/// An in-progress reservation; dropping it without calling [`Reservation::commit`]
/// releases everything it holds.
pub struct Reservation<'a> {
    table: &'a ReservationTable,
    pci_ids: Vec<String>,
    cpu_pins: Vec<u32>,
    vnc_port: Option<u16>,
    committed: bool,
}

impl ReservationTable {
    pub fn new() -> Self {
        Self { state: Mutex::new(ReservationState::default()) }
    }

    pub fn reserved_pci_ids(&self) -> Vec<String> {
        self.state.lock().pci_ids.iter().cloned().collect()
    }

    pub fn reserved_cpu_pins(&self) -> Vec<u32> {
        self.state.lock().cpu_pins.iter().copied().collect()
    }

    /// Attempts to reserve a full resource bundle atomically: either every
    /// requested item is free and gets reserved, or nothing changes.
    pub fn reserve<'a>(
        &'a self,
        pci_ids: &[String],
        cpu_pins: &[u32],
        vnc_port: Option<u16>,
    ) -> FleetResult<Reservation<'a>> {
        let mut guard = self.state.lock();

        for id in pci_ids {
            if guard.pci_ids.contains(id) {
                return Err(FleetError::ResourceBusy(format!("PCI id {id} already reserved")));
            }
        }
        for pin in cpu_pins {
            if guard.cpu_pins.contains(pin) {
                return Err(FleetError::ResourceBusy(format!("cpu pin {pin} already reserved")));
            }
        }
        if let Some(port) = vnc_port {
            if guard.vnc_ports.contains(&port) {
                return Err(FleetError::ResourceBusy(format!("vnc port {port} already in use")));
            }
        }

        for id in pci_ids {
            guard.pci_ids.insert(id.clone());
        }
        for pin in cpu_pins {
            guard.cpu_pins.insert(*pin);
        }
        if let Some(port) = vnc_port {
            guard.vnc_ports.insert(port);
        }

        Ok(Reservation {
            table: self,
            pci_ids: pci_ids.to_vec(),
            cpu_pins: cpu_pins.to_vec(),
            vnc_port,
            committed: false,
        })
    }

    fn release(&self, pci_ids: &[String], cpu_pins: &[u32], vnc_port: Option<u16>) {
        let mut guard = self.state.lock();
        for id in pci_ids {
            guard.pci_ids.remove(id);
        }
        for pin in cpu_pins {
            guard.cpu_pins.remove(pin);
        }
        if let Some(port) = vnc_port {
            guard.vnc_ports.remove(&port);
        }
    }
}

impl Default for ReservationTable {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Reservation<'a> {
    /// Keeps the reservation held permanently (the guest row now owns it);
    /// nothing is released when this `Reservation` is later dropped.
    pub fn commit(mut self) {
        self.committed = true;
    }
}

impl<'a> Drop for Reservation<'a> {
    fn drop(&mut self) {
        if !self.committed {
            self.table.release(&self.pci_ids, &self.cpu_pins, self.vnc_port);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rollback_releases_reservation_on_drop() {
        let table = ReservationTable::new();
        {
            let r = table.reserve(&["0000:01:00.0".to_string()], &[2], Some(5900)).unwrap();
            assert_eq!(table.reserved_pci_ids().len(), 1);
            drop(r); // rollback: nothing committed
        }
        assert!(table.reserved_pci_ids().is_empty());
        assert!(table.reserved_cpu_pins().is_empty());
    }

    #[test]
    fn commit_retains_reservation() {
        let table = ReservationTable::new();
        let r = table.reserve(&[], &[4], None).unwrap();
        r.commit();
        assert_eq!(table.reserved_cpu_pins(), vec![4]);
    }

    #[test]
    fn concurrent_reservation_of_same_pin_is_resource_busy() {
        let table = ReservationTable::new();
        let _first = table.reserve(&[], &[7], None).unwrap();
        let err = table.reserve(&[], &[7], None).unwrap_err();
        assert_eq!(err.kind(), "ResourceBusy");
    }
}
