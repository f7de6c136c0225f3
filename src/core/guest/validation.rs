// src/core/guest/validation.rs

//! `CreateGuest` validation rules, plus the boundary-value checks
//! exercised by the unit tests below.

use crate::core::errors::{FleetError, FleetResult};
use crate::core::guest::model::{Guest, GuestKind, GuestStorage, StorageKind};
use once_cell::sync::Lazy;
use regex::Regex;

pub const MIN_RAM_BYTES: u64 = 128 * 1024 * 1024;
pub const MIN_GUEST_ID: u32 = 1;
pub const MAX_GUEST_ID: u32 = 9999;
pub const MIN_STORAGE_SIZE_BYTES: u64 = 128 * 1024 * 1024;

static NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.-]{1,63}$").unwrap());

pub fn validate_name(name: &str) -> FleetResult<()> {
    if NAME_RE.is_match(name) {
        Ok(())
    } else {
        Err(FleetError::Validation(format!(
            "guest name {name:?} must match [A-Za-z0-9_.-]{{1,63}}"
        )))
    }
}

pub fn validate_guest_id(guest_id: u32) -> FleetResult<()> {
    if (MIN_GUEST_ID..=MAX_GUEST_ID).contains(&guest_id) {
        Ok(())
    } else {
        Err(FleetError::Validation(format!(
            "guest_id {guest_id} must be in [{MIN_GUEST_ID},{MAX_GUEST_ID}]"
        )))
    }
}

pub fn validate_ram(ram_bytes: u64) -> FleetResult<()> {
    if ram_bytes >= MIN_RAM_BYTES {
        Ok(())
    } else {
        Err(FleetError::Validation(format!(
            "ram_bytes {ram_bytes} below minimum {MIN_RAM_BYTES}"
        )))
    }
}

/// `kind=raw` requires a filesystem dataset with enough `available` space;
/// `kind=zvol` requires a volume dataset. `dataset_available` and
/// `dataset_is_volume` are supplied by the caller after a C6 lookup so this
/// function stays a pure, unit-testable predicate.
pub fn validate_storage(
    storage: &GuestStorage,
    dataset_available: u64,
    dataset_is_volume: bool,
) -> FleetResult<()> {
    match storage.kind {
        StorageKind::Raw => {
            if dataset_is_volume {
                return Err(FleetError::Validation(
                    "storage kind=raw requires a filesystem dataset, not a volume".into(),
                ));
            }
            if storage.size_bytes < MIN_STORAGE_SIZE_BYTES {
                return Err(FleetError::Validation(format!(
                    "storage size_bytes {} below minimum {MIN_STORAGE_SIZE_BYTES}",
                    storage.size_bytes
                )));
            }
            if storage.size_bytes > dataset_available {
                return Err(FleetError::Validation(format!(
                    "storage size_bytes {} exceeds dataset available {}",
                    storage.size_bytes, dataset_available
                )));
            }
        }
        StorageKind::Zvol => {
            if !dataset_is_volume {
                return Err(FleetError::Validation(
                    "storage kind=zvol requires a volume dataset".into(),
                ));
            }
        }
        StorageKind::Iso => {
            if storage.size_bytes != 0 {
                return Err(FleetError::Validation(
                    "storage kind=iso must have size_bytes=0".into(),
                ));
            }
        }
    }
    Ok(())
}

/// PCI passthrough ids must exist in the node's PPT table and not be in use
/// elsewhere; both sets are supplied by the caller (host inventory + live
/// reservation table) so this stays pure.
pub fn validate_pci_passthrough(
    requested: &[String],
    host_ppt_table: &[String],
    already_reserved: &[String],
) -> FleetResult<()> {
    for id in requested {
        if !host_ppt_table.iter().any(|h| h == id) {
            return Err(FleetError::Validation(format!("PCI id {id} not present in host PPT table")));
        }
        if already_reserved.iter().any(|r| r == id) {
            return Err(FleetError::ResourceBusy(format!("PCI id {id} already in use")));
        }
    }
    Ok(())
}

/// Each CPU pin must refer to an existing logical core; no two guests pin
/// the same core.
pub fn validate_cpu_pins(
    requested: &[u32],
    host_logical_cores: u32,
    already_pinned: &[u32],
) -> FleetResult<()> {
    for pin in requested {
        if *pin >= host_logical_cores {
            return Err(FleetError::Validation(format!(
                "cpu pin {pin} exceeds host logical core count {host_logical_cores}"
            )));
        }
        if already_pinned.contains(pin) {
            return Err(FleetError::ResourceBusy(format!("cpu pin {pin} already in use")));
        }
    }
    Ok(())
}

/// Aggregate validation entry point for `CreateGuest`. Checks
/// common invariants; storage/PPT/pin checks happen against live host state
/// by the orchestrator, which has access to the reservation table.
pub fn validate_guest_shape(guest: &Guest) -> FleetResult<()> {
    validate_name(&guest.name)?;
    validate_guest_id(guest.guest_id)?;
    validate_ram(guest.ram_bytes)?;
    if guest.kind == GuestKind::Jail && !guest.pci_passthrough.is_empty() {
        return Err(FleetError::Validation("jails cannot use PCI passthrough".into()));
    }
    if guest.kind == GuestKind::Jail && !guest.cpu_pins.is_empty() {
        return Err(FleetError::Validation("jails cannot use CPU pinning".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ram_boundary_values() {
        assert!(validate_ram(MIN_RAM_BYTES - 1).is_err());
        assert!(validate_ram(MIN_RAM_BYTES).is_ok());
    }

    #[test]
    fn guest_id_boundary_values() {
        assert!(validate_guest_id(0).is_err());
        assert!(validate_guest_id(10_000).is_err());
        assert!(validate_guest_id(1).is_ok());
        assert!(validate_guest_id(9999).is_ok());
    }

    #[test]
    fn name_rejects_invalid_characters() {
        assert!(validate_name("db server!").is_err());
        assert!(validate_name("db-server_01.local").is_ok());
    }

    #[test]
    fn pci_already_reserved_is_resource_busy_not_validation() {
        let err = validate_pci_passthrough(
            &["0000:01:00.0".to_string()],
            &["0000:01:00.0".to_string()],
            &["0000:01:00.0".to_string()],
        )
        .unwrap_err();
        assert_eq!(err.kind(), "ResourceBusy");
    }
}
