// src/core/guest/state_machine.rs

//! VM lifecycle state machine:
//! `Undefined → Defined → Running ⇄ Paused → Shutoff → Deleted`.

use crate::core::errors::{FleetError, FleetResult};
use crate::core::guest::model::GuestLifecycleState as S;

pub fn transition(from: S, to: S) -> FleetResult<S> {
    let allowed = match (from, to) {
        (S::Undefined, S::Defined) => true,
        (S::Defined, S::Running) => true,
        (S::Running, S::Paused) => true,
        (S::Paused, S::Running) => true,
        (S::Running, S::Shutoff) => true,
        (S::Paused, S::Shutoff) => true,
        (S::Defined, S::Shutoff) => true,
        (S::Shutoff, S::Running) => true,
        (_, S::Deleted) => from != S::Running && from != S::Paused,
        _ => false,
    };

    if allowed {
        Ok(to)
    } else {
        Err(FleetError::InvalidState(format!("cannot transition {from:?} -> {to:?}")))
    }
}

/// Hardware edits touching vCPU/RAM/VNC/PPT/TPM/CPU-pinning are only
/// accepted while `Shutoff`.
pub fn requires_shutoff_for_hardware_edit(state: S) -> FleetResult<()> {
    if state == S::Shutoff {
        Ok(())
    } else {
        Err(FleetError::InvalidState(
            "hardware edits require the guest to be shutoff".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_to_shutoff_allowed_directly() {
        assert_eq!(transition(S::Running, S::Shutoff).unwrap(), S::Shutoff);
    }

    #[test]
    fn undefined_to_running_rejected() {
        assert!(transition(S::Undefined, S::Running).is_err());
    }

    #[test]
    fn deleting_a_running_guest_is_rejected() {
        assert!(transition(S::Running, S::Deleted).is_err());
    }

    #[test]
    fn shutoff_guest_can_be_deleted() {
        assert_eq!(transition(S::Shutoff, S::Deleted).unwrap(), S::Deleted);
    }

    #[test]
    fn hardware_edit_requires_shutoff() {
        assert!(requires_shutoff_for_hardware_edit(S::Running).is_err());
        assert!(requires_shutoff_for_hardware_edit(S::Shutoff).is_ok());
    }
}
