// src/core/adapters/mod.rs

//! C6: external adapters wrapping the ZFS, hypervisor, and jail CLIs plus
//! console PTY framing. Leaf of the dependency order — nothing
//! else in `core` depends on anything outside this module tree.

pub mod console;
pub mod hypervisor;
pub mod jail;
pub mod process;
pub mod zfs;

pub use hypervisor::HypervisorAdapter;
pub use jail::JailAdapter;
pub use zfs::ZfsAdapter;
