// src/core/replication/rotate.rs

//! **Rotate**: on the target, rename the current replica aside
//! as `_zelta_<ts>` and instruct the user to re-seed with a fresh backup.
//! Deliberately does not drive `Sync` itself; that is the caller's choice.

use crate::core::adapters::zfs::ZfsAdapter;
use crate::core::errors::FleetResult;
use crate::core::replication::sync::zelta_snapshot_name;

pub struct RotateOutcome {
    pub renamed_to: String,
    pub reseed_hint: String,
}

pub async fn rotate_replica(zfs: &ZfsAdapter, target_dataset: &str) -> FleetResult<RotateOutcome> {
    let suffix = zelta_snapshot_name();
    let renamed_to = format!("{target_dataset}_{suffix}");
    zfs.rename(target_dataset, &renamed_to).await?;
    Ok(RotateOutcome {
        renamed_to,
        reseed_hint: format!("run a backup against {target_dataset} to re-seed it"),
    })
}
