// src/core/replication/clone.rs

//! **Clone**: shallow, same-host duplication. Snapshot the
//! source tree once, then `zfs clone` every descendant from that single
//! snapshot into a sibling destination tree. Not meant for cross-host use.

use crate::core::adapters::zfs::ZfsAdapter;
use crate::core::errors::{FleetError, FleetResult};
use crate::core::replication::sync::zelta_snapshot_name;
use crate::core::replication::types::{DatasetOutcome, DatasetRunOutcome, RunReport};

/// `source_root` and `destination_root` are dataset paths; each descendant
/// of `source_root` is cloned into the matching path under `destination_root`.
pub async fn clone_tree(zfs: &ZfsAdapter, source_root: &str, destination_root: &str) -> FleetResult<RunReport> {
    let snap_name = zelta_snapshot_name();
    zfs.create_snapshot(source_root, &snap_name, true).await?;

    let descendants = zfs.list_descendants(source_root).await?;
    let mut outcomes = Vec::with_capacity(descendants.len());

    for dataset in descendants {
        let suffix = dataset.strip_prefix(source_root).unwrap_or("");
        let target = format!("{destination_root}{suffix}");
        let snapshot = format!("{dataset}@{snap_name}");

        let outcome = match zfs.clone(&snapshot, &target).await {
            Ok(()) => {
                let snapshots = zfs.list_snapshots(&dataset).await.unwrap_or_default();
                let guid = snapshots
                    .iter()
                    .find(|s| s.name == snapshot)
                    .map(|s| s.guid.clone())
                    .unwrap_or_default();
                DatasetOutcome::Success { new_snapshot_guid: guid }
            }
            Err(FleetError::AlreadyExists(_)) => DatasetOutcome::Skipped {
                reason: format!("{target} already exists"),
            },
            Err(e) => DatasetOutcome::Failed { reason: e.to_string() },
        };

        outcomes.push(DatasetRunOutcome { dataset, outcome });
    }

    Ok(RunReport { outcomes })
}
