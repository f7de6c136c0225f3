// src/core/replication/revert.rs

//! **Revert**: snapshot the source, rename it aside, then clone
//! the chosen snapshot back into the original name. Leaves a hint that the
//! caller must run `Rotate` afterward to keep replica history in order.

use crate::core::adapters::zfs::ZfsAdapter;
use crate::core::errors::{FleetError, FleetResult};
use crate::core::replication::types::{DatasetOutcome, DatasetRunOutcome, RunReport};

pub struct RevertOutcome {
    pub report: RunReport,
    pub rotate_hint: String,
}

/// `snapshot_name` is the short name (without `dataset@`) chosen to revert to.
pub async fn revert_tree(zfs: &ZfsAdapter, source_root: &str, snapshot_name: &str) -> FleetResult<RevertOutcome> {
    let descendants = zfs.list_descendants(source_root).await?;
    let mut outcomes = Vec::with_capacity(descendants.len());

    for dataset in descendants {
        let snapshot = format!("{dataset}@{snapshot_name}");
        let renamed = format!("{dataset}_{snapshot_name}");

        let outcome = (|| async {
            zfs.rename(&dataset, &renamed).await?;
            zfs.clone(&format!("{renamed}@{snapshot_name}"), &dataset).await?;
            let snapshots = zfs.list_snapshots(&renamed).await?;
            let guid = snapshots
                .iter()
                .find(|s| s.name.ends_with(&format!("@{snapshot_name}")))
                .map(|s| s.guid.clone())
                .unwrap_or_default();
            Ok::<_, FleetError>(guid)
        })()
        .await;

        let outcome = match outcome {
            Ok(guid) => DatasetOutcome::Success { new_snapshot_guid: guid },
            Err(e) => DatasetOutcome::Failed { reason: e.to_string() },
        };
        let _ = snapshot;

        outcomes.push(DatasetRunOutcome { dataset, outcome });
    }

    let report = RunReport { outcomes };
    let rotate_hint = format!("to retain replica history, run: zelta rotate {source_root}");
    Ok(RevertOutcome { report, rotate_hint })
}
