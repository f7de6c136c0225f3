// src/core/replication/retention.rs

//! Retention: after a successful sync, for each `(dataset,
//! prefix)` keep the newest `retain` snapshots and destroy the rest, never
//! destroying the common base of a currently-running send.

use crate::core::adapters::zfs::{SnapshotInfo, ZfsAdapter};
use crate::core::errors::FleetResult;

/// Pure selection of which snapshots to destroy, given the full list
/// (oldest-first, as `list_snapshots` returns) and the guid currently
/// protected because a send is reading from it.
pub fn snapshots_to_destroy<'a>(
    snapshots: &'a [SnapshotInfo],
    prefix: &str,
    retain: u32,
    protected_guid: Option<&str>,
) -> Vec<&'a SnapshotInfo> {
    let mut matching: Vec<&SnapshotInfo> = snapshots
        .iter()
        .filter(|s| s.name.rsplit('@').next().is_some_and(|n| n.starts_with(prefix)))
        .collect();
    matching.sort_by_key(|s| s.createtxg);

    let keep_from = matching.len().saturating_sub(retain as usize);
    matching[..keep_from]
        .iter()
        .filter(|s| Some(s.guid.as_str()) != protected_guid)
        .copied()
        .collect()
}

pub async fn apply_retention(
    zfs: &ZfsAdapter,
    dataset: &str,
    prefix: &str,
    retain: u32,
    protected_guid: Option<&str>,
) -> FleetResult<u32> {
    let snapshots = zfs.list_snapshots(dataset).await?;
    let to_destroy = snapshots_to_destroy(&snapshots, prefix, retain, protected_guid);
    let mut destroyed = 0u32;
    for snap in to_destroy {
        zfs.destroy(&snap.name, false).await?;
        destroyed += 1;
    }
    Ok(destroyed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(name: &str, guid: &str, txg: u64) -> SnapshotInfo {
        SnapshotInfo { name: name.to_string(), guid: guid.to_string(), createtxg: txg }
    }

    #[test]
    fn keeps_only_the_newest_retain_snapshots() {
        let snaps = vec![
            snap("tank/db@zelta_1", "g1", 1),
            snap("tank/db@zelta_2", "g2", 2),
            snap("tank/db@zelta_3", "g3", 3),
        ];
        let destroy = snapshots_to_destroy(&snaps, "zelta_", 1, None);
        assert_eq!(destroy.len(), 2);
        assert_eq!(destroy[0].guid, "g1");
        assert_eq!(destroy[1].guid, "g2");
    }

    #[test]
    fn never_destroys_the_protected_base() {
        let snaps = vec![snap("tank/db@zelta_1", "g1", 1), snap("tank/db@zelta_2", "g2", 2)];
        let destroy = snapshots_to_destroy(&snaps, "zelta_", 0, Some("g1"));
        assert_eq!(destroy.len(), 1);
        assert_eq!(destroy[0].guid, "g2");
    }

    #[test]
    fn ignores_snapshots_outside_the_prefix() {
        let snaps = vec![snap("tank/db@manual", "g1", 1), snap("tank/db@zelta_2", "g2", 2)];
        let destroy = snapshots_to_destroy(&snaps, "zelta_", 0, None);
        assert_eq!(destroy.len(), 1);
        assert_eq!(destroy[0].guid, "g2");
    }
}
