// src/core/replication/match_engine.rs

//! **Match**: pure functions over adapter-returned snapshot
//! lists so common-base/divergence detection is unit-testable without a
//! real ZFS pool.

use crate::core::adapters::zfs::SnapshotInfo;

#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub destination_exists: bool,
    /// The most recent snapshot present on both sides, chosen by the
    /// highest `createtxg` on ambiguity.
    pub common_base: Option<SnapshotInfo>,
    /// True when the destination holds snapshots not reachable from the
    /// common base — i.e. it was mutated independently of the source.
    pub diverged: bool,
}

/// Computes Match(src, dst) from each side's snapshot list, both already
/// ordered oldest-first by `createtxg` (as returned by `ZfsAdapter::list_snapshots`).
pub fn compute_match(
    destination_exists: bool,
    source_snapshots: &[SnapshotInfo],
    destination_snapshots: &[SnapshotInfo],
) -> MatchResult {
    if !destination_exists {
        return MatchResult { destination_exists: false, common_base: None, diverged: false };
    }

    let common_base = source_snapshots
        .iter()
        .filter(|s| destination_snapshots.iter().any(|d| d.guid == s.guid))
        .max_by_key(|s| s.createtxg)
        .cloned();

    let diverged = match &common_base {
        Some(base) => destination_snapshots.iter().any(|d| d.createtxg > base.createtxg && d.guid != base.guid),
        None => !destination_snapshots.is_empty(),
    };

    MatchResult { destination_exists: true, common_base, diverged }
}

/// Snapshots on `src` strictly after `common_base`.
pub fn snapshots_after<'a>(source_snapshots: &'a [SnapshotInfo], common_base: Option<&SnapshotInfo>) -> Vec<&'a SnapshotInfo> {
    match common_base {
        Some(base) => source_snapshots.iter().filter(|s| s.createtxg > base.createtxg).collect(),
        None => source_snapshots.iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(name: &str, guid: &str, txg: u64) -> SnapshotInfo {
        SnapshotInfo { name: name.to_string(), guid: guid.to_string(), createtxg: txg }
    }

    #[test]
    fn no_destination_yields_no_common_base() {
        let result = compute_match(false, &[snap("a@1", "g1", 1)], &[]);
        assert!(!result.destination_exists);
        assert!(result.common_base.is_none());
        assert!(!result.diverged);
    }

    #[test]
    fn picks_highest_createtxg_common_base_on_ambiguity() {
        let src = vec![snap("a@1", "g1", 1), snap("a@2", "g2", 2)];
        let dst = vec![snap("b@1", "g1", 1), snap("b@2", "g2", 2)];
        let result = compute_match(true, &src, &dst);
        assert_eq!(result.common_base.unwrap().guid, "g2");
        assert!(!result.diverged);
    }

    #[test]
    fn detects_divergence_when_dst_has_snapshot_not_on_src() {
        let src = vec![snap("a@1", "g1", 1)];
        let dst = vec![snap("b@1", "g1", 1), snap("b@extra", "gX", 5)];
        let result = compute_match(true, &src, &dst);
        assert!(result.diverged);
    }

    #[test]
    fn snapshots_after_base_excludes_the_base_itself() {
        let src = vec![snap("a@1", "g1", 1), snap("a@2", "g2", 2), snap("a@3", "g3", 3)];
        let base = snap("a@1", "g1", 1);
        let after = snapshots_after(&src, Some(&base));
        assert_eq!(after.len(), 2);
        assert_eq!(after[0].guid, "g2");
    }
}
