// src/core/replication/sync.rs

//! **Sync**: incremental backup from `src` to `dst`. The transfer
//! itself (seed-vs-incremental decision, resume tokens, progress,
//! cancellation) is driven by `backup::runner::BackupRunner::run_sync`,
//! which needs those concerns at the call site; this module holds the one
//! piece shared with `rotate`: the snapshot-naming convention retention
//! keys off of.

use chrono::Utc;

/// Snapshot prefix is load-bearing for retention.
pub fn zelta_snapshot_name() -> String {
    format!("zelta_{}", Utc::now().format("%Y-%m-%d_%H.%M.%S"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_name_carries_the_zelta_prefix() {
        assert!(zelta_snapshot_name().starts_with("zelta_"));
    }
}
