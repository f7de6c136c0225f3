// src/core/backup/restore.rs

//! Restore: the inverse of a sync run. Given `(target,
//! dataset, snapshot?)` the runner pulls from the target into a specified
//! destination; `{force, with_intermediates, rollback}` select whether
//! existing data is overwritten, whether intermediate snapshots are kept,
//! and whether the destination is rolled back to a specific snapshot
//! (destroying newer snapshots) rather than receiving fresh data.

use crate::core::adapters::zfs::ZfsAdapter;
use crate::core::errors::{FleetError, FleetResult, TransferKind};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

pub struct RestoreOptions {
    /// Overwrite existing data on the destination (`zfs receive -F`).
    pub force: bool,
    /// Preserve intermediate snapshots between the chosen snapshot and the
    /// target's latest (`zfs send -I` rather than a single full stream).
    pub with_intermediates: bool,
    /// Roll the destination back to `snapshot` in place instead of
    /// receiving a fresh stream; destroys newer snapshots on the destination.
    pub rollback: bool,
}

pub struct RestoreOutcome {
    pub moved_bytes: u64,
}

pub async fn restore(
    zfs: &ZfsAdapter,
    target_dataset: &str,
    destination_dataset: &str,
    snapshot: Option<&str>,
    options: RestoreOptions,
) -> FleetResult<RestoreOutcome> {
    if options.rollback {
        let snapshot = snapshot.ok_or_else(|| {
            FleetError::Validation("rollback restore requires an explicit snapshot".into())
        })?;
        let full = format!("{destination_dataset}@{snapshot}");
        zfs.rollback(&full, true).await?;
        return Ok(RestoreOutcome { moved_bytes: 0 });
    }

    let snapshots = zfs.list_snapshots(target_dataset).await?;
    let chosen = match snapshot {
        Some(name) => snapshots
            .iter()
            .find(|s| s.name.ends_with(&format!("@{name}")))
            .cloned()
            .ok_or_else(|| FleetError::NotFound(format!("snapshot {name} on {target_dataset}")))?,
        None => snapshots
            .iter()
            .max_by_key(|s| s.createtxg)
            .cloned()
            .ok_or_else(|| FleetError::NotFound(format!("any snapshot on {target_dataset}")))?,
    };

    let new_ref = format!("{target_dataset}@{}", chosen.name.rsplit('@').next().unwrap_or(&chosen.name));

    let mut send_child = if options.with_intermediates {
        let oldest_ref = snapshots
            .iter()
            .min_by_key(|s| s.createtxg)
            .map(|s| format!("{target_dataset}@{}", s.name.rsplit('@').next().unwrap_or(&s.name)))
            .unwrap_or_else(|| new_ref.clone());
        zfs.send_incremental(&oldest_ref, &new_ref).await?
    } else {
        zfs.send_full(&new_ref).await?
    };
    let mut recv_child = zfs.receive(destination_dataset, options.force, None).await?;

    let mut moved_bytes = 0u64;
    if let (Some(mut send_out), Some(mut recv_in)) = (send_child.stdout.take(), recv_child.stdin.take()) {
        let mut buf = Vec::new();
        send_out
            .read_to_end(&mut buf)
            .await
            .map_err(|e| FleetError::transfer(TransferKind::Send, e.to_string()))?;
        moved_bytes = buf.len() as u64;
        recv_in
            .write_all(&buf)
            .await
            .map_err(|e| FleetError::transfer(TransferKind::Recv, e.to_string()))?;
    }

    let send_status = send_child.wait().await.map_err(|e| FleetError::transfer(TransferKind::Send, e.to_string()))?;
    let recv_status = recv_child.wait().await.map_err(|e| FleetError::transfer(TransferKind::Recv, e.to_string()))?;

    if !send_status.success() || !recv_status.success() {
        return Err(FleetError::transfer(TransferKind::Recv, "restore send/receive exited non-zero"));
    }

    Ok(RestoreOutcome { moved_bytes })
}
