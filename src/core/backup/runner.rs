// src/core/backup/runner.rs

//! Drives a single backup run: replicates `BackupEventStart`,
//! streams the transfer with a bandwidth throttle and rate-limited
//! progress, then replicates `BackupEventComplete`.

use crate::core::adapters::zfs::ZfsAdapter;
use crate::core::backup::model::{BackupEventStatus, BackupJob, ReplicationMode};
use crate::core::cluster::{ClusterCommandKind, ClusterHandle};
use crate::core::errors::{FleetError, FleetResult, TransferKind};
use crate::core::replication::match_engine::compute_match;
use crate::core::replication::sync::zelta_snapshot_name;
use crate::core::replication::ReplicationEngine;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::watch;
use tracing::{info, warn};
use uuid::Uuid;

const PROGRESS_INTERVAL: Duration = Duration::from_secs(2);
const CHUNK_SIZE: usize = 64 * 1024;

pub struct BackupRunner {
    cluster: Arc<ClusterHandle>,
    replication: Arc<ReplicationEngine>,
    zfs: Arc<ZfsAdapter>,
}

impl BackupRunner {
    pub fn new(cluster: Arc<ClusterHandle>, replication: Arc<ReplicationEngine>, zfs: Arc<ZfsAdapter>) -> Self {
        Self { cluster, replication, zfs }
    }

    /// Runs `job` to completion, honouring `cancel` (set to `true` to
    /// request an interrupt). Always replicates exactly one terminal
    /// `BackupEventComplete`, per spec's "set once" lifecycle invariant.
    pub async fn run(&self, job: &BackupJob, target_endpoint: &str, mut cancel: watch::Receiver<bool>) -> FleetResult<()> {
        let started_at = now_epoch();
        let event_id = Uuid::new_v4();

        self.cluster
            .propose(ClusterCommandKind::BackupEventStart {
                id: event_id,
                job_id: Some(job.id),
                source_dataset: job.source_dataset.clone(),
                target_endpoint: target_endpoint.to_string(),
                mode: job.mode,
                started_at,
            })
            .await?;

        let result = match job.mode {
            ReplicationMode::Sync => {
                self.run_sync(job, target_endpoint, event_id, &mut cancel).await
            }
            ReplicationMode::Clone => self
                .replication
                .clone_tree(&job.source_dataset, target_endpoint)
                .await
                .map(|r| r.total_moved_hint() as u64),
            ReplicationMode::Revert => self
                .replication
                .revert(&job.source_dataset, target_endpoint)
                .await
                .map(|r| r.report.total_moved_hint() as u64),
            ReplicationMode::Rotate => self.replication.rotate(target_endpoint).await.map(|_| 0u64),
        };

        let (status, error_kind, final_bytes) = match result {
            Ok(bytes) => (BackupEventStatus::Success, None, bytes),
            Err(FleetError::Cancelled) => (BackupEventStatus::Interrupted, None, 0),
            Err(e) => (BackupEventStatus::Failed, Some(e.kind().to_string()), 0),
        };

        self.cluster
            .propose(ClusterCommandKind::BackupEventComplete {
                id: event_id,
                status,
                error_kind,
                completed_at: now_epoch(),
                final_bytes,
            })
            .await?;

        info!(job_id = %job.id, event_id = %event_id, ?status, "backup run finished");
        Ok(())
    }

    async fn run_sync(
        &self,
        job: &BackupJob,
        target_endpoint: &str,
        event_id: Uuid,
        cancel: &mut watch::Receiver<bool>,
    ) -> FleetResult<u64> {
        // Serializes concurrent runs against the same source, matching the
        // locking clone/revert/rotate already go through via `ReplicationEngine`.
        let _lock = self.replication.lock_for_sync(&job.source_dataset).await;

        let destination_exists = self.zfs.dataset_info(target_endpoint).await.is_ok();
        let source_snapshots = self.zfs.list_snapshots(&job.source_dataset).await?;
        let destination_snapshots = if destination_exists {
            self.zfs.list_snapshots(target_endpoint).await?
        } else {
            Vec::new()
        };
        let matched = compute_match(destination_exists, &source_snapshots, &destination_snapshots);
        if matched.diverged {
            return Err(FleetError::transfer(
                TransferKind::Divergence,
                format!("{target_endpoint} has diverged from {}", job.source_dataset),
            ));
        }

        let snap_name = zelta_snapshot_name();
        self.zfs.create_snapshot(&job.source_dataset, &snap_name, false).await?;
        let new_ref = format!("{}@{snap_name}", job.source_dataset);
        let new_snapshot_guid = self
            .zfs
            .list_snapshots(&job.source_dataset)
            .await?
            .into_iter()
            .find(|s| s.name.ends_with(&snap_name))
            .map(|s| s.guid)
            .ok_or_else(|| FleetError::Internal("snapshot vanished immediately after creation".into()))?;

        // Continue a previously interrupted receive before falling back to
        // a fresh incremental/full stream.
        let resume_token = self.zfs.receive_resume_token(target_endpoint).await.unwrap_or(None);

        let mut send_child = match &matched.common_base {
            Some(base) => {
                let base_ref = format!("{}@{}", job.source_dataset, base.name.rsplit('@').next().unwrap_or(&base.name));
                self.zfs.send_incremental(&base_ref, &new_ref).await?
            }
            // No common snapshot and nothing on the destination yet: seed it
            // with a full send instead of failing every first-ever run.
            None if !destination_exists => self.zfs.send_full(&new_ref).await?,
            None => {
                return Err(FleetError::transfer(
                    TransferKind::MissingBase,
                    format!("no common base for {}", job.source_dataset),
                ));
            }
        };
        let mut recv_child = self.zfs.receive(target_endpoint, false, resume_token.as_deref()).await?;

        let mut send_out = send_child.stdout.take().ok_or_else(|| FleetError::Internal("zfs send has no stdout".into()))?;
        let mut recv_in = recv_child.stdin.take().ok_or_else(|| FleetError::Internal("zfs receive has no stdin".into()))?;

        let limiter = job.bandwidth_limit_bytes_per_sec;
        let mut moved_bytes: u64 = 0;
        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut last_progress = Instant::now();

        loop {
            tokio::select! {
                biased;
                _ = cancel.changed() => {
                    if *cancel.borrow() {
                        send_child.kill().await.ok();
                        recv_child.kill().await.ok();
                        return Err(FleetError::Cancelled);
                    }
                }
                read = send_out.read(&mut buf) => {
                    let n = read.map_err(|e| FleetError::transfer(TransferKind::Send, e.to_string()))?;
                    if n == 0 {
                        break;
                    }
                    recv_in.write_all(&buf[..n]).await.map_err(|e| FleetError::transfer(TransferKind::Recv, e.to_string()))?;
                    moved_bytes += n as u64;

                    if let Some(limit) = limiter {
                        if limit > 0 {
                            let expected = Duration::from_secs_f64(n as f64 / limit as f64);
                            tokio::time::sleep(expected).await;
                        }
                    }

                    if last_progress.elapsed() >= PROGRESS_INTERVAL {
                        last_progress = Instant::now();
                        if let Err(e) = self
                            .cluster
                            .propose(ClusterCommandKind::BackupEventProgress {
                                id: event_id,
                                moved_bytes,
                                total_bytes: 0,
                            })
                            .await
                        {
                            warn!(error = %e, "failed to replicate backup progress");
                        }
                    }
                }
            }
        }

        recv_in.flush().await.ok();
        drop(recv_in);

        let send_status = send_child.wait().await.map_err(|e| FleetError::transfer(TransferKind::Send, e.to_string()))?;
        let recv_status = recv_child.wait().await.map_err(|e| FleetError::transfer(TransferKind::Recv, e.to_string()))?;

        if !send_status.success() || !recv_status.success() {
            return Err(FleetError::transfer(TransferKind::Recv, "zfs send/receive exited non-zero"));
        }

        // Release the transfer lock before retention re-acquires it per
        // dataset; `apply_retention` takes its own guard and this task
        // already holds the source's.
        drop(_lock);

        // Retention runs on both ends: the source accumulates a `zelta_`
        // snapshot per run forever otherwise, and the destination mirrors
        // the same names via receive. The snapshot just sent is protected
        // on both sides since it's the next run's common base.
        for dataset in [job.source_dataset.as_str(), target_endpoint] {
            if let Err(e) = self
                .replication
                .apply_retention(
                    dataset,
                    &job.retention_policy.prefix,
                    job.retention_policy.retain,
                    Some(&new_snapshot_guid),
                )
                .await
            {
                warn!(error = %e, dataset, "retention pass failed after successful sync");
            }
        }

        Ok(moved_bytes)
    }
}

fn now_epoch() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
