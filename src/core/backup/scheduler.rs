// src/core/backup/scheduler.rs

//! The 1 Hz timer wheel: "a per-cluster timer wheel, evaluated
//! every second on the leader, enqueues ready jobs into a work channel keyed
//! by `job_id`. If a job is already running the tick is dropped."

use crate::core::backup::model::BackupJob;
use crate::core::backup::schedule::JobSchedule;
use crate::core::cluster::ClusterHandle;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

pub const TICK_INTERVAL: std::time::Duration = std::time::Duration::from_secs(1);

/// A ready-to-run job handed to the dispatcher. `manual` distinguishes a
/// `RunNow` request, which bypasses the schedule but not the concurrency rule.
#[derive(Debug, Clone)]
pub struct ScheduledRun {
    pub job_id: Uuid,
    pub manual: bool,
}

pub struct BackupScheduler {
    cluster: Arc<ClusterHandle>,
    last_fired: DashMap<Uuid, DateTime<Utc>>,
    work_tx: mpsc::Sender<ScheduledRun>,
}

impl BackupScheduler {
    pub fn new(cluster: Arc<ClusterHandle>) -> (Self, mpsc::Receiver<ScheduledRun>) {
        let (work_tx, work_rx) = mpsc::channel(64);
        (Self { cluster, last_fired: DashMap::new(), work_tx }, work_rx)
    }

    /// Manual `RunNow`: enqueues immediately, still subject to the
    /// at-most-one-concurrent-run check performed by the dispatcher.
    pub async fn run_now(&self, job_id: Uuid) -> bool {
        self.work_tx.send(ScheduledRun { job_id, manual: true }).await.is_ok()
    }

    /// Runs the 1 Hz loop until `cancel` fires. Only the leader dispatches;
    /// followers observe the same jobs but stay idle.
    pub async fn run(&self, mut cancel: tokio::sync::watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(TICK_INTERVAL);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if self.cluster.is_leader() {
                        self.tick(Utc::now()).await;
                    }
                }
                _ = cancel.changed() => {
                    if *cancel.borrow() {
                        break;
                    }
                }
            }
        }
    }

    async fn tick(&self, now: DateTime<Utc>) {
        let fsm = self.cluster.fsm();
        for job in fsm.backup_jobs.values() {
            if !job.enabled {
                continue;
            }
            if !fsm.running_events_for_job(job.id).is_empty() {
                debug!(job_id = %job.id, "tick dropped: job already running");
                continue;
            }
            if self.job_due(job, now) {
                self.last_fired.insert(job.id, now);
                if self.work_tx.send(ScheduledRun { job_id: job.id, manual: false }).await.is_err() {
                    warn!(job_id = %job.id, "backup dispatcher channel closed");
                }
            }
        }
    }

    fn job_due(&self, job: &BackupJob, now: DateTime<Utc>) -> bool {
        let schedule = match JobSchedule::parse(&job.schedule) {
            Ok(s) => s,
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "job has an unparsable schedule, skipping");
                return false;
            }
        };
        let last = self.last_fired.get(&job.id).map(|r| *r);
        schedule.should_fire(now, last)
    }
}
