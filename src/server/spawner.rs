// src/server/spawner.rs

//! Spawns every long-running background task onto the context's `JoinSet`.

use super::context::ServerContext;
use super::metrics_server;
use crate::core::backup::runner::BackupRunner;
use anyhow::Result;
use std::time::Duration;
use tracing::{info, warn};

const USAGE_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Spawns the scheduler tick loop, the backup dispatcher, the usage-stats
/// poller and (if enabled) the metrics server into `ctx.background_tasks`.
pub async fn spawn_all(ctx: &mut ServerContext) -> Result<()> {
    let state = ctx.state.clone();
    let shutdown_tx = ctx.shutdown_tx.clone();
    let tasks = &mut ctx.background_tasks;

    let metrics_enabled = state.config.lock().await.metrics.enabled;
    if metrics_enabled {
        let metrics_state = state.clone();
        let shutdown_rx = shutdown_tx.subscribe();
        tasks.spawn(async move {
            metrics_server::run(metrics_state, shutdown_rx).await;
            Ok(())
        });
    } else {
        info!("metrics server disabled by configuration");
    }

    let scheduler_state = state.clone();
    let shutdown_rx_scheduler = shutdown_tx.subscribe();
    tasks.spawn(async move {
        scheduler_state.backup_scheduler.run(shutdown_rx_scheduler).await;
        Ok(())
    });

    let dispatcher_state = state.clone();
    let mut work_rx = std::mem::replace(&mut ctx.backup_work_rx, tokio::sync::mpsc::channel(1).1);
    let mut shutdown_rx_dispatch = shutdown_tx.subscribe();
    tasks.spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx_dispatch.changed() => {
                    if *shutdown_rx_dispatch.borrow() {
                        break;
                    }
                }
                run = work_rx.recv() => {
                    let Some(run) = run else { break };
                    let state = dispatcher_state.clone();
                    let cancel = shutdown_rx_dispatch.clone();
                    tokio::spawn(async move {
                        dispatch_run(state, run, cancel).await;
                    });
                }
            }
        }
        Ok(())
    });

    let stats_state = state.clone();
    let mut shutdown_rx_stats = shutdown_tx.subscribe();
    tasks.spawn(async move {
        let mut ticker = tokio::time::interval(USAGE_POLL_INTERVAL);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let ts = chrono::Utc::now().timestamp();
                    stats_state.guests.poll_usage_stats(ts).await;
                }
                _ = shutdown_rx_stats.changed() => {
                    if *shutdown_rx_stats.borrow() {
                        break;
                    }
                }
            }
        }
        Ok(())
    });

    info!("all background tasks have been spawned");
    Ok(())
}

/// Runs one dispatched job, skipping it if this node isn't its designated
/// runner.
async fn dispatch_run(
    state: std::sync::Arc<super::context::ServerState>,
    run: crate::core::backup::scheduler::ScheduledRun,
    cancel: tokio::sync::watch::Receiver<bool>,
) {
    let fsm = state.cluster.fsm();
    let Some(job) = fsm.backup_jobs.get(&run.job_id).cloned() else {
        warn!(job_id = %run.job_id, "dispatched job vanished before it could run");
        return;
    };
    let designated_runner = job.runner_node.unwrap_or_else(|| {
        state.cluster.current_leader().unwrap_or(state.cluster.self_id)
    });
    if designated_runner != state.cluster.self_id {
        return;
    }
    let Some(target) = fsm.backup_targets.get(&job.target_id).cloned() else {
        warn!(job_id = %job.id, target_id = %job.target_id, "job references an unknown target");
        return;
    };
    if !target.enabled {
        warn!(job_id = %job.id, target_id = %target.id, "job's target is disabled, skipping run");
        return;
    }

    let runner = BackupRunner::new(state.cluster.clone(), state.replication.clone(), state.zfs.clone());
    if let Err(e) = runner.run(&job, &target.endpoint, cancel).await {
        warn!(job_id = %job.id, error = %e, "backup run failed");
    }
}
