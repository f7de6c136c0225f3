// src/server/connection_loop.rs

//! Drives the HTTP/WS server to completion and coordinates graceful shutdown
//! with every background task spawned by `spawner::spawn_all`.

use super::context::ServerContext;
use std::time::Duration;
use tracing::{error, info, warn};

#[cfg(windows)]
use tokio::signal;
#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

/// Waits for the operating system's shutdown request: SIGINT/SIGTERM on
/// Unix, Ctrl+C on Windows.
async fn await_shutdown_signal() {
    #[cfg(unix)]
    let mut sigint = signal(SignalKind::interrupt()).expect("failed to register SIGINT handler");
    #[cfg(unix)]
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to register SIGTERM handler");

    #[cfg(windows)]
    let mut ctrl_c = signal::ctrl_c();

    tokio::select! {
        _ = async { #[cfg(unix)] { sigint.recv().await; info!("SIGINT received, initiating graceful shutdown"); } } => {},
        _ = async { #[cfg(unix)] { sigterm.recv().await; info!("SIGTERM received, initiating graceful shutdown"); } } => {},
        _ = async { #[cfg(windows)] { let _ = (&mut ctrl_c).await; info!("Ctrl-C received, initiating graceful shutdown"); } } => {},
    }
}

/// Serves the HTTP/WS API until shutdown, then waits (with a bounded
/// timeout) for every background task to finish.
pub async fn run(mut ctx: ServerContext) {
    let app = super::http::routes::build_router(ctx.state.clone());
    let listener = ctx.listener;
    let mut shutdown_rx_serve = ctx.shutdown_tx.subscribe();

    let serve_task = tokio::spawn(async move {
        axum::serve(listener, app.into_make_service())
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx_serve.changed().await;
            })
            .await
    });

    tokio::select! {
        biased;

        _ = await_shutdown_signal() => {}

        Some(res) = ctx.background_tasks.join_next() => {
            match res {
                Ok(Ok(())) => info!("a background task exited on its own"),
                Ok(Err(e)) => error!("background task failed: {e}"),
                Err(e) => error!("background task panicked: {e:?}"),
            }
        }
    }

    info!("shutting down, signaling all tasks");
    if ctx.shutdown_tx.send(true).is_err() {
        error!("failed to broadcast shutdown signal; some tasks may not terminate gracefully");
    }

    if let Err(e) = serve_task.await {
        error!("http server task panicked: {e:?}");
    }
    info!("http server stopped accepting connections");

    info!("waiting for background tasks to finish");
    if tokio::time::timeout(Duration::from_secs(10), async {
        while ctx.background_tasks.join_next().await.is_some() {}
    })
    .await
    .is_err()
    {
        warn!("timed out waiting for background tasks to finish cleanly");
    }

    info!("server shutdown complete");
}
