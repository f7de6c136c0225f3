// src/server/mod.rs

use crate::config::Config;
use anyhow::Result;

mod connection_loop;
mod context;
mod http;
mod initialization;
mod listener;
mod metrics_server;
mod spawner;
mod stream;

pub use stream::AnyStream;

/// Orchestrates node startup: build every service, spawn background tasks,
/// then serve until shutdown.
pub async fn run(config: Config) -> Result<()> {
    let mut server_context = initialization::setup(config).await?;
    spawner::spawn_all(&mut server_context).await?;
    connection_loop::run(server_context).await;
    Ok(())
}
