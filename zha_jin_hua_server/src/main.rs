use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::info;
use tracing_subscriber::EnvFilter;
use zha_jin_hua_core::{RoomLimits, SystemClock};
use zha_jin_hua_server::config::ServerConfig;
use zha_jin_hua_server::coordinator::Coordinator;
use zha_jin_hua_server::notify::{self, Connections};
use zha_jin_hua_server::store::{InMemoryLedger, InMemoryRoomStore};
use zha_jin_hua_server::ws::{self, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::parse();
    let listen = config.listen;

    let (outbox, deliveries) = notify::outbox();
    let (coordinator, timers) = Coordinator::new(
        config,
        RoomLimits::default(),
        Arc::new(InMemoryRoomStore::default()),
        Arc::new(InMemoryLedger::default()),
        Arc::new(SystemClock),
        StdRng::from_os_rng(),
        outbox,
    );
    tokio::spawn(coordinator.clone().run_timers(timers));

    let connections = Arc::new(Connections::default());
    tokio::spawn(notify::dispatch(connections.clone(), deliveries));

    let app = ws::router(AppState { coordinator, connections });

    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .with_context(|| format!("无法监听 {}", listen))?;
    info!("服务器正在监听 {}", listen);
    axum::serve(listener, app).await.context("服务器异常退出")?;
    Ok(())
}
