use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use wallet_replica::concurrent_engine::EngineHandle;
use wallet_replica::config::{Config, Role};
use wallet_replica::failover::FailoverManager;
use wallet_replica::orchestrator::PrimaryOrchestrator;
use wallet_replica::persistence::FileLedgerStore;
use wallet_replica::persistent_engine::PersistentEngine;
use wallet_replica::replication::{ReplicationClient, ReplicationServer};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load().context("failed to load configuration from environment")?;
    tracing::info!(role = config.role.as_str(), state_dir = %config.state_dir.display(), "starting");

    match config.role {
        Role::Primary => run_primary(config).await,
        Role::Backup => run_backup(config).await,
    }
}

async fn run_primary(config: Config) -> Result<()> {
    let store = FileLedgerStore::open(&config.state_dir, "primary")
        .with_context(|| format!("failed to open primary state dir {}", config.state_dir.display()))?;
    let engine = PersistentEngine::recover(store).context("primary WAL recovery failed, refusing to start")?;
    let engine = EngineHandle::new(engine);

    let replication = ReplicationClient::new(config.backup_addr(), config.replicate_timeout, config.ping_timeout);
    let failover = FailoverManager::new();

    let health_client = replication.clone();
    failover.spawn_health_loop(config.health_interval, move || {
        let client = health_client.clone();
        async move { client.ping().await }
    });

    let orchestrator = Arc::new(PrimaryOrchestrator::new(engine, replication, failover));
    let app = wallet_replica::http::router(orchestrator);

    let addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind HTTP edge on {addr}"))?;
    tracing::info!(%addr, "primary HTTP edge listening");

    axum::serve(listener, app).await.context("HTTP server failed")?;
    Ok(())
}

async fn run_backup(config: Config) -> Result<()> {
    let store = FileLedgerStore::open(&config.state_dir, "backup")
        .with_context(|| format!("failed to open backup state dir {}", config.state_dir.display()))?;
    let engine = PersistentEngine::recover(store).context("backup WAL recovery failed, refusing to start")?;
    let engine = EngineHandle::new(engine);

    let addr = format!("0.0.0.0:{}", config.backup_rpc_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind replication RPC on {addr}"))?;
    tracing::info!(%addr, "backup replication server listening");

    let server = ReplicationServer::new(engine);
    server.serve(listener).await.context("replication server failed")?;
    Ok(())
}
