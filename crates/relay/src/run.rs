// SPDX-License-Identifier: BUSL-1.1
// Copyright 2025 Alfred Jean LLC

//! Server bring-up — shared by `main` and integration tests.

use std::sync::Arc;

use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::auth::token;
use crate::config::Settings;
use crate::directory::sqlite::SqliteUserRepository;
use crate::grpc::RelayGrpc;
use crate::registry::SubscriberRegistry;

/// Initialize tracing/logging from config.
///
/// Uses `try_init` so it's safe to call multiple times (e.g. from tests).
pub fn init_tracing(settings: &Settings) {
    use tracing_subscriber::fmt;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.log.0.level));

    let result = match settings.log.0.format.as_str() {
        "json" => fmt::fmt().with_env_filter(filter).json().try_init(),
        _ => fmt::fmt().with_env_filter(filter).try_init(),
    };
    drop(result);
}

/// Run the relay server to completion: connect and migrate the directory
/// database, initialize the token signer, bind the gRPC listener, and
/// serve until a shutdown signal arrives.
pub async fn run(settings: Settings) -> anyhow::Result<()> {
    init_tracing(&settings);

    token::init(token::TokenConfig::from(&settings.app.token))
        .map_err(|e| anyhow::anyhow!("failed to initialize token configuration: {e}"))?;

    let connect_options = SqliteConnectOptions::new().filename(&settings.database.filepath).create_if_missing(true);
    let pool = SqlitePool::connect_with(connect_options).await?;
    let directory = SqliteUserRepository::new(pool);
    directory.migrate().await.map_err(|e| anyhow::anyhow!("failed to run database migrations: {e}"))?;

    let registry = Arc::new(SubscriberRegistry::new());
    let service = RelayGrpc::new(Arc::new(directory), Arc::clone(&registry), &settings.app.user, &settings.app.message.0);

    let listener = TcpListener::bind(&settings.server.address).await?;
    let addr = listener.local_addr()?;
    info!("gRPC listening on {addr}");

    let shutdown = CancellationToken::new();
    spawn_signal_handler(shutdown.clone());

    let incoming = tokio_stream::wrappers::TcpListenerStream::new(listener);
    let sd = shutdown.clone();
    let result = service.into_router().serve_with_incoming_shutdown(incoming, sd.cancelled_owned()).await;

    registry.close_all().await;

    if let Err(e) = &result {
        error!("gRPC server error: {e}");
    }
    result.map_err(Into::into)
}

/// Trigger shutdown on the first SIGTERM/SIGINT; force-exit on the second.
fn spawn_signal_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()).ok();
        let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt()).ok();

        tokio::select! {
            _ = async {
                if let Some(ref mut s) = sigterm { s.recv().await } else { std::future::pending().await }
            } => info!("received SIGTERM"),
            _ = async {
                if let Some(ref mut s) = sigint { s.recv().await } else { std::future::pending().await }
            } => info!("received SIGINT"),
        }
        shutdown.cancel();

        tokio::select! {
            _ = async {
                if let Some(ref mut s) = sigterm { s.recv().await } else { std::future::pending().await }
            } => info!("received SIGTERM again, forcing exit"),
            _ = async {
                if let Some(ref mut s) = sigint { s.recv().await } else { std::future::pending().await }
            } => info!("received SIGINT again, forcing exit"),
        }
        std::process::exit(130);
    });
}
