// SPDX-License-Identifier: BUSL-1.1
// Copyright 2025 Alfred Jean LLC

//! Shared test infrastructure: an in-process gRPC server over an
//! in-memory directory, for integration tests exercising real wire
//! behavior rather than direct handler calls.

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::auth::token;
use crate::config::{MessageSettings, TokenSettings, UserSettings};
use crate::directory::sqlite::SqliteUserRepository;
use crate::grpc::RelayGrpc;
use crate::registry::SubscriberRegistry;

/// Password-hashing parameters cheap enough for tests; production
/// defaults are deliberately too slow to run in a test suite.
pub fn test_user_settings() -> UserSettings {
    UserSettings { password_salt_len: 16, password_key_len: 16, password_time: 1, password_memory: 8, password_threads: 1 }
}

pub fn test_message_settings() -> MessageSettings {
    MessageSettings { max_payload_bytes: 65536 }
}

/// Install the process-wide token signer exactly once. Safe to call from
/// every test: later calls observe the `OnceLock` already set and are
/// ignored, matching the "init once, no re-init" lifecycle.
pub fn ensure_token_config() {
    let _ = token::init(token::TokenConfig::from(&TokenSettings {
        secret: "relay-integration-test-secret".to_owned(),
        exp_secs: 1800,
        refresh_exp_secs: 2_592_000,
    }));
}

/// A running in-process server plus the registry backing it, so tests can
/// inspect subscriber state directly as well as through the client.
pub struct TestServer {
    pub addr: std::net::SocketAddr,
    pub registry: Arc<SubscriberRegistry>,
    _handle: tokio::task::JoinHandle<()>,
}

/// Spawn a gRPC server on a random loopback port, backed by a fresh
/// in-memory SQLite directory.
pub async fn spawn_grpc_server() -> anyhow::Result<TestServer> {
    ensure_token_config();

    let pool = SqlitePool::connect("sqlite::memory:").await?;
    let directory = SqliteUserRepository::new(pool);
    directory.migrate().await.map_err(|e| anyhow::anyhow!("{e}"))?;

    let registry = Arc::new(SubscriberRegistry::new());
    let service = RelayGrpc::new(Arc::new(directory), Arc::clone(&registry), &test_user_settings(), &test_message_settings());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let incoming = tokio_stream::wrappers::TcpListenerStream::new(listener);
    let handle = tokio::spawn(async move {
        let _ = service.into_router().serve_with_incoming(incoming).await;
    });

    Ok(TestServer { addr, registry, _handle: handle })
}
