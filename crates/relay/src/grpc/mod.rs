// SPDX-License-Identifier: BUSL-1.1
// Copyright 2025 Alfred Jean LLC

//! gRPC transport: the generated `relay.v1.Relay` service plus the
//! glue that turns it into a `tonic::transport::server::Router`.
//!
//! There is no service-wide auth interceptor here (see `session` for why);
//! each handler in `service` calls `session::authenticate` itself once it
//! knows whether its own method is token-exempt.

pub mod service;
pub mod validate;

/// Generated protobuf types for the `relay.v1` package.
pub mod proto {
    tonic::include_proto!("relay.v1");
}

use std::pin::Pin;
use std::sync::Arc;

use crate::auth::password::PasswordPolicy;
use crate::config::{MessageSettings, UserSettings};
use crate::directory::UserRepository;
use crate::prober::LivenessProber;
use crate::registry::SubscriberRegistry;
use crate::router::Router;

/// A boxed, pinned stream of `Result<T, Status>`, matching the shape
/// tonic's generated server-streaming associated types expect.
type GrpcStream<T> = Pin<Box<dyn tokio_stream::Stream<Item = Result<T, tonic::Status>> + Send + 'static>>;

/// Shared state behind every RPC handler.
pub struct RelayGrpc {
    directory: Arc<dyn UserRepository>,
    registry: Arc<SubscriberRegistry>,
    router: Router,
    prober: LivenessProber,
    password_policy: PasswordPolicy,
    max_payload_bytes: usize,
}

impl RelayGrpc {
    pub fn new(
        directory: Arc<dyn UserRepository>,
        registry: Arc<SubscriberRegistry>,
        user_settings: &UserSettings,
        message_settings: &MessageSettings,
    ) -> Self {
        let router = Router::new(Arc::clone(&directory), Arc::clone(&registry));
        let prober = LivenessProber::new(Arc::clone(&registry));
        Self {
            directory,
            registry,
            router,
            prober,
            password_policy: PasswordPolicy::from(user_settings),
            max_payload_bytes: message_settings.max_payload_bytes,
        }
    }

    /// Build a [`tonic`] router for this service. There is no interceptor
    /// to attach here — see the module doc.
    pub fn into_router(self) -> tonic::transport::server::Router {
        tonic::transport::Server::builder().add_service(proto::relay_server::RelayServer::new(self))
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
