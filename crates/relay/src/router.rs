// SPDX-License-Identifier: BUSL-1.1
// Copyright 2025 Alfred Jean LLC

//! Router: fan-out of a send to every subscriber of the destination
//! user, acknowledgement aggregation, and the "any-OK" delivery decision.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::directory::UserRepository;
use crate::error::RelayError;
use crate::registry::SubscriberRegistry;
use crate::subscriber::{AckTicket, DeliveryResult, Envelope};

pub struct Router {
    directory: Arc<dyn UserRepository>,
    registry: Arc<SubscriberRegistry>,
}

impl Router {
    pub fn new(directory: Arc<dyn UserRepository>, registry: Arc<SubscriberRegistry>) -> Self {
        Self { directory, registry }
    }

    /// Fan a send out to every subscriber of `envelope.destination_name`.
    ///
    /// Algorithm:
    ///  1. resolve the caller by id, overwriting `origin_name`;
    ///  2. snapshot the destination's subscriber set, `NotFound` if absent;
    ///  3. enqueue a clone of the envelope plus a shared reply sender onto
    ///     every subscriber's inbox, blocking on inbox space;
    ///  4. collect exactly one reply per subscriber; succeed iff at least
    ///     one replied `Ok`.
    pub async fn send(&self, caller_id: &str, mut envelope: Envelope) -> Result<(), RelayError> {
        let caller = self
            .directory
            .find_by_id(caller_id)
            .await?
            .ok_or_else(|| RelayError::unauthenticated("caller is not a registered user"))?;
        envelope.origin_name = caller.name;

        let subscribers = self
            .registry
            .snapshot_for(&envelope.destination_name)
            .await
            .ok_or_else(|| RelayError::not_found("No such user"))?;

        let fanout = subscribers.len().max(1);
        let (reply_tx, mut reply_rx) = mpsc::channel::<DeliveryResult>(fanout);

        for subscriber in &subscribers {
            let ticket = AckTicket { envelope: envelope.clone(), reply: reply_tx.clone() };
            // Blocking by design: a
            // slow receiver slows its sender, it never drops a message.
            let _ = subscriber.enqueue(ticket).await;
        }
        drop(reply_tx);

        let mut any_ok = false;
        for _ in 0..subscribers.len() {
            match reply_rx.recv().await {
                Some(DeliveryResult::Ok) => any_ok = true,
                Some(DeliveryResult::NotOk) => {}
                None => break,
            }
        }

        if any_ok {
            Ok(())
        } else {
            Err(RelayError::unavailable("Peer connection returned error."))
        }
    }
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;
