// SPDX-License-Identifier: BUSL-1.1
// Copyright 2025 Alfred Jean LLC

//! Liveness Prober: an on-demand, bounded-wait probe round used to
//! derive "currently connected" from registry membership, since membership
//! alone cannot detect a half-open connection.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::mpsc;
use tokio::time::timeout;

use crate::registry::SubscriberRegistry;
use crate::subscriber::{AckTicket, DeliveryResult, Envelope};

/// Bound on how long the prober waits for a single subscriber's reply.
const PROBE_TIMEOUT: Duration = Duration::from_millis(50);

pub struct LivenessProber {
    registry: Arc<SubscriberRegistry>,
}

impl LivenessProber {
    pub fn new(registry: Arc<SubscriberRegistry>) -> Self {
        Self { registry }
    }

    /// Run one probe round over every subscriber currently in the
    /// registry. Does not mutate the registry itself — a subscriber that
    /// fails to accept or answer a probe is pruned only when its own
    /// Receive handler next exits (self-filter + removal).
    pub async fn probe_all(&self) {
        let all = self.registry.snapshot_all().await;

        let tasks = all.into_iter().flat_map(|(user_name, subscribers)| {
            subscribers.into_iter().map(move |subscriber| {
                let user_name = user_name.clone();
                tokio::spawn(async move {
                    let probe = Envelope { origin_name: String::new(), destination_name: user_name, payload: Vec::new() };
                    let (reply_tx, mut reply_rx) = mpsc::channel::<DeliveryResult>(1);
                    let ticket = AckTicket { envelope: probe, reply: reply_tx };

                    if subscriber.try_enqueue(ticket).is_err() {
                        // Inbox full: either live-but-congested or already
                        // consuming. No signal gained from waiting.
                        return;
                    }
                    let _ = timeout(PROBE_TIMEOUT, reply_rx.recv()).await;
                })
            })
        });

        join_all(tasks).await;
    }

    /// Names of users with at least one subscriber that survived the most
    /// recent probe round, excluding `exclude_name` if given.
    pub async fn connected_users(&self, exclude_name: Option<&str>) -> Vec<String> {
        self.probe_all().await;
        self.registry
            .snapshot_all()
            .await
            .into_keys()
            .filter(|name| Some(name.as_str()) != exclude_name)
            .collect()
    }
}

#[cfg(test)]
#[path = "prober_tests.rs"]
mod tests;
