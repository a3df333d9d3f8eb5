// SPDX-License-Identifier: BUSL-1.1
// Copyright 2025 Alfred Jean LLC

//! Subscriber registry: mapping `user-name → set of active
//! Subscribers`, mutated under a single reader-writer discipline.
//!
//! Invariants (kept by construction, not just convention):
//!  - a Subscriber appears at most once in its user's set.
//!  - an empty set for a key is pruned (key absent ⇔ no subscribers).
//!  - all mutations are serialised by one writer lock; readers take
//!    a shared lock and see a consistent snapshot.
//!  - a Subscriber's removal is idempotent.

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::subscriber::Subscriber;

/// Returned by [`SubscriberRegistry::add`] once the registry has entered
/// the closed state (server shutting down).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryClosed;

struct RegistryState {
    subscribers: HashMap<String, Vec<Subscriber>>,
    closed: bool,
}

/// The live, in-memory subscriber registry.
///
/// Owned and injectable (`Arc<SubscriberRegistry>`), rather than reachable
/// as a package-global, so it can be unit-tested in isolation and so
/// multiple server instances under test never share state.
pub struct SubscriberRegistry {
    state: RwLock<RegistryState>,
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self { state: RwLock::new(RegistryState { subscribers: HashMap::new(), closed: false }) }
    }

    /// Idempotent insert. A no-op error once [`Self::close_all`] has run.
    pub async fn add(&self, user_name: &str, subscriber: Subscriber) -> Result<(), RegistryClosed> {
        let mut state = self.state.write().await;
        if state.closed {
            return Err(RegistryClosed);
        }
        let set = state.subscribers.entry(user_name.to_owned()).or_default();
        if !set.iter().any(|s| s.seq() == subscriber.seq()) {
            set.push(subscriber);
        }
        Ok(())
    }

    /// Idempotent removal; prunes the key if its set becomes empty.
    pub async fn remove(&self, user_name: &str, subscriber: &Subscriber) {
        let mut state = self.state.write().await;
        if let Some(set) = state.subscribers.get_mut(user_name) {
            set.retain(|s| s.seq() != subscriber.seq());
            if set.is_empty() {
                state.subscribers.remove(user_name);
            }
        }
    }

    /// Atomic shallow copy of one user's subscriber set.
    pub async fn snapshot_for(&self, user_name: &str) -> Option<Vec<Subscriber>> {
        let state = self.state.read().await;
        state.subscribers.get(user_name).cloned()
    }

    /// Atomic shallow copy of the entire registry.
    pub async fn snapshot_all(&self) -> HashMap<String, Vec<Subscriber>> {
        let state = self.state.read().await;
        state.subscribers.clone()
    }

    /// Close the registry: flips the closed flag so no further `add` calls
    /// succeed, and drops every known `Subscriber` handle. Each Subscriber
    /// holds the sending half of its own inbox, so dropping it here closes
    /// that inbox — the corresponding Receive handler's next `recv()`
    /// observes the channel closing and returns cleanly.
    pub async fn close_all(&self) {
        let mut state = self.state.write().await;
        state.closed = true;
        state.subscribers.clear();
    }

    #[cfg(test)]
    async fn is_closed(&self) -> bool {
        self.state.read().await.closed
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
