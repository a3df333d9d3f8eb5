// SPDX-License-Identifier: BUSL-1.1
// Copyright 2025 Alfred Jean LLC

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

/// Bounded FIFO depth between Router/Prober (producers) and one Subscriber
/// (consumer). A small buffer absorbs bursts without permitting
/// unbounded backlog.
pub const INBOX_CAPACITY: usize = 10;

/// An opaque, addressable application payload routed from Send to Receive.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub origin_name: String,
    pub destination_name: String,
    pub payload: Vec<u8>,
}

/// A single subscriber's verdict on one delivered envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryResult {
    Ok,
    NotOk,
}

/// An envelope paired with the fan-out's shared reply channel, queued onto
/// a subscriber's inbox. Every subscriber holds its own clone of `reply`
/// (an `mpsc::Sender`) and must send exactly one [`DeliveryResult`] on it
/// before moving on to the next inbox item.
pub struct AckTicket {
    pub envelope: Envelope,
    pub reply: mpsc::Sender<DeliveryResult>,
}

static NEXT_SUBSCRIBER_SEQ: AtomicU64 = AtomicU64::new(0);

/// A live receive stream for one authenticated user.
///
/// Cloning a `Subscriber` clones the cheap parts (name, sequence id, inbox
/// sender); the Registry and the owning Receive handler each hold their
/// own clone, and equality/identity is governed by `seq`, never by
/// inbox-sender pointer equality, so a Subscriber can be located and
/// removed from the registry regardless of how many clones exist.
#[derive(Clone)]
pub struct Subscriber {
    pub user_name: Arc<str>,
    seq: u64,
    inbox: mpsc::Sender<AckTicket>,
}

impl Subscriber {
    /// Create a new subscriber and its bounded inbox, returning the
    /// subscriber handle (for the Registry) and the receiving half (for
    /// the Receive handler's consume loop).
    pub fn new(user_name: impl Into<Arc<str>>) -> (Self, mpsc::Receiver<AckTicket>) {
        let (tx, rx) = mpsc::channel(INBOX_CAPACITY);
        let seq = NEXT_SUBSCRIBER_SEQ.fetch_add(1, Ordering::Relaxed);
        (Self { user_name: user_name.into(), seq, inbox: tx }, rx)
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Blocking enqueue: waits for inbox space. Used by the Router
    /// for lossless, backpressure-by-design delivery.
    pub async fn enqueue(&self, ticket: AckTicket) -> Result<(), AckTicket> {
        self.inbox.send(ticket).await.map_err(|e| e.0)
    }

    /// Non-blocking enqueue: used by the Liveness Prober, which
    /// gains no signal from waiting on a congested inbox.
    pub fn try_enqueue(&self, ticket: AckTicket) -> Result<(), AckTicket> {
        self.inbox.try_send(ticket).map_err(|e| match e {
            mpsc::error::TrySendError::Full(t) | mpsc::error::TrySendError::Closed(t) => t,
        })
    }
}

impl PartialEq for Subscriber {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl Eq for Subscriber {}

impl std::hash::Hash for Subscriber {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.seq.hash(state);
    }
}

impl std::fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber").field("user_name", &self.user_name).field("seq", &self.seq).finish()
    }
}
