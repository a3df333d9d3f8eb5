// SPDX-License-Identifier: BUSL-1.1
// Copyright 2025 Alfred Jean LLC

use super::*;
use crate::subscriber::Subscriber;

#[tokio::test]
async fn probe_all_delivers_a_self_addressed_probe_to_every_subscriber() {
    let registry = Arc::new(SubscriberRegistry::new());
    let (sub, mut rx) = Subscriber::new("alice");
    registry.add("alice", sub).await.unwrap();

    let consumer = tokio::spawn(async move {
        let ticket = rx.recv().await.unwrap();
        assert_eq!(ticket.envelope.destination_name, "alice");
        assert!(ticket.envelope.payload.is_empty());
        let _ = ticket.reply.send(DeliveryResult::Ok).await;
    });

    let prober = LivenessProber::new(registry);
    prober.probe_all().await;
    consumer.await.unwrap();
}

#[tokio::test]
async fn probe_all_skips_a_full_inbox_without_blocking() {
    let registry = Arc::new(SubscriberRegistry::new());
    let (sub, _rx) = Subscriber::new("alice");
    // Never drained: the prober must not block waiting for space, since
    // try_enqueue is non-blocking.
    registry.add("alice", sub).await.unwrap();

    let prober = LivenessProber::new(registry);
    tokio::time::timeout(Duration::from_secs(1), prober.probe_all())
        .await
        .expect("probe_all must return promptly even when every inbox is uncontested");
}

#[tokio::test]
async fn connected_users_excludes_the_caller() {
    let registry = Arc::new(SubscriberRegistry::new());
    let (alice, mut rx_a) = Subscriber::new("alice");
    let (bob, mut rx_b) = Subscriber::new("bob");
    registry.add("alice", alice).await.unwrap();
    registry.add("bob", bob).await.unwrap();

    let ca = tokio::spawn(async move {
        while let Some(ticket) = rx_a.recv().await {
            let _ = ticket.reply.send(DeliveryResult::Ok).await;
        }
    });
    let cb = tokio::spawn(async move {
        while let Some(ticket) = rx_b.recv().await {
            let _ = ticket.reply.send(DeliveryResult::Ok).await;
        }
    });

    let prober = LivenessProber::new(Arc::clone(&registry));
    let mut names = prober.connected_users(Some("alice")).await;
    names.sort();
    assert_eq!(names, vec!["bob"]);

    drop(registry);
    ca.abort();
    cb.abort();
}
