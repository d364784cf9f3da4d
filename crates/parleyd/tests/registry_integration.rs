//! Concurrency tests for the registry and broadcaster.
//!
//! These run many tasks against one shared registry and check that
//! membership stays consistent and broadcasts keep reaching live members
//! while others come and go.
//!
//! Tests CAN use `.unwrap()` and `.expect()` - this is allowed.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::time::Duration;

use parley_core::{ConnectionId, ConnectionInfo, Username};
use parleyd::{Broadcaster, ConnectionRecord, ConnectionWriter, Registry};
use tokio::io::{AsyncReadExt, DuplexStream};
use tokio::task::JoinSet;

const WRITE_TIMEOUT: Duration = Duration::from_secs(1);

fn member(id: u64) -> (ConnectionRecord, DuplexStream) {
    let (local, remote) = tokio::io::duplex(4096);
    let info = ConnectionInfo::new(
        ConnectionId::new(id),
        SocketAddr::from(([127, 0, 0, 1], 20000 + id as u16)),
        Username::new(format!("member{id}")),
    );
    (ConnectionRecord::new(info, ConnectionWriter::new(local)), remote)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_adds_are_all_visible() {
    let registry = Registry::new();
    let mut tasks = JoinSet::new();

    for id in 0..100 {
        let registry = registry.clone();
        tasks.spawn(async move {
            let (record, peer) = member(id);
            registry.add(record).await;
            peer
        });
    }

    let mut peers = Vec::new();
    while let Some(peer) = tasks.join_next().await {
        peers.push(peer.unwrap());
    }

    assert_eq!(registry.len().await, 100);
    let ids: HashSet<_> = registry.snapshot().await.iter().map(|r| r.id()).collect();
    assert_eq!(ids.len(), 100);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_double_remove_returns_record_once() {
    let registry = Registry::new();
    let mut peers = Vec::new();
    for id in 0..20 {
        let (record, peer) = member(id);
        registry.add(record).await;
        peers.push(peer);
    }

    // Two cleanup paths race for every id; exactly one wins each.
    let mut tasks = JoinSet::new();
    for id in 0..20 {
        for _ in 0..2 {
            let registry = registry.clone();
            tasks.spawn(async move { registry.remove(ConnectionId::new(id)).await.is_some() });
        }
    }

    let mut removed = 0;
    while let Some(result) = tasks.join_next().await {
        if result.unwrap() {
            removed += 1;
        }
    }

    assert_eq!(removed, 20);
    assert!(registry.is_empty().await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_broadcast_during_churn_reaches_stable_members() {
    let registry = Registry::new();
    let broadcaster = Broadcaster::new(registry.clone(), WRITE_TIMEOUT);

    let (stable, mut stable_peer) = member(0);
    registry.add(stable).await;

    // Members joining and leaving while broadcasts run.
    let churn = {
        let registry = registry.clone();
        tokio::spawn(async move {
            for id in 1..50 {
                let (record, _peer) = member(id);
                registry.add(record).await;
                tokio::task::yield_now().await;
                registry.remove(ConnectionId::new(id)).await;
            }
        })
    };

    for _ in 0..10 {
        broadcaster.broadcast(b"tick;", None).await;
    }
    churn.await.unwrap();

    let mut buf = vec![0u8; 64];
    let mut received = Vec::new();
    while received.len() < 50 {
        let n = stable_peer.read(&mut buf).await.unwrap();
        assert!(n > 0);
        received.extend_from_slice(&buf[..n]);
    }
    assert_eq!(received, b"tick;".repeat(10));
    assert!(registry.contains(ConnectionId::new(0)).await);
}

#[tokio::test]
async fn test_broadcast_prunes_only_dead_members() {
    let registry = Registry::new();
    let broadcaster = Broadcaster::new(registry.clone(), WRITE_TIMEOUT);

    let mut live_peers = Vec::new();
    for id in 0..5 {
        let (record, peer) = member(id);
        registry.add(record).await;
        if id % 2 == 0 {
            live_peers.push(peer);
        } else {
            drop(peer);
        }
    }

    let report = broadcaster.broadcast(b"hello", None).await;

    assert_eq!(report.delivered, 3);
    let pruned: HashSet<_> = report.pruned.into_iter().collect();
    assert_eq!(
        pruned,
        HashSet::from([ConnectionId::new(1), ConnectionId::new(3)])
    );
    assert_eq!(registry.len().await, 3);

    for peer in live_peers.iter_mut() {
        let mut buf = [0u8; 5];
        peer.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello");
    }
}
