//! Concurrency stress tests for the store and engine.
//!
//! These tests verify behaviour under contention:
//! - Many watchers racing a single publication
//! - Concurrent mutations of one node losing no update
//! - 1000+ nodes written and read in parallel
//!
//! Run with: `cargo test --package snapstore-integration-tests --test stress_tests -- --nocapture`

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use snapstore::prelude::*;
use snapstore_integration_tests::init_tracing;
use tokio::sync::Barrier;

const WATCHERS: usize = 256;

/// Watches registered with `v0` race a concurrent `set(v1)`; each must see
/// `v1` exactly once.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_watchers_see_publication_once() {
    init_tracing();
    for round in 0..20 {
        let store = Arc::new(ShardedStore::new());
        let node = NodeKey::new(format!("node-{}", round));
        store.set_snapshot(&node, Snapshot::empty("v0"));

        let barrier = Arc::new(Barrier::new(WATCHERS + 1));
        let mut tasks = Vec::with_capacity(WATCHERS);
        for _ in 0..WATCHERS {
            let store = Arc::clone(&store);
            let node = node.clone();
            let barrier = Arc::clone(&barrier);
            tasks.push(tokio::spawn(async move {
                barrier.wait().await;
                let mut watch = store.watch(&node, Some(&Version::new("v0")));
                let event = tokio::time::timeout(Duration::from_secs(10), watch.next())
                    .await
                    .expect("watch resolved");
                let version = event.snapshot().map(|s| s.version().to_string());
                // Nothing else is published, so a second delivery is impossible
                (version, watch.try_next().is_none())
            }));
        }

        let publisher = {
            let store = Arc::clone(&store);
            let node = node.clone();
            let barrier = Arc::clone(&barrier);
            tokio::spawn(async move {
                barrier.wait().await;
                store.set_snapshot(&node, Snapshot::empty("v1"));
            })
        };

        publisher.await.expect("publisher panicked");
        for result in join_all(tasks).await {
            let (version, exactly_once) = result.expect("watcher panicked");
            assert_eq!(version.as_deref(), Some("v1"));
            assert!(exactly_once);
        }
    }
}

/// Concurrent Adds of distinct names on one node must all land.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_adds_lose_no_update() {
    init_tracing();
    let store = Arc::new(ShardedStore::new());
    let engine = MutationEngine::new(Arc::clone(&store));
    let node = NodeKey::new("shared");

    let tasks = (0..8).map(|writer| {
        let engine = engine.clone();
        let node = node.clone();
        tokio::spawn(async move {
            for i in 0..50 {
                let name = format!("c-{}-{}", writer, i);
                engine
                    .add(&node, format!("{}:{}", writer, i), ResourceType::Cluster, &name)
                    .expect("distinct names never collide");
                tokio::task::yield_now().await;
            }
        })
    });
    for result in join_all(tasks).await {
        result.expect("writer panicked");
    }

    let snapshot = store.get_snapshot(&node).unwrap();
    assert_eq!(snapshot.resources(ResourceType::Cluster).len(), 400);
    assert_eq!(store.stats().snapshots_set(), 400);
}

/// A watcher following a node sees versions in publication order.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn follower_never_sees_stale_version() {
    init_tracing();
    let store = Arc::new(ShardedStore::new());
    let node = NodeKey::new("ordered");
    let mut watch = store.watch(&node, None);

    let writer = {
        let store = Arc::clone(&store);
        let node = node.clone();
        tokio::spawn(async move {
            for i in 1..=500u32 {
                store.set_snapshot(&node, Snapshot::empty(i.to_string()));
                if i % 50 == 0 {
                    tokio::task::yield_now().await;
                }
            }
        })
    };

    let mut last = 0u32;
    while last < 500 {
        let event = tokio::time::timeout(Duration::from_secs(10), watch.next())
            .await
            .expect("watch resolved");
        let version: u32 = event
            .snapshot()
            .expect("no clear in this test")
            .version()
            .as_str()
            .parse()
            .expect("numeric version");
        assert!(version > last, "saw {} after {}", version, last);
        last = version;
    }
    writer.await.expect("writer panicked");
}

/// Test that the store can handle 1000 nodes written in parallel.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_1000_nodes_parallel() {
    init_tracing();
    let store = Arc::new(ShardedStore::new());
    let engine = MutationEngine::new(Arc::clone(&store));
    let num_nodes = 1000;

    let start = Instant::now();
    let tasks = (0..10).map(|shard| {
        let engine = engine.clone();
        tokio::spawn(async move {
            for i in (shard..num_nodes).step_by(10) {
                let node = NodeKey::new(format!("envoy-sidecar-{}", i));
                engine
                    .add(&node, "1", ResourceType::Cluster, "c1")
                    .expect("add");
                engine
                    .add(&node, "2", ResourceType::Listener, "l1")
                    .expect("add");
            }
        })
    });
    for result in join_all(tasks).await {
        result.expect("task panicked");
    }
    println!("Published {} nodes in {:?}", num_nodes, start.elapsed());

    assert_eq!(store.snapshot_count(), num_nodes);
    for (_, snapshot) in store.iter() {
        assert_eq!(snapshot.version(), "2");
        assert_eq!(snapshot.total_resources(), 2);
    }

    let stats = store.stats();
    println!(
        "Store stats: sets={}, hits={}, misses={}",
        stats.snapshots_set(),
        stats.snapshot_hits(),
        stats.snapshot_misses()
    );
    assert_eq!(stats.snapshots_set(), 2 * num_nodes as u64);
}

/// Clears racing watch registration never leave a watcher hanging.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn clear_racing_watchers_resolves_all() {
    init_tracing();
    let store = Arc::new(ShardedStore::new());
    let node = NodeKey::new("churn");
    store.set_snapshot(&node, Snapshot::empty("v1"));

    let watches: Vec<Watch> = (0..64)
        .map(|_| store.watch(&node, Some(&Version::new("v1"))))
        .collect();

    let clearer = {
        let store = Arc::clone(&store);
        let node = node.clone();
        tokio::spawn(async move { store.clear_snapshot(&node) })
    };

    let events = join_all(watches.into_iter().map(|w| async move {
        tokio::time::timeout(Duration::from_secs(10), w.resolve())
            .await
            .expect("watch resolved")
    }))
    .await;

    assert!(clearer.await.expect("clearer panicked"));
    assert!(events.iter().all(WatchEvent::is_removed));
    assert_eq!(store.prune_idle(), 1);
}
