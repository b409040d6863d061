//! Store and watch contract tests.

use std::sync::Arc;
use std::time::Duration;

use snapstore::prelude::*;
use snapstore_integration_tests::{cluster, init_tracing, names, payload, TYPES};
use tokio_util::sync::CancellationToken;

fn setup() -> (Arc<ShardedStore>, MutationEngine) {
    init_tracing();
    let store = Arc::new(ShardedStore::new());
    let engine = MutationEngine::new(Arc::clone(&store));
    (store, engine)
}

#[test]
fn add_then_remove_restores_resource_set() {
    let (store, engine) = setup();
    let node = NodeKey::new("n1");
    let initial: Vec<_> = TYPES.iter().map(|ty| payload(*ty, "base")).collect();
    engine.replace(&node, "1", initial).unwrap();
    let before = store.get_snapshot(&node).unwrap();

    for (i, ty) in TYPES.iter().enumerate() {
        let add_version = format!("add-{}", i);
        let remove_version = format!("remove-{}", i);
        engine.add(&node, add_version, *ty, "extra").unwrap();
        let after = engine.remove(&node, remove_version.clone(), *ty, "extra").unwrap();

        assert_eq!(after.version(), remove_version.as_str());
        assert!(after.snapshot.same_resources(&before), "{ty}");
    }
}

#[test]
fn update_on_missing_keeps_set_and_advances_version() {
    let (store, engine) = setup();
    let node = NodeKey::new("n1");
    engine.replace(&node, "1", vec![cluster("c1")]).unwrap();
    let before = store.get_snapshot(&node).unwrap();

    let receipt = engine.update(&node, "2", ResourceType::Cluster, "missing").unwrap();
    assert!(!receipt.changed);

    let after = store.get_snapshot(&node).unwrap();
    assert_eq!(after.version(), "2");
    assert!(after.same_resources(&before));
}

#[test]
fn unchanged_collections_are_shared() {
    let (store, engine) = setup();
    let node = NodeKey::new("n1");
    engine
        .replace(
            &node,
            "1",
            vec![cluster("c1"), payload(ResourceType::Listener, "l1")],
        )
        .unwrap();
    let before = store.get_snapshot(&node).unwrap();

    engine.add(&node, "2", ResourceType::Cluster, "c2").unwrap();
    let after = store.get_snapshot(&node).unwrap();

    // Untouched resources are the same allocation
    let l_before = before.get(ResourceType::Listener, "l1").unwrap();
    let l_after = after.get(ResourceType::Listener, "l1").unwrap();
    assert!(Arc::ptr_eq(l_before, l_after));
    // The previous snapshot is unaffected
    assert_eq!(names(&before, ResourceType::Cluster), ["c1"]);
    assert_eq!(names(&after, ResourceType::Cluster), ["c1", "c2"]);
}

#[tokio::test]
async fn watch_resolves_immediately_when_behind() {
    let (store, engine) = setup();
    engine.add(&NodeKey::new("n1"), "5", ResourceType::Route, "r1").unwrap();

    let mut watch = store.watch(&NodeKey::new("n1"), Some(&Version::new("4")));
    let event = watch.try_next().expect("already behind");
    assert_eq!(event.snapshot().unwrap().version(), "5");
}

#[tokio::test]
async fn resubscribe_with_observed_version_waits_for_next() {
    let (store, engine) = setup();
    let node = NodeKey::new("n1");
    engine.add(&node, "1", ResourceType::Cluster, "c1").unwrap();

    let mut watch = engine.watch(&WatchRequest::new("n1"));
    let first = watch.next().await;
    assert_eq!(first.snapshot().unwrap().version(), "1");

    // Same version republished: still pending
    store.set_snapshot(&node, store.get_snapshot(&node).unwrap().to_builder().build());
    assert!(watch.try_next().is_none());

    engine.add(&node, "2", ResourceType::Cluster, "c2").unwrap();
    let second = tokio::time::timeout(Duration::from_secs(5), watch.next())
        .await
        .expect("watch should resolve");
    assert_eq!(second.snapshot().unwrap().version(), "2");
}

#[tokio::test]
async fn clear_resolves_pending_watch_as_removed() {
    let (store, engine) = setup();
    let node = NodeKey::new("n1");
    engine.add(&node, "1", ResourceType::Cluster, "c1").unwrap();

    let watch = engine.watch(&WatchRequest::new("n1").after("1"));
    let handle = tokio::spawn(watch.resolve());
    tokio::task::yield_now().await;

    assert!(engine.clear(&ClearRequest::new("n1")));
    let event = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("watch should resolve")
        .expect("task panicked");

    assert!(event.is_removed());
    assert!(store.get_snapshot(&node).is_none());
}

#[tokio::test]
async fn watch_registered_after_clear_waits_for_next_set() {
    let (store, engine) = setup();
    let node = NodeKey::new("n1");
    engine.add(&node, "1", ResourceType::Cluster, "c1").unwrap();
    engine.clear(&ClearRequest::new("n1"));

    let mut watch = store.watch(&node, Some(&Version::new("1")));
    assert!(watch.try_next().is_none());

    engine.add(&node, "2", ResourceType::Cluster, "c1").unwrap();
    assert_eq!(watch.next().await.snapshot().unwrap().version(), "2");
}

#[tokio::test]
async fn cancellation_is_not_an_error() {
    let (store, _engine) = setup();
    let node = NodeKey::new("n1");
    let token = CancellationToken::new();

    let watch = store.watch(&node, None);
    let cancel = token.clone();
    let handle = tokio::spawn(async move { watch.resolve_or_cancel(&cancel).await });
    tokio::task::yield_now().await;
    token.cancel();

    let outcome = handle.await.expect("task panicked");
    assert!(matches!(outcome, WatchOutcome::Cancelled));
    assert_eq!(store.watch_count(&node), 0);
    assert_eq!(store.prune_idle(), 1);
}

#[test]
fn cancel_watch_reclaims_idle_slot() {
    let (store, _engine) = setup();
    let node = NodeKey::new("ghost");

    let watch = store.watch(&node, None);
    assert_eq!(store.total_watch_count(), 1);
    store.cancel_watch(watch);

    assert_eq!(store.total_watch_count(), 0);
    assert_eq!(store.prune_idle(), 0);
    assert!(store.nodes().is_empty());
}

#[test]
fn introspection_reports_live_nodes() {
    let (store, engine) = setup();
    for i in 0..3 {
        engine
            .add(&NodeKey::new(format!("n{}", i)), "1", ResourceType::Cluster, "c")
            .unwrap();
    }
    engine.clear(&ClearRequest::new("n1"));

    let mut nodes: Vec<_> = store.nodes().into_iter().map(|n| n.to_string()).collect();
    nodes.sort();
    assert_eq!(nodes, ["n0", "n2"]);
    assert_eq!(store.snapshot_count(), 2);
    assert!(store.has_snapshot(&NodeKey::new("n2")));
    assert_eq!(store.iter().count(), 2);
    assert_eq!(store.stats().snapshots_cleared(), 1);
}
