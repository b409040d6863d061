//! End-to-end mutation scenarios through the engine.

use std::sync::Arc;

use snapstore::core::payload::{ClusterPayload, ListenerPayload};
use snapstore::prelude::*;
use snapstore_integration_tests::{
    cluster, envoy_cluster, envoy_listener, init_tracing, names, payload,
};

fn setup() -> (Arc<ShardedStore>, MutationEngine) {
    init_tracing();
    let store = Arc::new(ShardedStore::new());
    let engine = MutationEngine::new(Arc::clone(&store));
    (store, engine)
}

#[test]
fn replace_add_remove_update_clear() {
    let (store, engine) = setup();
    let node = NodeKey::new("n1");

    // Replace
    engine
        .apply(MutationRequest::replace("n1", "1", vec![cluster("c1")]))
        .expect("replace");
    let snapshot = store.get_snapshot(&node).expect("snapshot after replace");
    assert_eq!(snapshot.version(), "1");
    assert_eq!(names(&snapshot, ResourceType::Cluster), ["c1"]);

    // Add
    engine
        .apply(MutationRequest::add("n1", "2", TypeUrl::CLUSTER, "c2"))
        .expect("add");
    let snapshot = store.get_snapshot(&node).unwrap();
    assert_eq!(snapshot.version(), "2");
    assert_eq!(names(&snapshot, ResourceType::Cluster), ["c1", "c2"]);

    // Remove
    engine
        .apply(MutationRequest::remove("n1", "3", TypeUrl::CLUSTER, "c1"))
        .expect("remove");
    let snapshot = store.get_snapshot(&node).unwrap();
    assert_eq!(snapshot.version(), "3");
    assert_eq!(names(&snapshot, ResourceType::Cluster), ["c2"]);
    let before_update = snapshot
        .get(ResourceType::Cluster, "c2")
        .unwrap()
        .typed::<ClusterPayload>()
        .unwrap();

    // Update
    engine
        .apply(MutationRequest::update("n1", "4", TypeUrl::CLUSTER, "c2"))
        .expect("update");
    let snapshot = store.get_snapshot(&node).unwrap();
    assert_eq!(snapshot.version(), "4");
    assert_eq!(names(&snapshot, ResourceType::Cluster), ["c2"]);
    let after_update = snapshot
        .get(ResourceType::Cluster, "c2")
        .unwrap()
        .typed::<ClusterPayload>()
        .unwrap();
    assert_ne!(before_update, after_update);
    let refresh_rate = |c: &ClusterPayload| c.dns_refresh_rate.as_ref().map(|d| d.seconds);
    assert_eq!(refresh_rate(&after_update), Some(10));
    assert_eq!(refresh_rate(&before_update), Some(5));

    // Clear
    assert!(engine.clear(&ClearRequest::new("n1")));
    assert!(store.get_snapshot(&node).is_none());
    assert!(matches!(
        store.require_snapshot(&node),
        Err(StoreError::NotFound { .. })
    ));
}

#[tokio::test]
async fn port_observes_every_step_in_order() {
    init_tracing();
    let (port, mut events) = ChannelPort::channel(16);
    let store = Arc::new(ShardedStore::builder().port(Arc::new(port)).build());
    let engine = MutationEngine::new(Arc::clone(&store));

    engine
        .apply(MutationRequest::replace("n1", "1", vec![cluster("c1")]))
        .unwrap();
    engine
        .apply(MutationRequest::add("n1", "2", TypeUrl::CLUSTER, "c2"))
        .unwrap();
    engine
        .apply(MutationRequest::remove("n1", "3", TypeUrl::CLUSTER, "c1"))
        .unwrap();
    engine
        .apply(MutationRequest::update("n1", "4", TypeUrl::CLUSTER, "c2"))
        .unwrap();
    engine.clear(&ClearRequest::new("n1"));

    let mut seen = Vec::new();
    for _ in 0..5 {
        match events.recv().await.expect("port event") {
            StoreEvent::Published { node, snapshot } => {
                assert_eq!(node.as_str(), "n1");
                seen.push(snapshot.version().to_string());
            }
            StoreEvent::Removed { node } => {
                assert_eq!(node.as_str(), "n1");
                seen.push("removed".to_string());
            }
        }
    }
    assert_eq!(seen, ["1", "2", "3", "4", "removed"]);
}

#[test]
fn failed_mutations_report_structured_failures() {
    let (store, engine) = setup();
    engine
        .apply(MutationRequest::replace("n1", "1", vec![cluster("c1")]))
        .unwrap();

    let duplicate = MutationRequest::add("n1", "2", TypeUrl::CLUSTER, "c1");
    let response = MutationResponse::from(engine.apply(duplicate));
    assert!(!response.success);
    assert_eq!(response.failure.as_ref().map(|f| f.kind), Some("already_exists"));

    let response = MutationResponse::from(engine.apply(MutationRequest::remove(
        "n1",
        "3",
        "type.googleapis.com/envoy.service.runtime.v3.Runtime",
        "rt",
    )));
    assert_eq!(
        response.failure.as_ref().map(|f| f.kind),
        Some("unknown_resource_type")
    );

    // Neither failure published anything
    assert_eq!(store.get_snapshot(&NodeKey::new("n1")).unwrap().version(), "1");
    assert_eq!(store.stats().snapshots_set(), 1);
}

#[test]
fn replace_covers_every_type() {
    let (store, engine) = setup();
    let resources = ResourceType::ALL
        .iter()
        .map(|ty| payload(*ty, &format!("{}-1", ty.short_name().to_lowercase())))
        .collect();

    let receipt = engine
        .apply(MutationRequest::replace("n1", "1", resources))
        .unwrap();
    assert_eq!(receipt.snapshot.total_resources(), ResourceType::ALL.len());
    for ty in ResourceType::ALL {
        assert_eq!(receipt.snapshot.resources(ty).len(), 1, "{ty}");
    }
    assert_eq!(store.snapshot_count(), 1);
}

#[test]
fn nodes_are_independent() {
    let (store, engine) = setup();
    engine
        .apply(MutationRequest::replace("a", "1", vec![cluster("c1")]))
        .unwrap();
    engine
        .apply(MutationRequest::replace("b", "7", vec![cluster("c9")]))
        .unwrap();
    engine.clear(&ClearRequest::new("a"));

    assert!(store.get_snapshot(&NodeKey::new("a")).is_none());
    let b = store.get_snapshot(&NodeKey::new("b")).unwrap();
    assert_eq!(b.version(), "7");
    assert_eq!(names(&b, ResourceType::Cluster), ["c9"]);
}

#[test]
fn replace_accepts_envoy_encoded_resources() {
    let (store, engine) = setup();
    let cluster = envoy_cluster("c1");
    let listener = envoy_listener("l1");

    let receipt = engine
        .apply(MutationRequest::replace(
            "n1",
            "1",
            vec![cluster.clone(), listener.clone()],
        ))
        .expect("genuine Envoy payloads are well-formed");
    assert_eq!(names(&receipt.snapshot, ResourceType::Cluster), ["c1"]);
    assert_eq!(names(&receipt.snapshot, ResourceType::Listener), ["l1"]);

    // Stored bytes are exactly what was supplied
    let stored = store.get_snapshot(&NodeKey::new("n1")).unwrap();
    assert_eq!(stored.get(ResourceType::Cluster, "c1").unwrap().payload(), &cluster);

    // Refresh keeps the listener's filter chain
    engine
        .apply(MutationRequest::update("n1", "2", TypeUrl::LISTENER, "l1"))
        .expect("update");
    let listener = store
        .get_snapshot(&NodeKey::new("n1"))
        .unwrap()
        .get(ResourceType::Listener, "l1")
        .unwrap()
        .typed::<ListenerPayload>()
        .unwrap();
    assert_eq!(listener.filter_chains.len(), 1);
    assert_eq!(listener.tcp_backlog_size, Some(5));
}
