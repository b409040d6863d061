//! Model-based tests: random mutation sequences against a reference model.
//!
//! The model is a plain `BTreeMap` from `(type, name)` to the expected wire
//! payload, plus the version of the last successful mutation. After every
//! operation the store must agree with the model exactly.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use prost_types::Any;
use proptest::prelude::*;
use snapstore::prelude::*;
use snapstore_integration_tests::{payload, TYPES};

#[derive(Debug, Clone)]
enum Op {
    Replace(BTreeSet<(ResourceType, String)>),
    Add(ResourceType, String),
    Update(ResourceType, String),
    Remove(ResourceType, String),
    Clear,
}

const NODE: &str = "model";

/// Version plus payload per resource.
type State = (String, BTreeMap<(ResourceType, String), Any>);

#[derive(Debug, Default)]
struct Model {
    /// `None` while the node has no snapshot.
    state: Option<State>,
    synth: TemplateSynthesizer,
}

impl Model {
    /// Apply `op` published as `version`. Returns whether it should succeed.
    fn apply(&mut self, op: &Op, version: &str) -> bool {
        let mut resources = self
            .state
            .as_ref()
            .map(|(_, r)| r.clone())
            .unwrap_or_default();

        match op {
            Op::Replace(keys) => {
                resources = keys
                    .iter()
                    .map(|(t, n)| ((*t, n.clone()), payload(*t, n)))
                    .collect();
            }
            Op::Add(ty, name) => {
                let key = (*ty, name.clone());
                if resources.contains_key(&key) {
                    return false;
                }
                let added = self.synth.synthesize(&NodeKey::new(NODE), *ty, name);
                resources.insert(key, added.expect("synthesize").payload().clone());
            }
            Op::Update(ty, name) => {
                if let Some(current) = resources.get_mut(&(*ty, name.clone())) {
                    let resource = Resource::new(*ty, name.as_str(), current.clone());
                    let refreshed = self.synth.refresh(&resource).expect("refresh");
                    *current = refreshed.payload().clone();
                }
            }
            Op::Remove(ty, name) => {
                resources.remove(&(*ty, name.clone()));
            }
            Op::Clear => {
                self.state = None;
                return true;
            }
        }

        self.state = Some((version.to_string(), resources));
        true
    }
}

fn resource_type() -> impl Strategy<Value = ResourceType> {
    prop::sample::select(TYPES.to_vec())
}

fn name() -> impl Strategy<Value = String> {
    (0..4u8).prop_map(|i| format!("r{}", i))
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        1 => prop::collection::btree_set((resource_type(), name()), 0..6).prop_map(Op::Replace),
        3 => (resource_type(), name()).prop_map(|(t, n)| Op::Add(t, n)),
        2 => (resource_type(), name()).prop_map(|(t, n)| Op::Update(t, n)),
        2 => (resource_type(), name()).prop_map(|(t, n)| Op::Remove(t, n)),
        1 => Just(Op::Clear),
    ]
}

fn run(engine: &MutationEngine, node: &NodeKey, op: &Op, version: &str) -> bool {
    match op {
        Op::Replace(keys) => {
            let resources = keys.iter().map(|(t, n)| payload(*t, n)).collect();
            engine.replace(node, version, resources).is_ok()
        }
        Op::Add(t, n) => engine.add(node, version, *t, n).is_ok(),
        Op::Update(t, n) => engine.update(node, version, *t, n).is_ok(),
        Op::Remove(t, n) => engine.remove(node, version, *t, n).is_ok(),
        Op::Clear => {
            engine.clear(&ClearRequest::new(node.clone()));
            true
        }
    }
}

fn observed(store: &ShardedStore, node: &NodeKey) -> Option<State> {
    let snapshot = store.get_snapshot(node)?;
    let resources = snapshot
        .collections()
        .flat_map(|c| c.iter())
        .map(|r| ((r.resource_type(), r.name().to_string()), r.payload().clone()))
        .collect();
    Some((snapshot.version().to_string(), resources))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn engine_matches_model(ops in prop::collection::vec(op(), 1..40)) {
        let store = Arc::new(ShardedStore::new());
        let engine = MutationEngine::new(Arc::clone(&store));
        let node = NodeKey::new(NODE);
        let mut model = Model::default();

        for (i, op) in ops.iter().enumerate() {
            let version = format!("v{}", i);
            let expected_ok = model.apply(op, &version);
            let ok = run(&engine, &node, op, &version);

            prop_assert_eq!(ok, expected_ok, "op {} {:?}", i, op);
            prop_assert_eq!(
                observed(&store, &node),
                model.state.clone(),
                "after op {} {:?}",
                i,
                op
            );
        }
    }

    #[test]
    fn add_then_remove_is_identity(
        seed in prop::collection::btree_set((resource_type(), name()), 0..6),
        ty in resource_type(),
    ) {
        let store = Arc::new(ShardedStore::new());
        let engine = MutationEngine::new(Arc::clone(&store));
        let node = NodeKey::new("n");
        let resources = seed.iter().map(|(t, n)| payload(*t, n)).collect();
        let before = engine.replace(&node, "0", resources).unwrap().snapshot;

        // "fresh" is never generated by `name()`
        engine.add(&node, "1", ty, "fresh").unwrap();
        let after = engine.remove(&node, "2", ty, "fresh").unwrap().snapshot;

        prop_assert_eq!(after.resource_keys(), before.resource_keys());
        prop_assert!(after.same_resources(&before));
    }
}
