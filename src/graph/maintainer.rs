//! Consistency maintenance driven by store notifications.
//!
//! The pipeline removes annotations and collections without consulting
//! the graph. The graph reacts here: removal of a member annotation
//! triggers a synchronous repair of every neighbor's adjacency, removal
//! of the bound collection or teardown of the bound store deactivates
//! the graph for good. Repairs are tolerant of entries that are already
//! gone; corruption detection belongs to the explicit removal
//! operations, not to this path.

use tracing::{debug, trace, warn};

use super::adjacency;
use super::engine::{BoundState, GraphShared};
use crate::store::{Annotation, AnnotationId, StoreId, StoreObserver};

impl GraphShared {
    /// Flip Active to Inactive, dropping the store handle, the bound
    /// collection name and the registry. Idempotent; Inactive is
    /// terminal.
    pub(crate) fn deactivate(&self) {
        let mut guard = self.state.borrow_mut();
        if let Some(state) = guard.take() {
            debug!(collection = %state.collection, "annotation graph deactivated");
        }
    }

    /// Remove one occurrence of `value` under `key` on `ann`, pruning
    /// an emptied sequence. Missing entries and unresolvable neighbors
    /// are tolerated.
    fn repair(state: &BoundState, ann: AnnotationId, key: &str, value: AnnotationId) {
        let repaired = state
            .store
            .with_ann_features_mut(&state.collection, ann, |fm| {
                let removed = match adjacency::ids_mut(fm, key) {
                    Ok(Some(ids)) => adjacency::remove_one(ids, value),
                    Ok(None) => false,
                    Err(err) => {
                        warn!(%err, annotation = %ann, "skipping corrupt adjacency entry");
                        false
                    }
                };
                adjacency::prune_if_empty(fm, key);
                removed
            })
            .unwrap_or(false);
        if repaired {
            trace!(annotation = %ann, key, "repaired adjacency after removal");
        }
    }
}

impl StoreObserver for GraphShared {
    fn annotation_removed(&self, collection: &str, ann: &Annotation) {
        let guard = self.state.borrow();
        let Some(state) = guard.as_ref() else {
            return;
        };
        if state.collection != collection {
            return;
        }
        let removed_id = ann.id();
        for name in state.registry.names() {
            let Ok(keys) = state.registry.keys_for(name) else {
                continue;
            };
            // outgoing edges: drop this id from each target's incoming list
            if let Ok(Some(targets)) = adjacency::ids(ann.features(), &keys.to) {
                for &target in targets {
                    Self::repair(state, target, &keys.from, removed_id);
                }
            }
            // incoming edges: drop this id from each source's outgoing list
            if let Ok(Some(sources)) = adjacency::ids(ann.features(), &keys.from) {
                for &source in sources {
                    Self::repair(state, source, &keys.to, removed_id);
                }
            }
        }
    }

    fn collection_removed(&self, name: &str) {
        let bound = {
            let guard = self.state.borrow();
            guard.as_ref().map_or(false, |s| s.collection == name)
        };
        if bound {
            self.deactivate();
        }
    }

    fn store_torn_down(&self, store: StoreId) {
        let bound = {
            let guard = self.state.borrow();
            guard.as_ref().map_or(false, |s| s.store.id() == store)
        };
        if bound {
            self.deactivate();
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::graph::{AnnotationGraph, GraphError};
    use crate::store::{Annotation, AnnotationStore, Collection, FeatureMap};

    fn setup() -> (AnnotationStore, Collection, AnnotationGraph) {
        let store = AnnotationStore::new("doc");
        let coll = store.collection("anns");
        let graph = AnnotationGraph::bind(&store, &coll).unwrap();
        (store, coll, graph)
    }

    fn ann(coll: &Collection, start: usize, end: usize, kind: &str) -> Annotation {
        coll.add(start, end, kind, FeatureMap::new()).unwrap()
    }

    #[test]
    fn removing_an_annotation_repairs_both_directions() {
        let (_store, coll, graph) = setup();
        graph.register_edge_type("m").unwrap();
        let left = ann(&coll, 0, 1, "L");
        let middle = ann(&coll, 1, 2, "M");
        let right = ann(&coll, 2, 3, "R");
        graph.add_edge("m", &left, &middle).unwrap();
        graph.add_edge("m", &middle, &right).unwrap();

        coll.remove(middle.id()).unwrap();

        // the middle id is gone from the neighbors' sequences
        assert_eq!(graph.edge_count("m", &left).unwrap(), 0);
        assert!(!graph.has_referencing_edges("m", &right).unwrap());
        // and the emptied keys are pruned
        assert!(!coll.get(left.id()).unwrap().features().contains_key("_sg.to.m"));
        assert!(!coll
            .get(right.id())
            .unwrap()
            .features()
            .contains_key("_sg.from.m"));
    }

    #[test]
    fn removed_endpoints_fail_membership_checks() {
        let (_store, coll, graph) = setup();
        graph.register_edge_type("m").unwrap();
        let a = ann(&coll, 0, 1, "A");
        let b = ann(&coll, 1, 2, "B");
        graph.add_edge("m", &a, &b).unwrap();

        coll.remove(b.id()).unwrap();
        assert!(matches!(
            graph.has_edge("m", &a, &b),
            Err(GraphError::NotInCollection(_))
        ));
        assert_eq!(graph.edge_count("m", &a).unwrap(), 0);
    }

    #[test]
    fn duplicate_edges_are_repaired_completely() {
        let (_store, coll, graph) = setup();
        graph.register_edge_type("m").unwrap();
        let a = ann(&coll, 0, 1, "A");
        let b = ann(&coll, 1, 2, "B");
        graph.add_edge("m", &a, &b).unwrap();
        graph.add_edge("m", &a, &b).unwrap();

        coll.remove(b.id()).unwrap();
        assert_eq!(graph.edge_count("m", &a).unwrap(), 0);
    }

    #[test]
    fn removals_in_other_collections_are_ignored() {
        let (store, coll, graph) = setup();
        graph.register_edge_type("m").unwrap();
        let a = ann(&coll, 0, 1, "A");
        let b = ann(&coll, 1, 2, "B");
        graph.add_edge("m", &a, &b).unwrap();

        let other = store.collection("other");
        let x = other.add(0, 1, "X", FeatureMap::new()).unwrap();
        other.remove(x.id()).unwrap();

        assert!(graph.is_active());
        assert!(graph.has_edge("m", &a, &b).unwrap());
    }

    #[test]
    fn removing_the_bound_collection_deactivates() {
        let (store, coll, graph) = setup();
        graph.register_edge_type("m").unwrap();
        let a = ann(&coll, 0, 1, "A");

        store.remove_collection("anns").unwrap();
        assert!(!graph.is_active());
        assert!(matches!(
            graph.has_edges("m", &a),
            Err(GraphError::Inactive)
        ));
    }

    #[test]
    fn removing_another_collection_keeps_the_graph_active() {
        let (store, _coll, graph) = setup();
        store.collection("other");
        store.remove_collection("other").unwrap();
        assert!(graph.is_active());
    }

    #[test]
    fn store_teardown_deactivates() {
        let (store, _coll, graph) = setup();
        store.tear_down();
        assert!(!graph.is_active());
        assert!(matches!(
            graph.register_edge_type("m"),
            Err(GraphError::Inactive)
        ));
    }

    #[test]
    fn teardown_of_an_unrelated_store_is_ignored() {
        let (_store, _coll, graph) = setup();
        let unrelated = AnnotationStore::new("other");
        unrelated.tear_down();
        assert!(graph.is_active());
    }
}
