//! Read-through views over live graph state.
//!
//! Both views alias state owned elsewhere instead of copying it:
//! mutations made after a view was obtained are visible through it.
//! A view whose backing state is gone (annotation removed, graph
//! deactivated) reads as empty rather than failing.

use std::rc::Weak;

use super::engine::GraphShared;
use crate::store::{AnnotationId, AnnotationStore, FeatureValue};

/// Read-through view of one live adjacency id sequence.
///
/// Obtained from [`AnnotationGraph::ids`](super::AnnotationGraph::ids)
/// and [`AnnotationGraph::referencing_ids`](super::AnnotationGraph::referencing_ids).
/// The view cannot mutate the sequence.
#[derive(Debug, Clone)]
pub struct IdsView {
    store: AnnotationStore,
    collection: String,
    ann: AnnotationId,
    key: String,
}

impl IdsView {
    pub(crate) fn new(
        store: AnnotationStore,
        collection: String,
        ann: AnnotationId,
        key: String,
    ) -> Self {
        Self {
            store,
            collection,
            ann,
            key,
        }
    }

    fn with<T>(&self, f: impl FnOnce(&[AnnotationId]) -> T) -> Option<T> {
        self.store
            .with_ann_features(&self.collection, self.ann, |fm| match fm.get(&self.key) {
                Some(FeatureValue::Ids(ids)) => Some(f(ids)),
                _ => None,
            })
            .flatten()
    }

    /// Current number of entries
    pub fn len(&self) -> usize {
        self.with(|ids| ids.len()).unwrap_or(0)
    }

    /// True when the sequence is currently empty or gone
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when the sequence currently contains `id`
    pub fn contains(&self, id: AnnotationId) -> bool {
        self.with(|ids| ids.contains(&id)).unwrap_or(false)
    }

    /// The entry at `index`, if present
    pub fn get(&self, index: usize) -> Option<AnnotationId> {
        self.with(|ids| ids.get(index).copied()).flatten()
    }

    /// A snapshot of the current entries
    pub fn to_vec(&self) -> Vec<AnnotationId> {
        self.with(|ids| ids.to_vec()).unwrap_or_default()
    }
}

/// Read-through view of the registered edge-type names, in
/// registration order.
///
/// Obtained from [`AnnotationGraph::edge_types`](super::AnnotationGraph::edge_types).
/// Reads as empty once the graph is deactivated.
#[derive(Clone)]
pub struct EdgeTypesView {
    shared: Weak<GraphShared>,
}

impl EdgeTypesView {
    pub(crate) fn new(shared: Weak<GraphShared>) -> Self {
        Self { shared }
    }

    fn with<T>(&self, f: impl FnOnce(&[String]) -> T) -> Option<T> {
        let shared = self.shared.upgrade()?;
        let guard = shared.state.borrow();
        let state = guard.as_ref()?;
        Some(f(state.registry.names()))
    }

    /// Current number of registered names
    pub fn len(&self) -> usize {
        self.with(|names| names.len()).unwrap_or(0)
    }

    /// True when no names are registered (or the graph is inactive)
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when `name` is currently registered
    pub fn contains(&self, name: &str) -> bool {
        self.with(|names| names.iter().any(|n| n == name))
            .unwrap_or(false)
    }

    /// A snapshot of the current names
    pub fn to_vec(&self) -> Vec<String> {
        self.with(|names| names.to_vec()).unwrap_or_default()
    }
}

impl std::fmt::Debug for EdgeTypesView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("EdgeTypesView").field(&self.to_vec()).finish()
    }
}
