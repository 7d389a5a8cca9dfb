//! The annotation graph: binding, lifecycle, edge CRUD, and queries.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use tracing::debug;

use super::adjacency::{self, EdgeKeys};
use super::error::{GraphError, GraphResult};
use super::registry::EdgeRegistry;
use super::views::{EdgeTypesView, IdsView};
use crate::store::{
    Annotation, AnnotationId, AnnotationStore, Collection, FeatureMap, StoreObserver,
};

/// State held while a graph is active. Dropped wholesale on
/// deactivation so no store references outlive the binding.
pub(crate) struct BoundState {
    pub(crate) store: AnnotationStore,
    pub(crate) collection: String,
    pub(crate) registry: EdgeRegistry,
}

/// Shared interior of a graph. The store's observer registration points
/// at this, so notifications keep arriving for as long as any graph
/// handle is alive.
pub(crate) struct GraphShared {
    pub(crate) state: RefCell<Option<BoundState>>,
}

/// A named, multi-relation directed graph over one annotation collection.
///
/// The graph owns no adjacency structure of its own: edges live inside
/// the feature bags of their endpoint annotations, under reserved keys
/// per edge type and direction, and the edge-type schema is persisted
/// into the store metadata. Handles are cheap clones sharing one
/// interior.
///
/// Endpoints are identified by id; every edge operation requires both
/// endpoints to currently belong to the bound collection.
#[derive(Clone)]
pub struct AnnotationGraph {
    pub(crate) shared: Rc<GraphShared>,
}

impl AnnotationGraph {
    /// Bind a new graph to `collection`, which must belong to `store`.
    ///
    /// Subscribes the graph to the store's lifecycle notifications and
    /// loads the edge-type schema persisted in the store metadata. The
    /// graph stays active until [`close`](Self::close), until the bound
    /// collection is removed, or until the store is torn down.
    pub fn bind(store: &AnnotationStore, collection: &Collection) -> GraphResult<Self> {
        if collection.store_id() != store.id() {
            return Err(GraphError::InvalidArgument(format!(
                "collection {} does not belong to store {}",
                collection.name(),
                store.name()
            )));
        }
        let registry = EdgeRegistry::load(store);
        let shared = Rc::new(GraphShared {
            state: RefCell::new(Some(BoundState {
                store: store.clone(),
                collection: collection.name().to_string(),
                registry,
            })),
        });
        let dyn_shared: Rc<dyn StoreObserver> = shared.clone();
        let observer: Weak<dyn StoreObserver> = Rc::downgrade(&dyn_shared);
        store.subscribe(observer);
        debug!(collection = collection.name(), "bound annotation graph");
        Ok(Self { shared })
    }

    /// Deactivate this graph. Idempotent; afterwards every operation
    /// fails with [`GraphError::Inactive`].
    pub fn close(&self) {
        self.shared.deactivate();
    }

    /// True until the graph has been deactivated
    pub fn is_active(&self) -> bool {
        self.shared.state.borrow().is_some()
    }

    // === Edge-type schema ===

    /// Register an edge-type name; no-op when already registered.
    pub fn register_edge_type(&self, name: &str) -> GraphResult<()> {
        self.with_state_mut(|state| state.registry.register(&state.store, name))
    }

    /// Register several edge-type names at once.
    pub fn register_edge_types<I, S>(&self, names: I) -> GraphResult<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for name in names {
            self.register_edge_type(name.as_ref())?;
        }
        Ok(())
    }

    /// Unregister an edge-type name.
    ///
    /// First removes every edge of that type touching any annotation
    /// currently in the bound collection, then drops the name from the
    /// registry and the persisted schema.
    pub fn unregister_edge_type(&self, name: &str) -> GraphResult<()> {
        self.with_state_mut(|state| {
            let keys = state.registry.keys_for(name)?.clone();
            for id in state.store.annotation_ids(&state.collection) {
                Self::remove_outgoing(state, name, &keys, id)?;
            }
            state.registry.unregister(&state.store, name)?;
            debug!(edge = name, "unregistered edge type");
            Ok(())
        })
    }

    /// A read-through view of the registered edge-type names.
    ///
    /// The view reflects later registry mutations; once the graph is
    /// inactive it reads as empty.
    pub fn edge_types(&self) -> EdgeTypesView {
        EdgeTypesView::new(Rc::downgrade(&self.shared))
    }

    /// Set or clear the default edge-type name.
    ///
    /// `None` or an empty name clears the default; a non-registered
    /// name fails with [`GraphError::UnknownEdgeType`]. The value is
    /// persisted into the store metadata.
    pub fn set_default_edge_type(&self, name: Option<&str>) -> GraphResult<()> {
        self.with_state_mut(|state| state.registry.set_default(&state.store, name))
    }

    /// The current default edge-type name, if set
    pub fn default_edge_type(&self) -> GraphResult<Option<String>> {
        self.with_state(|state| Ok(state.registry.default_name().map(str::to_string)))
    }

    // === Edge CRUD ===

    /// Add a directed edge. Duplicates are allowed; each call appends
    /// one occurrence to both endpoint sequences.
    pub fn add_edge(&self, edge: &str, from: &Annotation, to: &Annotation) -> GraphResult<()> {
        self.with_state(|state| {
            Self::ensure_member(state, from)?;
            Self::ensure_member(state, to)?;
            let keys = state.registry.keys_for(edge)?;
            Self::push_id(state, from.id(), &keys.to, to.id())?;
            Self::push_id(state, to.id(), &keys.from, from.id())?;
            Ok(())
        })
    }

    /// Add an edge in both directions between `a` and `b`.
    pub fn add_both_edges(&self, edge: &str, a: &Annotation, b: &Annotation) -> GraphResult<()> {
        self.add_edge(edge, a, b)?;
        self.add_edge(edge, b, a)
    }

    /// Remove one occurrence of the edge.
    ///
    /// Both endpoint sequences are verified before either is touched,
    /// so a failing removal leaves no partial state. Empties are
    /// pruned.
    pub fn remove_edge(&self, edge: &str, from: &Annotation, to: &Annotation) -> GraphResult<()> {
        self.with_state(|state| {
            Self::ensure_member(state, from)?;
            Self::ensure_member(state, to)?;
            let keys = state.registry.keys_for(edge)?;
            let present = Self::list_contains(state, from.id(), &keys.to, to.id())?
                && Self::list_contains(state, to.id(), &keys.from, from.id())?;
            if !present {
                return Err(GraphError::EdgeNotFound {
                    edge: edge.to_string(),
                    from: from.id(),
                    to: to.id(),
                });
            }
            Self::remove_id(state, from.id(), &keys.to, to.id())?;
            Self::remove_id(state, to.id(), &keys.from, from.id())?;
            Ok(())
        })
    }

    /// Remove every outgoing edge of the given type.
    ///
    /// Each target's incoming sequence is repaired; a repair that finds
    /// nothing to remove fails with [`GraphError::Inconsistent`], which
    /// surfaces corruption that existed before this call.
    pub fn remove_edges(&self, edge: &str, ann: &Annotation) -> GraphResult<()> {
        self.with_state(|state| {
            Self::ensure_member(state, ann)?;
            let keys = state.registry.keys_for(edge)?;
            Self::remove_outgoing(state, edge, keys, ann.id())
        })
    }

    // === Queries ===

    /// True when at least one `edge` occurrence from `from` to `to`
    /// exists. Never creates entries.
    pub fn has_edge(&self, edge: &str, from: &Annotation, to: &Annotation) -> GraphResult<bool> {
        self.with_state(|state| {
            Self::ensure_member(state, from)?;
            Self::ensure_member(state, to)?;
            let keys = state.registry.keys_for(edge)?;
            Self::list_contains(state, from.id(), &keys.to, to.id())
        })
    }

    /// True when `ann` has any outgoing edge of the given type.
    pub fn has_edges(&self, edge: &str, ann: &Annotation) -> GraphResult<bool> {
        self.with_state(|state| {
            Self::ensure_member(state, ann)?;
            let keys = state.registry.keys_for(edge)?;
            Ok(!Self::id_list(state, ann.id(), &keys.to)?.is_empty())
        })
    }

    /// True when any annotation points at `ann` via the given type.
    pub fn has_referencing_edges(&self, edge: &str, ann: &Annotation) -> GraphResult<bool> {
        self.with_state(|state| {
            Self::ensure_member(state, ann)?;
            let keys = state.registry.keys_for(edge)?;
            Ok(!Self::id_list(state, ann.id(), &keys.from)?.is_empty())
        })
    }

    /// The annotations `ann` points at, in stored order. An absent
    /// sequence yields an empty list.
    pub fn annotations(&self, edge: &str, ann: &Annotation) -> GraphResult<Vec<Annotation>> {
        self.resolved(edge, ann, false)
    }

    /// The annotations pointing at `ann`, in stored order.
    pub fn referencing_annotations(
        &self,
        edge: &str,
        ann: &Annotation,
    ) -> GraphResult<Vec<Annotation>> {
        self.resolved(edge, ann, true)
    }

    /// Like [`annotations`](Self::annotations), deduplicated and in
    /// document order.
    pub fn annotation_set(&self, edge: &str, ann: &Annotation) -> GraphResult<Vec<Annotation>> {
        let mut anns = self.annotations(edge, ann)?;
        Self::document_set(&mut anns);
        Ok(anns)
    }

    /// Like [`referencing_annotations`](Self::referencing_annotations),
    /// deduplicated and in document order.
    pub fn referencing_annotation_set(
        &self,
        edge: &str,
        ann: &Annotation,
    ) -> GraphResult<Vec<Annotation>> {
        let mut anns = self.referencing_annotations(edge, ann)?;
        Self::document_set(&mut anns);
        Ok(anns)
    }

    /// The feature bags of the annotations `ann` points at, in stored order.
    pub fn feature_maps(&self, edge: &str, ann: &Annotation) -> GraphResult<Vec<FeatureMap>> {
        Ok(self
            .annotations(edge, ann)?
            .into_iter()
            .map(|a| a.features().clone())
            .collect())
    }

    /// The feature bags of the annotations pointing at `ann`, in stored order.
    pub fn referencing_feature_maps(
        &self,
        edge: &str,
        ann: &Annotation,
    ) -> GraphResult<Vec<FeatureMap>> {
        Ok(self
            .referencing_annotations(edge, ann)?
            .into_iter()
            .map(|a| a.features().clone())
            .collect())
    }

    /// A read-through view of the ids `ann` points at.
    ///
    /// The view aliases the live sequence: edge changes made after the
    /// view was obtained are visible through it. Obtaining the view
    /// materializes an empty sequence when none existed.
    pub fn ids(&self, edge: &str, ann: &Annotation) -> GraphResult<IdsView> {
        self.id_view(edge, ann, false)
    }

    /// A read-through view of the ids pointing at `ann`.
    pub fn referencing_ids(&self, edge: &str, ann: &Annotation) -> GraphResult<IdsView> {
        self.id_view(edge, ann, true)
    }

    /// Number of outgoing `edge` occurrences of `ann` (0 when absent).
    pub fn edge_count(&self, edge: &str, ann: &Annotation) -> GraphResult<usize> {
        self.with_state(|state| {
            Self::ensure_member(state, ann)?;
            let keys = state.registry.keys_for(edge)?;
            Ok(Self::id_list(state, ann.id(), &keys.to)?.len())
        })
    }

    // === In-place modification of edge lists ===

    /// Keep only the outgoing edges whose target satisfies `keep`.
    ///
    /// For every discarded target one occurrence of `ann`'s id is
    /// removed from that target's incoming sequence; survivor order is
    /// preserved and empties are pruned on both sides. `keep` must not
    /// mutate the graph or the store.
    pub fn grep_edges(
        &self,
        edge: &str,
        ann: &Annotation,
        mut keep: impl FnMut(&Annotation) -> bool,
    ) -> GraphResult<()> {
        self.with_state(|state| {
            Self::ensure_member(state, ann)?;
            let keys = state.registry.keys_for(edge)?;
            let ids = Self::id_list(state, ann.id(), &keys.to)?;
            if ids.is_empty() {
                return Ok(());
            }
            let mut survivors = Vec::with_capacity(ids.len());
            for id in ids {
                let target = Self::resolve(state, id)?;
                if keep(&target) {
                    survivors.push(id);
                } else if !Self::remove_id(state, id, &keys.from, ann.id())? {
                    return Err(GraphError::Inconsistent(format!(
                        "annotation {id} lacks the incoming {edge} entry for {}",
                        ann.id()
                    )));
                }
            }
            state
                .store
                .with_ann_features_mut(&state.collection, ann.id(), |fm| {
                    if survivors.is_empty() {
                        fm.remove(&keys.to);
                        return Ok(());
                    }
                    adjacency::ids_mut(fm, &keys.to)?
                        .map(|stored| *stored = survivors)
                        .ok_or_else(|| {
                            GraphError::Inconsistent(format!(
                                "outgoing {edge} sequence of {} vanished mid-operation",
                                ann.id()
                            ))
                        })
                })
                .unwrap_or(Err(GraphError::NotInCollection(ann.id())))
        })
    }

    /// Stably reorder the outgoing edges of `ann` using a comparator
    /// over the resolved target annotations. No-op when the sequence
    /// has at most one entry. `compare` must not mutate the graph or
    /// the store.
    pub fn sort_edges(
        &self,
        edge: &str,
        ann: &Annotation,
        mut compare: impl FnMut(&Annotation, &Annotation) -> Ordering,
    ) -> GraphResult<()> {
        self.with_state(|state| {
            Self::ensure_member(state, ann)?;
            let keys = state.registry.keys_for(edge)?;
            let ids = Self::id_list(state, ann.id(), &keys.to)?;
            if ids.len() <= 1 {
                return Ok(());
            }
            let mut resolved: HashMap<AnnotationId, Annotation> = HashMap::new();
            for id in &ids {
                if !resolved.contains_key(id) {
                    resolved.insert(*id, Self::resolve(state, *id)?);
                }
            }
            let mut sorted = ids;
            sorted.sort_by(|a, b| compare(&resolved[a], &resolved[b]));
            let _ = state
                .store
                .with_ann_features_mut(&state.collection, ann.id(), |fm| {
                    if let Ok(Some(stored)) = adjacency::ids_mut(fm, &keys.to) {
                        *stored = sorted;
                    }
                });
            Ok(())
        })
    }

    // === Feature bags ===

    /// A shallow copy of `ann`'s feature bag with every reserved
    /// adjacency key removed, for every edge type ever known to this
    /// graph instance.
    pub fn feature_map_copy(&self, ann: &Annotation) -> GraphResult<FeatureMap> {
        self.with_state(|state| {
            Self::ensure_member(state, ann)?;
            let mut fm = state
                .store
                .with_ann_features(&state.collection, ann.id(), |f| f.clone())
                .ok_or(GraphError::NotInCollection(ann.id()))?;
            for name in state.registry.ever_known() {
                let keys = EdgeKeys::new(name);
                fm.remove(&keys.to);
                fm.remove(&keys.from);
            }
            Ok(fm)
        })
    }

    // === Default-edge shorthands ===

    /// [`add_edge`](Self::add_edge) using the default edge type.
    pub fn add_default_edge(&self, from: &Annotation, to: &Annotation) -> GraphResult<()> {
        let edge = self.require_default()?;
        self.add_edge(&edge, from, to)
    }

    /// [`remove_edge`](Self::remove_edge) using the default edge type.
    pub fn remove_default_edge(&self, from: &Annotation, to: &Annotation) -> GraphResult<()> {
        let edge = self.require_default()?;
        self.remove_edge(&edge, from, to)
    }

    /// [`has_edge`](Self::has_edge) using the default edge type.
    pub fn has_default_edge(&self, from: &Annotation, to: &Annotation) -> GraphResult<bool> {
        let edge = self.require_default()?;
        self.has_edge(&edge, from, to)
    }

    /// [`annotations`](Self::annotations) using the default edge type.
    pub fn default_annotations(&self, ann: &Annotation) -> GraphResult<Vec<Annotation>> {
        let edge = self.require_default()?;
        self.annotations(&edge, ann)
    }

    /// [`edge_count`](Self::edge_count) using the default edge type.
    pub fn default_edge_count(&self, ann: &Annotation) -> GraphResult<usize> {
        let edge = self.require_default()?;
        self.edge_count(&edge, ann)
    }

    // === Internals ===

    pub(crate) fn with_state<T>(
        &self,
        f: impl FnOnce(&BoundState) -> GraphResult<T>,
    ) -> GraphResult<T> {
        let guard = self.shared.state.borrow();
        match guard.as_ref() {
            Some(state) => f(state),
            None => Err(GraphError::Inactive),
        }
    }

    pub(crate) fn with_state_mut<T>(
        &self,
        f: impl FnOnce(&mut BoundState) -> GraphResult<T>,
    ) -> GraphResult<T> {
        let mut guard = self.shared.state.borrow_mut();
        match guard.as_mut() {
            Some(state) => f(state),
            None => Err(GraphError::Inactive),
        }
    }

    pub(crate) fn ensure_active(&self) -> GraphResult<()> {
        self.with_state(|_| Ok(()))
    }

    pub(crate) fn ensure_member(state: &BoundState, ann: &Annotation) -> GraphResult<()> {
        if state.store.contains_annotation(&state.collection, ann.id()) {
            Ok(())
        } else {
            Err(GraphError::NotInCollection(ann.id()))
        }
    }

    fn require_default(&self) -> GraphResult<String> {
        self.with_state(|state| {
            state
                .registry
                .default_name()
                .map(str::to_string)
                .ok_or(GraphError::NoDefaultEdgeType)
        })
    }

    /// The id sequence stored under `key`, cloned; empty when absent.
    pub(crate) fn id_list(
        state: &BoundState,
        ann: AnnotationId,
        key: &str,
    ) -> GraphResult<Vec<AnnotationId>> {
        state
            .store
            .with_ann_features(&state.collection, ann, |fm| {
                adjacency::ids(fm, key).map(|ids| ids.cloned().unwrap_or_default())
            })
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    fn push_id(
        state: &BoundState,
        ann: AnnotationId,
        key: &str,
        value: AnnotationId,
    ) -> GraphResult<()> {
        state
            .store
            .with_ann_features_mut(&state.collection, ann, |fm| {
                adjacency::ids_or_insert(fm, key).map(|ids| ids.push(value))
            })
            .unwrap_or(Err(GraphError::NotInCollection(ann)))
    }

    /// Remove one occurrence of `value` under `key`, pruning an emptied
    /// sequence. Returns whether an occurrence was found; a vanished
    /// annotation reads as "nothing to remove".
    fn remove_id(
        state: &BoundState,
        ann: AnnotationId,
        key: &str,
        value: AnnotationId,
    ) -> GraphResult<bool> {
        state
            .store
            .with_ann_features_mut(&state.collection, ann, |fm| {
                let removed = match adjacency::ids_mut(fm, key)? {
                    Some(ids) => adjacency::remove_one(ids, value),
                    None => false,
                };
                adjacency::prune_if_empty(fm, key);
                Ok(removed)
            })
            .unwrap_or(Ok(false))
    }

    fn list_contains(
        state: &BoundState,
        ann: AnnotationId,
        key: &str,
        value: AnnotationId,
    ) -> GraphResult<bool> {
        state
            .store
            .with_ann_features(&state.collection, ann, |fm| {
                adjacency::ids(fm, key).map(|ids| ids.map_or(false, |ids| ids.contains(&value)))
            })
            .unwrap_or(Ok(false))
    }

    /// Resolve a stored id back to the live annotation. A stored id
    /// that no longer resolves means the maintainer was bypassed.
    fn resolve(state: &BoundState, id: AnnotationId) -> GraphResult<Annotation> {
        state.store.annotation(&state.collection, id).ok_or_else(|| {
            GraphError::Inconsistent(format!(
                "stored edge id {id} does not resolve to an annotation in {}",
                state.collection
            ))
        })
    }

    /// Remove every outgoing `edge` occurrence of `ann`, repairing the
    /// targets' incoming sequences.
    fn remove_outgoing(
        state: &BoundState,
        edge: &str,
        keys: &EdgeKeys,
        ann: AnnotationId,
    ) -> GraphResult<()> {
        let targets = Self::id_list(state, ann, &keys.to)?;
        for target in targets {
            if !Self::remove_id(state, target, &keys.from, ann)? {
                return Err(GraphError::Inconsistent(format!(
                    "annotation {target} lacks the incoming {edge} entry for {ann}"
                )));
            }
        }
        let _ = state
            .store
            .with_ann_features_mut(&state.collection, ann, |fm| {
                fm.remove(&keys.to);
            });
        Ok(())
    }

    fn resolved(
        &self,
        edge: &str,
        ann: &Annotation,
        referencing: bool,
    ) -> GraphResult<Vec<Annotation>> {
        self.with_state(|state| {
            Self::ensure_member(state, ann)?;
            let keys = state.registry.keys_for(edge)?;
            let key = if referencing { &keys.from } else { &keys.to };
            Self::id_list(state, ann.id(), key)?
                .into_iter()
                .map(|id| Self::resolve(state, id))
                .collect()
        })
    }

    fn id_view(&self, edge: &str, ann: &Annotation, referencing: bool) -> GraphResult<IdsView> {
        self.with_state(|state| {
            Self::ensure_member(state, ann)?;
            let keys = state.registry.keys_for(edge)?;
            let key = if referencing {
                keys.from.clone()
            } else {
                keys.to.clone()
            };
            state
                .store
                .with_ann_features_mut(&state.collection, ann.id(), |fm| {
                    adjacency::ids_or_insert(fm, &key).map(|_| ())
                })
                .unwrap_or(Err(GraphError::NotInCollection(ann.id())))?;
            Ok(IdsView::new(
                state.store.clone(),
                state.collection.clone(),
                ann.id(),
                key,
            ))
        })
    }

    /// Deduplicate by id and order by span start, span end, then id.
    fn document_set(anns: &mut Vec<Annotation>) {
        anns.sort_by_key(|a| (a.span(), a.id()));
        anns.dedup_by_key(|a| a.id());
    }
}

impl std::fmt::Debug for AnnotationGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let guard = self.shared.state.borrow();
        match guard.as_ref() {
            Some(state) => f
                .debug_struct("AnnotationGraph")
                .field("collection", &state.collection)
                .field("edge_types", &state.registry.names())
                .finish(),
            None => f
                .debug_struct("AnnotationGraph")
                .field("active", &false)
                .finish(),
        }
    }
}
