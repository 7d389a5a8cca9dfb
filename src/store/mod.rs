//! Host-store boundary: annotation collections, feature bags, and
//! synchronous lifecycle notifications.
//!
//! The store owns every annotation; graphs bound to one of its
//! collections only ever write into annotation feature bags and the
//! store-scope metadata bag. Everything here is single-threaded:
//! handles are cheap `Rc` clones sharing one interior, and observer
//! notifications are delivered synchronously before the mutating call
//! returns.

mod annotation;
mod collection;

pub use annotation::{Annotation, AnnotationId, FeatureMap, FeatureValue, Span};
pub use collection::Collection;

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::{Rc, Weak};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use collection::CollectionState;

/// Identity of a store instance.
///
/// Used to match teardown notifications against the store a graph is
/// bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoreId(Uuid);

impl StoreId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for StoreId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors from the store boundary
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store has been torn down")]
    TornDown,

    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("Annotation not found: {0}")]
    AnnotationNotFound(AnnotationId),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Observer interface for store lifecycle events.
///
/// The integration layer registers observers with [`AnnotationStore::subscribe`];
/// the store invokes them synchronously, after its own state change has
/// completed, and the reaction finishes before the mutating call returns.
pub trait StoreObserver {
    /// A new annotation entered `collection`. Default: ignore.
    fn annotation_added(&self, _collection: &str, _ann: &Annotation) {}

    /// An annotation left `collection`; `ann` still carries its feature bag.
    fn annotation_removed(&self, collection: &str, ann: &Annotation);

    /// A whole collection was removed from the store.
    fn collection_removed(&self, name: &str);

    /// The store itself was torn down.
    fn store_torn_down(&self, store: StoreId);
}

pub(crate) struct StoreState {
    pub(crate) name: String,
    pub(crate) metadata: FeatureMap,
    pub(crate) collections: HashMap<String, CollectionState>,
    pub(crate) next_id: u32,
    pub(crate) torn_down: bool,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

impl StoreState {
    pub(crate) fn touch(&mut self) {
        self.updated_at = Some(Utc::now());
    }
}

pub(crate) struct StoreShared {
    id: StoreId,
    pub(crate) state: RefCell<StoreState>,
    observers: RefCell<Vec<Weak<dyn StoreObserver>>>,
}

/// The mutable annotation store a pipeline works on.
///
/// Owns named collections of positioned annotations plus a store-scope
/// metadata bag; a graph persists its edge-type registry into that bag.
/// The handle is a cheap clone.
#[derive(Clone)]
pub struct AnnotationStore {
    pub(crate) shared: Rc<StoreShared>,
}

impl std::fmt::Debug for AnnotationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.borrow();
        f.debug_struct("AnnotationStore")
            .field("id", &self.shared.id)
            .field("name", &state.name)
            .field("collections", &state.collections.len())
            .finish()
    }
}

impl AnnotationStore {
    /// Create a new, empty store
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            shared: Rc::new(StoreShared {
                id: StoreId::new(),
                state: RefCell::new(StoreState {
                    name: name.into(),
                    metadata: FeatureMap::new(),
                    collections: HashMap::new(),
                    next_id: 0,
                    torn_down: false,
                    created_at: Utc::now(),
                    updated_at: None,
                }),
                observers: RefCell::new(Vec::new()),
            }),
        }
    }

    /// The store identity
    pub fn id(&self) -> StoreId {
        self.shared.id
    }

    /// The store name
    pub fn name(&self) -> String {
        self.shared.state.borrow().name.clone()
    }

    /// When the store was created
    pub fn created_at(&self) -> DateTime<Utc> {
        self.shared.state.borrow().created_at
    }

    /// When the store was last mutated, if ever
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.shared.state.borrow().updated_at
    }

    /// True once [`tear_down`](Self::tear_down) has run
    pub fn is_torn_down(&self) -> bool {
        self.shared.state.borrow().torn_down
    }

    /// Get a handle to a named collection, creating it if absent.
    pub fn collection(&self, name: impl Into<String>) -> Collection {
        let name = name.into();
        {
            let mut state = self.shared.state.borrow_mut();
            if !state.torn_down {
                state
                    .collections
                    .entry(name.clone())
                    .or_insert_with(CollectionState::default);
            }
        }
        Collection {
            store: self.clone(),
            name,
        }
    }

    /// True when a collection of that name exists
    pub fn has_collection(&self, name: &str) -> bool {
        self.shared.state.borrow().collections.contains_key(name)
    }

    /// Names of all collections, sorted
    pub fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .shared
            .state
            .borrow()
            .collections
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Remove a collection and everything in it, notifying observers.
    pub fn remove_collection(&self, name: &str) -> StoreResult<()> {
        {
            let mut state = self.shared.state.borrow_mut();
            if state.torn_down {
                return Err(StoreError::TornDown);
            }
            if state.collections.remove(name).is_none() {
                return Err(StoreError::CollectionNotFound(name.to_string()));
            }
            state.touch();
        }
        self.notify(|o| o.collection_removed(name));
        Ok(())
    }

    /// Tear the store down: drop every collection and notify observers.
    /// Idempotent; observers are notified once.
    pub fn tear_down(&self) {
        let already = {
            let mut state = self.shared.state.borrow_mut();
            let already = state.torn_down;
            state.torn_down = true;
            state.collections.clear();
            already
        };
        if !already {
            self.notify(|o| o.store_torn_down(self.id()));
        }
    }

    /// Read one store-scope metadata value
    pub fn metadata_value(&self, key: &str) -> Option<FeatureValue> {
        self.shared.state.borrow().metadata.get(key).cloned()
    }

    /// Set one store-scope metadata value
    pub fn set_metadata_value(&self, key: impl Into<String>, value: FeatureValue) {
        let mut state = self.shared.state.borrow_mut();
        state.metadata.insert(key.into(), value);
        state.touch();
    }

    /// Remove one store-scope metadata value
    pub fn remove_metadata_value(&self, key: &str) {
        let mut state = self.shared.state.borrow_mut();
        state.metadata.remove(key);
        state.touch();
    }

    /// Register an observer for lifecycle notifications.
    ///
    /// The store only keeps a weak reference; dropped observers are
    /// pruned during delivery.
    pub fn subscribe(&self, observer: Weak<dyn StoreObserver>) {
        self.shared.observers.borrow_mut().push(observer);
    }

    /// A serializable dump of the whole store
    pub fn snapshot(&self) -> StoreSnapshot {
        let state = self.shared.state.borrow();
        StoreSnapshot {
            name: state.name.clone(),
            metadata: state.metadata.clone(),
            collections: state
                .collections
                .iter()
                .map(|(name, coll)| {
                    let mut anns: Vec<Annotation> =
                        coll.annotations.values().cloned().collect();
                    anns.sort_by_key(|a| (a.span(), a.id()));
                    (name.clone(), anns)
                })
                .collect(),
        }
    }

    /// The store snapshot rendered as pretty JSON
    pub fn snapshot_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.snapshot())
    }

    /// Deliver a notification to every live observer. The state borrow
    /// must already be released; observers may re-enter the store.
    pub(crate) fn notify(&self, f: impl Fn(&dyn StoreObserver)) {
        let observers: Vec<Rc<dyn StoreObserver>> = {
            let mut obs = self.shared.observers.borrow_mut();
            obs.retain(|w| w.strong_count() > 0);
            obs.iter().filter_map(Weak::upgrade).collect()
        };
        for observer in observers {
            f(observer.as_ref());
        }
    }

    pub(crate) fn with_ann_features<T>(
        &self,
        collection: &str,
        id: AnnotationId,
        f: impl FnOnce(&FeatureMap) -> T,
    ) -> Option<T> {
        let state = self.shared.state.borrow();
        let ann = state.collections.get(collection)?.annotations.get(&id)?;
        Some(f(ann.features()))
    }

    pub(crate) fn with_ann_features_mut<T>(
        &self,
        collection: &str,
        id: AnnotationId,
        f: impl FnOnce(&mut FeatureMap) -> T,
    ) -> Option<T> {
        let mut state = self.shared.state.borrow_mut();
        let ann = state
            .collections
            .get_mut(collection)?
            .annotations
            .get_mut(&id)?;
        Some(f(ann.features_mut()))
    }

    pub(crate) fn annotation(&self, collection: &str, id: AnnotationId) -> Option<Annotation> {
        let state = self.shared.state.borrow();
        state
            .collections
            .get(collection)?
            .annotations
            .get(&id)
            .cloned()
    }

    pub(crate) fn contains_annotation(&self, collection: &str, id: AnnotationId) -> bool {
        let state = self.shared.state.borrow();
        state
            .collections
            .get(collection)
            .map(|c| c.annotations.contains_key(&id))
            .unwrap_or(false)
    }

    pub(crate) fn annotation_ids(&self, collection: &str) -> Vec<AnnotationId> {
        let state = self.shared.state.borrow();
        state
            .collections
            .get(collection)
            .map(|c| c.annotations.keys().copied().collect())
            .unwrap_or_default()
    }
}

/// Serializable dump of a store, collections in name order and
/// annotations in document order.
#[derive(Debug, Clone, Serialize)]
pub struct StoreSnapshot {
    pub name: String,
    pub metadata: FeatureMap,
    pub collections: BTreeMap<String, Vec<Annotation>>,
}
