//! Named annotation collections within a store

use std::collections::HashMap;

use super::annotation::{Annotation, AnnotationId, FeatureMap, FeatureValue, Span};
use super::{AnnotationStore, StoreError, StoreId, StoreResult};

/// Storage for one named collection
#[derive(Debug, Default)]
pub(crate) struct CollectionState {
    pub(crate) annotations: HashMap<AnnotationId, Annotation>,
}

/// Handle to one named annotation collection.
///
/// Handles are cheap clones; all of them operate on the same underlying
/// collection inside the store. Removal notifies the store's observers
/// synchronously, after the annotation has left the collection.
#[derive(Debug, Clone)]
pub struct Collection {
    pub(crate) store: AnnotationStore,
    pub(crate) name: String,
}

impl Collection {
    /// The collection name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// A handle to the owning store
    pub fn store(&self) -> AnnotationStore {
        self.store.clone()
    }

    pub(crate) fn store_id(&self) -> StoreId {
        self.store.id()
    }

    /// Create a new annotation covering `start..end` and return it.
    pub fn add(
        &self,
        start: usize,
        end: usize,
        kind: impl Into<String>,
        features: FeatureMap,
    ) -> StoreResult<Annotation> {
        let ann = {
            let mut state = self.store.shared.state.borrow_mut();
            if state.torn_down {
                return Err(StoreError::TornDown);
            }
            let id = AnnotationId(state.next_id);
            state.next_id += 1;
            let ann = Annotation::new(id, Span::new(start, end), kind.into(), features);
            let coll = state
                .collections
                .get_mut(&self.name)
                .ok_or_else(|| StoreError::CollectionNotFound(self.name.clone()))?;
            coll.annotations.insert(id, ann.clone());
            state.touch();
            ann
        };
        self.store
            .notify(|o| o.annotation_added(&self.name, &ann));
        Ok(ann)
    }

    /// Look up an annotation by id
    pub fn get(&self, id: AnnotationId) -> Option<Annotation> {
        self.store.annotation(&self.name, id)
    }

    /// True when the collection currently holds `id`
    pub fn contains(&self, id: AnnotationId) -> bool {
        self.store.contains_annotation(&self.name, id)
    }

    /// Remove an annotation.
    ///
    /// Observers are notified synchronously once the annotation has left
    /// the collection; the returned value still carries its feature bag.
    pub fn remove(&self, id: AnnotationId) -> StoreResult<Annotation> {
        let ann = {
            let mut state = self.store.shared.state.borrow_mut();
            if state.torn_down {
                return Err(StoreError::TornDown);
            }
            let coll = state
                .collections
                .get_mut(&self.name)
                .ok_or_else(|| StoreError::CollectionNotFound(self.name.clone()))?;
            let ann = coll
                .annotations
                .remove(&id)
                .ok_or(StoreError::AnnotationNotFound(id))?;
            state.touch();
            ann
        };
        self.store
            .notify(|o| o.annotation_removed(&self.name, &ann));
        Ok(ann)
    }

    /// Number of annotations currently in the collection
    pub fn len(&self) -> usize {
        let state = self.store.shared.state.borrow();
        state
            .collections
            .get(&self.name)
            .map(|c| c.annotations.len())
            .unwrap_or(0)
    }

    /// True when the collection holds no annotations
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All annotations, in no particular order
    pub fn annotations(&self) -> Vec<Annotation> {
        let state = self.store.shared.state.borrow();
        state
            .collections
            .get(&self.name)
            .map(|c| c.annotations.values().cloned().collect())
            .unwrap_or_default()
    }

    /// All annotations in document order: span start, then span end, then id
    pub fn in_order(&self) -> Vec<Annotation> {
        let mut anns = self.annotations();
        anns.sort_by_key(|a| (a.span(), a.id()));
        anns
    }

    /// Annotations of one type label, in document order
    pub fn of_kind(&self, kind: &str) -> Vec<Annotation> {
        let mut anns: Vec<Annotation> = {
            let state = self.store.shared.state.borrow();
            state
                .collections
                .get(&self.name)
                .map(|c| {
                    c.annotations
                        .values()
                        .filter(|a| a.kind() == kind)
                        .cloned()
                        .collect()
                })
                .unwrap_or_default()
        };
        anns.sort_by_key(|a| (a.span(), a.id()));
        anns
    }

    /// Set one feature on an annotation
    pub fn set_feature(
        &self,
        id: AnnotationId,
        key: impl Into<String>,
        value: FeatureValue,
    ) -> StoreResult<()> {
        self.store
            .with_ann_features_mut(&self.name, id, |fm| {
                fm.insert(key.into(), value);
            })
            .ok_or(StoreError::AnnotationNotFound(id))
    }

    /// Look up one feature of an annotation
    pub fn feature(&self, id: AnnotationId, key: &str) -> Option<FeatureValue> {
        self.store
            .with_ann_features(&self.name, id, |fm| fm.get(key).cloned())
            .flatten()
    }
}
