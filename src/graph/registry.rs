//! Edge-type registry, persisted into the store metadata.
//!
//! The registry is the schema of the graph: only registered names may
//! carry edges. Names and the optional default are mirrored into the
//! bound store's metadata bag so that a graph bound later to the same
//! store starts from the same schema.

use std::collections::{HashMap, HashSet};

use super::adjacency::{EdgeKeys, DEFAULT_EDGE_KEY, EDGES_KEY};
use super::error::{GraphError, GraphResult};
use crate::store::{AnnotationStore, FeatureValue};

#[derive(Debug)]
pub(crate) struct EdgeRegistry {
    /// Registered names, in registration order
    names: Vec<String>,
    /// Reserved feature keys per registered name
    keys: HashMap<String, EdgeKeys>,
    /// Every name this graph instance has ever seen registered
    ever_known: HashSet<String>,
    default_name: Option<String>,
}

impl EdgeRegistry {
    /// Load the registry persisted in the store metadata.
    pub(crate) fn load(store: &AnnotationStore) -> Self {
        let names: Vec<String> = match store.metadata_value(EDGES_KEY) {
            Some(FeatureValue::Strings(names)) => names,
            _ => Vec::new(),
        };
        let keys = names
            .iter()
            .map(|n| (n.clone(), EdgeKeys::new(n)))
            .collect();
        let ever_known = names.iter().cloned().collect();
        let default_name = match store.metadata_value(DEFAULT_EDGE_KEY) {
            Some(FeatureValue::String(name)) if !name.is_empty() => Some(name),
            _ => None,
        };
        Self {
            names,
            keys,
            ever_known,
            default_name,
        }
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.keys.contains_key(name)
    }

    /// Registered names in registration order
    pub(crate) fn names(&self) -> &[String] {
        &self.names
    }

    /// Names ever registered on this instance, including since-unregistered ones
    pub(crate) fn ever_known(&self) -> impl Iterator<Item = &str> {
        self.ever_known.iter().map(String::as_str)
    }

    pub(crate) fn default_name(&self) -> Option<&str> {
        self.default_name.as_deref()
    }

    /// The reserved keys for a registered name.
    pub(crate) fn keys_for(&self, name: &str) -> GraphResult<&EdgeKeys> {
        self.keys
            .get(name)
            .ok_or_else(|| GraphError::UnknownEdgeType(name.to_string()))
    }

    /// Register a name; no-op when already registered.
    pub(crate) fn register(&mut self, store: &AnnotationStore, name: &str) -> GraphResult<()> {
        if name.is_empty() {
            return Err(GraphError::InvalidArgument(
                "edge type name must be non-empty".to_string(),
            ));
        }
        if self.contains(name) {
            return Ok(());
        }
        self.names.push(name.to_string());
        self.keys.insert(name.to_string(), EdgeKeys::new(name));
        self.ever_known.insert(name.to_string());
        self.persist_names(store);
        Ok(())
    }

    /// Drop a registered name. Edge cleanup must already have happened.
    pub(crate) fn unregister(&mut self, store: &AnnotationStore, name: &str) -> GraphResult<()> {
        if self.keys.remove(name).is_none() {
            return Err(GraphError::UnknownEdgeType(name.to_string()));
        }
        self.names.retain(|n| n != name);
        self.persist_names(store);
        Ok(())
    }

    /// Set or clear the default name. Clearing also removes the
    /// persisted value; setting requires the name to be registered.
    pub(crate) fn set_default(
        &mut self,
        store: &AnnotationStore,
        name: Option<&str>,
    ) -> GraphResult<()> {
        match name {
            None | Some("") => {
                self.default_name = None;
                store.remove_metadata_value(DEFAULT_EDGE_KEY);
            }
            Some(name) => {
                if !self.contains(name) {
                    return Err(GraphError::UnknownEdgeType(name.to_string()));
                }
                self.default_name = Some(name.to_string());
                store.set_metadata_value(
                    DEFAULT_EDGE_KEY,
                    FeatureValue::String(name.to_string()),
                );
            }
        }
        Ok(())
    }

    fn persist_names(&self, store: &AnnotationStore) {
        store.set_metadata_value(EDGES_KEY, FeatureValue::Strings(self.names.clone()));
    }
}
