//! Adjacency encoding inside annotation feature bags.
//!
//! Edges are not kept in a separate structure: for each endpoint the id
//! of the other end is appended to an ordered sequence stored in the
//! annotation's own feature bag, under a reserved key per edge type and
//! direction. Sequences are materialized lazily and deleted again as
//! soon as a removal empties them.

use super::error::{GraphError, GraphResult};
use crate::store::{AnnotationId, FeatureMap, FeatureValue};

/// Prefix of every feature key the graph reserves for itself
pub(crate) const KEY_PREFIX: &str = "_sg";

/// Store metadata key holding the ordered list of registered edge-type names
pub(crate) const EDGES_KEY: &str = "_sg.edges";

/// Store metadata key holding the default edge-type name
pub(crate) const DEFAULT_EDGE_KEY: &str = "_sg.defedge";

/// Reserved feature keys for one edge type, built once at registration.
#[derive(Debug, Clone)]
pub(crate) struct EdgeKeys {
    /// Key of the outgoing id sequence
    pub(crate) to: String,
    /// Key of the incoming id sequence
    pub(crate) from: String,
}

impl EdgeKeys {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            to: format!("{KEY_PREFIX}.to.{name}"),
            from: format!("{KEY_PREFIX}.from.{name}"),
        }
    }
}

/// Read the id sequence under `key`, if present. Never creates anything.
///
/// A reserved key holding anything but an id sequence is pre-existing
/// corruption.
pub(crate) fn ids<'a>(
    features: &'a FeatureMap,
    key: &str,
) -> GraphResult<Option<&'a Vec<AnnotationId>>> {
    match features.get(key) {
        None => Ok(None),
        Some(FeatureValue::Ids(ids)) => Ok(Some(ids)),
        Some(_) => Err(GraphError::Inconsistent(format!(
            "reserved key {key} does not hold an id sequence"
        ))),
    }
}

/// Mutable variant of [`ids`].
pub(crate) fn ids_mut<'a>(
    features: &'a mut FeatureMap,
    key: &str,
) -> GraphResult<Option<&'a mut Vec<AnnotationId>>> {
    match features.get_mut(key) {
        None => Ok(None),
        Some(FeatureValue::Ids(ids)) => Ok(Some(ids)),
        Some(_) => Err(GraphError::Inconsistent(format!(
            "reserved key {key} does not hold an id sequence"
        ))),
    }
}

/// Read the id sequence under `key`, materializing an empty one first if
/// absent.
pub(crate) fn ids_or_insert<'a>(
    features: &'a mut FeatureMap,
    key: &str,
) -> GraphResult<&'a mut Vec<AnnotationId>> {
    let slot = features
        .entry(key.to_string())
        .or_insert_with(|| FeatureValue::Ids(Vec::new()));
    match slot {
        FeatureValue::Ids(ids) => Ok(ids),
        _ => Err(GraphError::Inconsistent(format!(
            "reserved key {key} does not hold an id sequence"
        ))),
    }
}

/// Remove one occurrence of `id` from the sequence. Returns whether an
/// occurrence was found; duplicates are removed one at a time.
pub(crate) fn remove_one(ids: &mut Vec<AnnotationId>, id: AnnotationId) -> bool {
    match ids.iter().position(|&x| x == id) {
        Some(index) => {
            ids.remove(index);
            true
        }
        None => false,
    }
}

/// Delete the reserved key when its sequence is empty.
pub(crate) fn prune_if_empty(features: &mut FeatureMap, key: &str) {
    if matches!(features.get(key), Some(FeatureValue::Ids(ids)) if ids.is_empty()) {
        features.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_carry_the_reserved_prefix() {
        let keys = EdgeKeys::new("next");
        assert_eq!(keys.to, "_sg.to.next");
        assert_eq!(keys.from, "_sg.from.next");
    }

    #[test]
    fn remove_one_takes_a_single_occurrence() {
        let mut ids = vec![AnnotationId(1), AnnotationId(2), AnnotationId(1)];
        assert!(remove_one(&mut ids, AnnotationId(1)));
        assert_eq!(ids, vec![AnnotationId(2), AnnotationId(1)]);
        assert!(remove_one(&mut ids, AnnotationId(1)));
        assert!(!remove_one(&mut ids, AnnotationId(1)));
    }

    #[test]
    fn prune_deletes_only_empty_sequences() {
        let mut fm = FeatureMap::new();
        fm.insert("_sg.to.m".to_string(), FeatureValue::Ids(vec![]));
        prune_if_empty(&mut fm, "_sg.to.m");
        assert!(!fm.contains_key("_sg.to.m"));

        fm.insert(
            "_sg.to.m".to_string(),
            FeatureValue::Ids(vec![AnnotationId(1)]),
        );
        prune_if_empty(&mut fm, "_sg.to.m");
        assert!(fm.contains_key("_sg.to.m"));
    }

    #[test]
    fn ids_rejects_foreign_values_under_reserved_keys() {
        let mut fm = FeatureMap::new();
        fm.insert("_sg.to.m".to_string(), FeatureValue::Int(3));
        assert!(matches!(
            ids(&fm, "_sg.to.m"),
            Err(GraphError::Inconsistent(_))
        ));
        assert!(matches!(
            ids_or_insert(&mut fm, "_sg.to.m"),
            Err(GraphError::Inconsistent(_))
        ));
    }

    #[test]
    fn ids_or_insert_materializes_once() {
        let mut fm = FeatureMap::new();
        ids_or_insert(&mut fm, "_sg.to.m")
            .unwrap()
            .push(AnnotationId(7));
        assert_eq!(
            ids(&fm, "_sg.to.m").unwrap().unwrap(),
            &vec![AnnotationId(7)]
        );
    }
}
