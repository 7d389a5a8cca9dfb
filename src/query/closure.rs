//! Transitive-closure traversal.

use std::collections::{HashSet, VecDeque};

use crate::graph::{AnnotationGraph, GraphError, GraphResult};
use crate::store::{Annotation, AnnotationId};

/// Breadth-first reachability over one or all registered edge types.
///
/// The traversal starts from the origin's immediate targets, so the
/// origin itself is part of the result only when a cycle leads back to
/// it. Membership is what counts; the returned order is discovery
/// order and carries no meaning.
///
/// # Example
///
/// ```
/// use spangraph::{AnnotationGraph, AnnotationStore, ClosureQuery, FeatureMap};
///
/// let store = AnnotationStore::new("doc");
/// let coll = store.collection("anns");
/// let graph = AnnotationGraph::bind(&store, &coll).unwrap();
/// graph.register_edge_type("m").unwrap();
///
/// let a = coll.add(0, 1, "A", FeatureMap::new()).unwrap();
/// let b = coll.add(1, 2, "B", FeatureMap::new()).unwrap();
/// graph.add_edge("m", &a, &b).unwrap();
///
/// let reachable = ClosureQuery::from(&a).over("m").execute(&graph).unwrap();
/// assert_eq!(reachable.len(), 1);
/// assert_eq!(reachable[0].id(), b.id());
/// ```
#[derive(Debug, Clone)]
pub struct ClosureQuery {
    origin: AnnotationId,
    edge: Option<String>,
}

impl ClosureQuery {
    /// Begin a closure query at `origin`.
    ///
    /// Without further restriction the traversal covers every
    /// registered edge type, as with [`over_all`](Self::over_all).
    pub fn from(origin: &Annotation) -> Self {
        Self {
            origin: origin.id(),
            edge: None,
        }
    }

    /// Restrict the traversal to one edge type.
    pub fn over(mut self, edge: impl Into<String>) -> Self {
        self.edge = Some(edge.into());
        self
    }

    /// Traverse every currently registered edge type and union the
    /// per-type closures.
    pub fn over_all(mut self) -> Self {
        self.edge = None;
        self
    }

    /// Execute against `graph`, returning the discovered annotations.
    pub fn execute(&self, graph: &AnnotationGraph) -> GraphResult<Vec<Annotation>> {
        graph.with_state(|state| {
            if !state.store.contains_annotation(&state.collection, self.origin) {
                return Err(GraphError::NotInCollection(self.origin));
            }
            let edges: Vec<String> = match &self.edge {
                Some(edge) => {
                    state.registry.keys_for(edge)?;
                    vec![edge.clone()]
                }
                None => state.registry.names().to_vec(),
            };

            let mut found: Vec<Annotation> = Vec::new();
            let mut member: HashSet<AnnotationId> = HashSet::new();
            for edge in &edges {
                let keys = state.registry.keys_for(edge)?;
                let mut visited: HashSet<AnnotationId> = HashSet::new();
                let mut queue: VecDeque<AnnotationId> =
                    AnnotationGraph::id_list(state, self.origin, &keys.to)?.into();
                while let Some(id) = queue.pop_front() {
                    if !visited.insert(id) {
                        continue;
                    }
                    let ann = state.store.annotation(&state.collection, id).ok_or_else(
                        || {
                            GraphError::Inconsistent(format!(
                                "stored edge id {id} does not resolve to an annotation in {}",
                                state.collection
                            ))
                        },
                    )?;
                    queue.extend(AnnotationGraph::id_list(state, id, &keys.to)?);
                    if member.insert(id) {
                        found.push(ann);
                    }
                }
            }
            Ok(found)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{AnnotationStore, Collection, FeatureMap};

    fn setup() -> (AnnotationStore, Collection, AnnotationGraph) {
        let store = AnnotationStore::new("doc");
        let coll = store.collection("anns");
        let graph = AnnotationGraph::bind(&store, &coll).unwrap();
        (store, coll, graph)
    }

    fn ann(coll: &Collection, start: usize, end: usize, kind: &str) -> Annotation {
        coll.add(start, end, kind, FeatureMap::new()).unwrap()
    }

    fn ids(anns: &[Annotation]) -> HashSet<AnnotationId> {
        anns.iter().map(|a| a.id()).collect()
    }

    #[test]
    fn closure_excludes_the_origin_without_a_cycle() {
        let (_store, coll, graph) = setup();
        graph.register_edge_type("m").unwrap();
        let root = ann(&coll, 3, 5, "R");
        let left = ann(&coll, 0, 1, "L");
        let m1 = ann(&coll, 1, 2, "M1");
        let m2 = ann(&coll, 1, 2, "M2");
        let m3 = ann(&coll, 1, 2, "M3");
        for target in [&m1, &m2, &m3] {
            graph.add_edge("m", &left, target).unwrap();
        }
        graph.add_edge("m", &root, &left).unwrap();

        let reachable = ClosureQuery::from(&root).over("m").execute(&graph).unwrap();
        let reached = ids(&reachable);
        assert_eq!(reachable.len(), 4);
        for present in [&left, &m1, &m2, &m3] {
            assert!(reached.contains(&present.id()));
        }
        assert!(!reached.contains(&root.id()));
    }

    #[test]
    fn cycles_terminate_and_include_the_origin() {
        let (_store, coll, graph) = setup();
        graph.register_edge_type("m").unwrap();
        let a = ann(&coll, 0, 1, "A");
        let b = ann(&coll, 1, 2, "B");
        let c = ann(&coll, 2, 3, "C");
        graph.add_edge("m", &a, &b).unwrap();
        graph.add_edge("m", &b, &c).unwrap();
        graph.add_edge("m", &c, &a).unwrap();

        let reachable = ClosureQuery::from(&a).over("m").execute(&graph).unwrap();
        let reached = ids(&reachable);
        assert_eq!(reached.len(), 3);
        assert!(reached.contains(&a.id()));
    }

    #[test]
    fn closure_of_an_isolated_annotation_is_empty() {
        let (_store, coll, graph) = setup();
        graph.register_edge_type("m").unwrap();
        let lonely = ann(&coll, 0, 1, "A");
        let reachable = ClosureQuery::from(&lonely)
            .over("m")
            .execute(&graph)
            .unwrap();
        assert!(reachable.is_empty());
    }

    #[test]
    fn closure_requires_a_registered_edge_and_a_member_origin() {
        let (store, coll, graph) = setup();
        graph.register_edge_type("m").unwrap();
        let a = ann(&coll, 0, 1, "A");
        assert!(matches!(
            ClosureQuery::from(&a).over("nope").execute(&graph),
            Err(GraphError::UnknownEdgeType(_))
        ));

        let stranger = store
            .collection("other")
            .add(0, 1, "X", FeatureMap::new())
            .unwrap();
        assert!(matches!(
            ClosureQuery::from(&stranger).over("m").execute(&graph),
            Err(GraphError::NotInCollection(_))
        ));
    }

    #[test]
    fn over_all_unions_every_registered_type() {
        let (_store, coll, graph) = setup();
        graph.register_edge_types(["m", "n"]).unwrap();
        let a = ann(&coll, 0, 1, "A");
        let b = ann(&coll, 1, 2, "B");
        let c = ann(&coll, 2, 3, "C");
        let d = ann(&coll, 3, 4, "D");
        graph.add_edge("m", &a, &b).unwrap();
        graph.add_edge("n", &a, &c).unwrap();
        graph.add_edge("n", &c, &d).unwrap();

        let reachable = ClosureQuery::from(&a).over_all().execute(&graph).unwrap();
        let reached = ids(&reachable);
        assert_eq!(reached.len(), 3);
        for present in [&b, &c, &d] {
            assert!(reached.contains(&present.id()));
        }
    }

    #[test]
    fn over_all_does_not_chain_across_types() {
        let (_store, coll, graph) = setup();
        graph.register_edge_types(["m", "n"]).unwrap();
        let a = ann(&coll, 0, 1, "A");
        let b = ann(&coll, 1, 2, "B");
        let c = ann(&coll, 2, 3, "C");
        // a -m-> b -n-> c: c is not reachable via any single type
        graph.add_edge("m", &a, &b).unwrap();
        graph.add_edge("n", &b, &c).unwrap();

        let reachable = ClosureQuery::from(&a).over_all().execute(&graph).unwrap();
        let reached = ids(&reachable);
        assert!(reached.contains(&b.id()));
        assert!(!reached.contains(&c.id()));
    }

    #[test]
    fn inactive_graph_rejects_closure_queries() {
        let (_store, coll, graph) = setup();
        graph.register_edge_type("m").unwrap();
        let a = ann(&coll, 0, 1, "A");
        graph.close();
        assert!(matches!(
            ClosureQuery::from(&a).over("m").execute(&graph),
            Err(GraphError::Inactive)
        ));
    }
}
