//! Higher-level graph construction: ordered chains and coextensive
//! clustering.

use std::collections::HashSet;

use tracing::debug;

use super::engine::AnnotationGraph;
use super::error::{GraphError, GraphResult};
use crate::store::{Annotation, AnnotationId, FeatureMap};

impl AnnotationGraph {
    /// Add one `edge` from `ann` to every annotation in `anns`, in
    /// slice order.
    ///
    /// Callers wanting positional order pass the result of
    /// [`Collection::in_order`](crate::store::Collection::in_order).
    pub fn add_sequence_edges(
        &self,
        edge: &str,
        ann: &Annotation,
        anns: &[Annotation],
    ) -> GraphResult<()> {
        self.with_state(|state| {
            Self::ensure_member(state, ann)?;
            state.registry.keys_for(edge)?;
            Ok(())
        })?;
        for target in anns {
            self.add_edge(edge, ann, target)?;
        }
        Ok(())
    }

    /// Chain the annotations of `anns` in slice order.
    ///
    /// For every consecutive pair: when `successor_edge` is given, an
    /// edge from the earlier to the later annotation is added; when
    /// `predecessor_edge` is given, an edge from the later back to the
    /// earlier one. At least one of the two names is required; fewer
    /// than two annotations is a no-op.
    pub fn make_sequence(
        &self,
        predecessor_edge: Option<&str>,
        successor_edge: Option<&str>,
        anns: &[Annotation],
    ) -> GraphResult<()> {
        self.ensure_active()?;
        if predecessor_edge.is_none() && successor_edge.is_none() {
            return Err(GraphError::InvalidArgument(
                "predecessor and successor edge names cannot both be omitted".to_string(),
            ));
        }
        if anns.len() < 2 {
            return Ok(());
        }
        for pair in anns.windows(2) {
            let (earlier, later) = (&pair[0], &pair[1]);
            if let Some(succ) = successor_edge {
                self.add_edge(succ, earlier, later)?;
            }
            if let Some(pred) = predecessor_edge {
                self.add_edge(pred, later, earlier)?;
            }
        }
        Ok(())
    }

    /// Cluster coextensive annotations under newly created range
    /// annotations.
    ///
    /// `source` is a caller-supplied snapshot; it is never iterated
    /// live, so it may overlap the bound collection this call inserts
    /// into. The snapshot is partitioned into maximal groups sharing an
    /// identical span. For every group of at least `min` members one
    /// annotation of type `new_kind` with an empty feature bag is
    /// created in the bound collection, spanning the group's range, and
    /// an `edge` is added from it to every member. Returns the new
    /// annotations in document order.
    pub fn coextensive_range_annotations(
        &self,
        edge: &str,
        source: &[Annotation],
        new_kind: &str,
        min: usize,
    ) -> GraphResult<Vec<Annotation>> {
        self.with_state(|state| state.registry.keys_for(edge).map(|_| ()))?;
        let mut seen: HashSet<AnnotationId> = HashSet::new();
        let mut ranges: Vec<Annotation> = Vec::new();
        for ann in source {
            if !seen.insert(ann.id()) {
                continue;
            }
            self.with_state(|state| Self::ensure_member(state, ann))?;
            let group: Vec<&Annotation> = source
                .iter()
                .filter(|a| a.span() == ann.span())
                .collect();
            for member in &group {
                seen.insert(member.id());
            }
            if group.len() < min {
                continue;
            }
            let range = self.with_state(|state| {
                state
                    .store
                    .collection(state.collection.as_str())
                    .add(ann.span().start, ann.span().end, new_kind, FeatureMap::new())
                    .map_err(|err| {
                        GraphError::Inconsistent(format!(
                            "bound collection rejected a range annotation: {err}"
                        ))
                    })
            })?;
            for member in &group {
                self.add_edge(edge, &range, member)?;
            }
            ranges.push(range);
        }
        ranges.sort_by_key(|a| (a.span(), a.id()));
        debug!(
            edge,
            kind = new_kind,
            count = ranges.len(),
            "created coextensive range annotations"
        );
        Ok(ranges)
    }
}
