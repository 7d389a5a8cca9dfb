//! Graph error types

use crate::store::AnnotationId;
use thiserror::Error;

/// Errors from annotation-graph operations.
///
/// All failures are immediate; the graph never retries and never
/// silently absorbs one of these conditions.
#[derive(Debug, Error)]
pub enum GraphError {
    /// A malformed argument, e.g. an empty edge-type name
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation references an edge type that is not registered
    #[error("Unknown edge type: {0}")]
    UnknownEdgeType(String),

    /// A default-edge shorthand was used before a default was set
    #[error("No default edge type set")]
    NoDefaultEdgeType,

    /// An edge endpoint does not belong to the bound collection
    #[error("Annotation {0} is not in the bound collection")]
    NotInCollection(AnnotationId),

    /// Removal of an edge that does not exist
    #[error("No {edge} edge from {from} to {to}")]
    EdgeNotFound {
        edge: String,
        from: AnnotationId,
        to: AnnotationId,
    },

    /// A symmetry check failed; the adjacency encoding was already
    /// corrupt before the detecting call ran
    #[error("Adjacency inconsistency: {0}")]
    Inconsistent(String),

    /// The graph was deactivated and can no longer be used
    #[error("Graph is no longer active")]
    Inactive,
}

/// Result type for graph operations
pub type GraphResult<T> = Result<T, GraphError>;
