//! Spangraph: embedded multi-relation annotation graph
//!
//! A named, multi-relation directed graph layered on top of a mutable
//! collection of positioned text annotations owned by a surrounding
//! pipeline. The graph keeps no adjacency structure of its own: edges
//! are encoded inside the feature bags of their endpoint annotations
//! under reserved keys, kept symmetric and garbage-free while the
//! pipeline adds and removes annotations independently.
//!
//! # Core Concepts
//!
//! - **Annotations**: positioned units (span + feature bag) owned by the
//!   host store
//! - **Edge types**: named relations; each type is an independent
//!   multi-graph over the same annotations
//! - **Graphs**: bound to one (store, collection) pair from construction
//!   until deactivation
//!
//! # Example
//!
//! ```
//! use spangraph::{AnnotationGraph, AnnotationStore, FeatureMap};
//!
//! let store = AnnotationStore::new("doc1");
//! let tokens = store.collection("tokens");
//! let graph = AnnotationGraph::bind(&store, &tokens).unwrap();
//! graph.register_edge_type("next").unwrap();
//!
//! let a = tokens.add(0, 4, "Token", FeatureMap::new()).unwrap();
//! let b = tokens.add(5, 9, "Token", FeatureMap::new()).unwrap();
//! graph.add_edge("next", &a, &b).unwrap();
//! assert!(graph.has_edge("next", &a, &b).unwrap());
//! ```

pub mod graph;
pub mod query;
pub mod store;

pub use graph::{AnnotationGraph, EdgeTypesView, GraphError, GraphResult, IdsView};
pub use query::ClosureQuery;
pub use store::{
    Annotation, AnnotationId, AnnotationStore, Collection, FeatureMap, FeatureValue, Span,
    StoreError, StoreId, StoreObserver, StoreResult, StoreSnapshot,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
