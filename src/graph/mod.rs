//! The annotation graph core: edge-type registry, in-bag adjacency
//! encoding, graph operations, and the consistency maintainer.

mod adjacency;
mod construct;
mod engine;
mod error;
mod maintainer;
mod registry;
mod views;


pub use engine::AnnotationGraph;
pub use error::{GraphError, GraphResult};
pub use views::{EdgeTypesView, IdsView};
