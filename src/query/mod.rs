//! Traversal queries over an annotation graph

mod closure;

pub use closure::ClosureQuery;
