//! Annotations: positioned, identifiable units carrying a feature bag

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Stable identifier of an annotation, unique for its lifetime within one store.
///
/// Serializes as a plain integer.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct AnnotationId(pub(crate) u32);

impl AnnotationId {
    /// Get the raw integer value
    pub fn value(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for AnnotationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The character range an annotation covers.
///
/// Spans are used only for ordering and for grouping coextensive
/// annotations; the store does not interpret them further.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    /// Create a new span
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Number of characters covered
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// True when the span covers no characters
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// True when both spans cover exactly the same range
    pub fn coextensive(&self, other: &Span) -> bool {
        self == other
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Typed feature values
///
/// `Ids` holds an ordered annotation-id sequence; graph adjacency is
/// stored with this variant under reserved keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Strings(Vec<String>),
    Ids(Vec<AnnotationId>),
}

impl FeatureValue {
    /// The string value, if this is a `String`
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FeatureValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// The id sequence, if this is an `Ids`
    pub fn as_ids(&self) -> Option<&[AnnotationId]> {
        match self {
            FeatureValue::Ids(ids) => Some(ids),
            _ => None,
        }
    }
}

impl From<&str> for FeatureValue {
    fn from(s: &str) -> Self {
        FeatureValue::String(s.to_string())
    }
}

impl From<String> for FeatureValue {
    fn from(s: String) -> Self {
        FeatureValue::String(s)
    }
}

impl From<i64> for FeatureValue {
    fn from(n: i64) -> Self {
        FeatureValue::Int(n)
    }
}

impl From<bool> for FeatureValue {
    fn from(b: bool) -> Self {
        FeatureValue::Bool(b)
    }
}

/// Feature collection
pub type FeatureMap = HashMap<String, FeatureValue>;

/// A positioned unit from the host store.
///
/// Carries a stable id, a span used for ordering, a type label, and a
/// mutable feature bag holding both domain features and, for annotations
/// participating in a graph, reserved adjacency keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    id: AnnotationId,
    span: Span,
    kind: String,
    features: FeatureMap,
}

impl Annotation {
    pub(crate) fn new(id: AnnotationId, span: Span, kind: String, features: FeatureMap) -> Self {
        Self {
            id,
            span,
            kind,
            features,
        }
    }

    /// Stable identifier within the owning store
    pub fn id(&self) -> AnnotationId {
        self.id
    }

    /// The character range this annotation covers
    pub fn span(&self) -> Span {
        self.span
    }

    /// The type label, e.g. "Token" or "Sentence"
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The feature bag
    pub fn features(&self) -> &FeatureMap {
        &self.features
    }

    pub(crate) fn features_mut(&mut self) -> &mut FeatureMap {
        &mut self.features
    }

    /// Look up a single feature
    pub fn feature(&self, key: &str) -> Option<&FeatureValue> {
        self.features.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_ordering_is_start_then_end() {
        let a = Span::new(0, 5);
        let b = Span::new(0, 7);
        let c = Span::new(2, 3);
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn coextensive_requires_identical_range() {
        assert!(Span::new(3, 4).coextensive(&Span::new(3, 4)));
        assert!(!Span::new(3, 4).coextensive(&Span::new(3, 5)));
    }

    #[test]
    fn annotation_id_serializes_as_integer() {
        let id = AnnotationId(42);
        assert_eq!(serde_json::to_string(&id).unwrap(), "42");
    }

    #[test]
    fn feature_value_untagged_roundtrip() {
        let v = FeatureValue::Ids(vec![AnnotationId(1), AnnotationId(2)]);
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, "[1,2]");
        let back: FeatureValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);

        let v = FeatureValue::Strings(vec!["next".to_string()]);
        let json = serde_json::to_string(&v).unwrap();
        let back: FeatureValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);
    }
}
