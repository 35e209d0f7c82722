use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Normalised path of a field inside a stream's record schema, one segment
/// per nesting level (`["address", "city"]`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    pub fn new(segments: Vec<String>) -> Self {
        Self(segments)
    }

    pub fn root(name: impl Into<String>) -> Self {
        Self(vec![name.into()])
    }

    pub fn child(&self, name: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(name.into());
        Self(segments)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_top_level(&self) -> bool {
        self.0.len() == 1
    }

    /// First segment as its own path (`address.city` -> `address`).
    pub fn top_level(&self) -> Option<FieldPath> {
        self.0.first().map(|s| FieldPath::root(s.clone()))
    }

    /// True when `self` equals `other` or is one of its ancestors.
    pub fn is_prefix_of(&self, other: &FieldPath) -> bool {
        other.0.len() >= self.0.len() && other.0[..self.0.len()] == self.0[..]
    }
}

impl From<&str> for FieldPath {
    fn from(value: &str) -> Self {
        Self::root(value)
    }
}

impl From<Vec<&str>> for FieldPath {
    fn from(value: Vec<&str>) -> Self {
        Self(value.into_iter().map(str::to_owned).collect())
    }
}

impl Display for FieldPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}
