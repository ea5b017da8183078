//! Ordering key over (kind, id)

use crate::container::ContainerType;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Lookup key for a group of same-kind, same-id children
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerKey {
    /// Container kind
    pub kind: ContainerType,
    /// Segment tag, loop id or element reference
    pub id: String,
}

impl ContainerKey {
    /// Create a key
    pub fn new(kind: ContainerType, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    /// Shorthand for a segment key
    pub fn segment(id: impl Into<String>) -> Self {
        Self::new(ContainerType::Segment, id)
    }

    /// Shorthand for a loop key
    pub fn looped(id: impl Into<String>) -> Self {
        Self::new(ContainerType::Loop, id)
    }

    /// Compare two keys by rank, then id
    #[must_use]
    pub fn compare(a: &ContainerKey, b: &ContainerKey) -> Ordering {
        a.cmp(b)
    }
}

impl Ord for ContainerKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.kind
            .rank()
            .cmp(&other.kind.rank())
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl PartialOrd for ContainerKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ContainerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}
