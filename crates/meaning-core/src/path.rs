//! # Type-Paths
//!
//! A field's address in a schema is the ordered list of segments walked from
//! the root schema down to the field's value kind. Each segment records how
//! the parser reached the kind.

use crate::{KindId, KindRegistry};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a kind was reached during traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PathSegment {
    /// The schema being parsed.
    Root,
    /// The super kind of an abstraction.
    Abstraction,
    /// A schema entered as the source of a relationship.
    Relationship,
    /// A schema declared as a member of the schema above it.
    HasA,
    /// A value kind.
    Field,
    /// A schema declared as a member of a `HasA` schema.
    Child,
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Root => "Root",
            Self::Abstraction => "Abstraction",
            Self::Relationship => "Relationship",
            Self::HasA => "HasA",
            Self::Field => "Field",
            Self::Child => "Child",
        };
        f.write_str(name)
    }
}

/// One segment of a type-path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContextPath {
    pub segment: PathSegment,
    pub kind: KindId,
}

impl ContextPath {
    #[must_use]
    pub const fn new(segment: PathSegment, kind: KindId) -> Self {
        Self { segment, kind }
    }
}

/// Render a type-path as `[Root]Employee.[HasA]PersonName.[Field]FirstName`.
#[must_use]
pub fn describe_path(registry: &KindRegistry, path: &[ContextPath]) -> String {
    path.iter()
        .map(|p| format!("[{}]{}", p.segment, registry.name(p.kind)))
        .collect::<Vec<_>>()
        .join(".")
}
