//! # Core Type Definitions
//!
//! Identifiers and the error type shared by every part of the engine:
//! - Kind handles issued by the registry (`KindId`)
//! - Per-record instance identifiers (`InstanceId`)
//! - Arena indices of the value store (`NodeId`)
//! - Error types (`MeaningError`)
//!
//! ## Ordering Guarantees
//!
//! All identifiers implement `Ord` so they can key `BTreeMap`/`BTreeSet`
//! collections and iterate deterministically.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

// =============================================================================
// KIND IDENTIFIERS
// =============================================================================

/// Handle of a registered entity kind.
///
/// Handles are issued by [`crate::KindRegistry`] and are only meaningful
/// relative to the registry that issued them. The persistence format stores
/// kind names next to the handles so a store can be loaded into a different
/// registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct KindId(pub u32);

impl KindId {
    /// Sentinel relationship carried by root (unrelated) entities.
    pub const NULL_RELATIONSHIP: Self = Self(0);
    /// Sentinel entity that root entities are "related to".
    pub const NULL_ENTITY: Self = Self(1);
    /// General purpose composition relationship.
    pub const HAS_A: Self = Self(2);
    /// General purpose classification relationship.
    pub const KIND_OF: Self = Self(3);

    /// Get the raw handle value.
    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for KindId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "kind#{}", self.0)
    }
}

// =============================================================================
// INSTANCE IDENTIFIERS
// =============================================================================

/// Identifier of one concrete instance along an instance-path.
///
/// The nil UUID is reserved for the sentinel root of the value store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InstanceId(pub Uuid);

impl InstanceId {
    /// The identifier of the store's sentinel root.
    pub const NIL: Self = Self(Uuid::nil());

    /// Create a fresh random identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// True for the sentinel root identifier.
    #[must_use]
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

impl Default for InstanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for InstanceId {
    type Err = MeaningError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|e| MeaningError::InvalidValuePath(format!("'{}' is not an instance id: {}", s, e)))
    }
}

// =============================================================================
// NODE IDENTIFIERS
// =============================================================================

/// Arena index of a node in the value store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl NodeId {
    /// The sentinel root of every store.
    pub const ROOT: Self = Self(0);
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur while declaring, parsing or storing.
///
/// - No silent failures
/// - Use `Result<T, MeaningError>` for fallible operations
/// - The engine never panics; all errors are returned to the caller
#[derive(Debug, Error)]
pub enum MeaningError {
    /// Duplicate entity declaration, a missing declaration, or a cardinality violation.
    #[error("Declaration violation: {0}")]
    DeclarationViolation(String),

    /// Undeclared, duplicate or cardinality-violating relationship.
    #[error("Relationship declaration violation: {0}")]
    RelationshipDeclarationViolation(String),

    /// Duplicate abstraction declaration.
    #[error("Abstraction violation: {0}")]
    AbstractionViolation(String),

    /// A schema reaches itself without relationship indirection.
    #[error("Schema {0} is recursive")]
    RecursiveSchema(String),

    /// A declared member is neither a schema nor a value kind.
    #[error("{0} is not a schema or a value kind")]
    EntityDeclarationKindError(String),

    /// Two values land on the same (parent, kind, record number) slot.
    #[error("Duplicate value slot: {0}")]
    DuplicateValueSlot(String),

    /// Value creation could not resolve exactly one field.
    #[error("Expected exactly one field for {path}, found {found}")]
    AmbiguousOrMissingField { path: String, found: usize },

    /// The kind is not registered (or has no schema factory).
    #[error("Unknown kind: {0}")]
    UnknownKind(String),

    /// A kind name was registered twice with different categories.
    #[error("Kind conflict: {0}")]
    KindConflict(String),

    /// Instance-path and type-path disagree, or a path is empty.
    #[error("Invalid value path: {0}")]
    InvalidValuePath(String),

    /// Search values do not share a path length or a parent kind.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// The requested node was not found in the store.
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// A thread panicked while holding the store lock.
    #[error("Store lock poisoned")]
    LockPoisoned,

    /// A serialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// A deserialization error occurred.
    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

// =============================================================================
// TESTS
// =============================================================================
