//! # meaning-core
//!
//! The schema and instance engine for Meaning - THE LOGIC.
//!
//! Meaning describes data as *kinds* composed by declarations rather than
//! as tables. A schema kind declares the entities it has, the relationships
//! its entities take part in, and the abstractions it implements. This crate:
//!
//! - holds the declarative model (`kind`, `declaration`, `context`)
//! - flattens a schema into groups of fields addressed by type-paths (`parser`)
//! - stores values by type-path and instance-path in a tree that shares
//!   identical sub-records between parents (`store`)
//! - persists the store as bytes (`formats`)
//!
//! ## Architectural Constraints
//!
//! - No async, no network dependencies (pure Rust)
//! - Deterministic ordering: `BTreeMap`/`BTreeSet` only
//! - File I/O lives in the app layer

// =============================================================================
// MODULES
// =============================================================================

pub mod context;
pub mod declaration;
pub mod field;
pub mod formats;
pub mod kind;
pub mod lookup;
pub mod parser;
pub mod path;
pub mod primitives;
pub mod store;
pub mod types;
pub mod value;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{InstanceId, KindId, MeaningError, NodeId};

// =============================================================================
// RE-EXPORTS: Schema Model
// =============================================================================

pub use context::{Context, ContextEntity, Entity};
pub use declaration::{
    AbstractionDeclaration, Abstractions, CardinalityViolation, EntityDeclaration,
    RelationshipDeclaration, Relationships,
};
pub use kind::{KindCategory, KindInfo, KindRegistry, SchemaFactory};
pub use lookup::{Lookup, LookupComponent};

// =============================================================================
// RE-EXPORTS: Traversal
// =============================================================================

pub use field::{Field, Group};
pub use parser::Parser;
pub use path::{ContextPath, PathSegment, describe_path};

// =============================================================================
// RE-EXPORTS: Value Store
// =============================================================================

pub use store::{ContextNode, ContextNodePath, ContextValueDictionary, KindName, SerializableStore};
pub use value::{ContextValue, TypeInstance};

// =============================================================================
// RE-EXPORTS: Formats (from formats module)
// =============================================================================

pub use formats::{MAX_PERSISTENCE_PAYLOAD_SIZE, PersistenceHeader, store_from_bytes, store_to_bytes};
