//! # Kind Registry
//!
//! Every entity, value, relationship and schema kind is registered once and
//! referred to by a [`KindId`] handle afterwards. Schema kinds additionally
//! carry a factory that populates a fresh [`Context`] with the schema's
//! declarations; the parser calls it whenever it needs to look inside a
//! nested schema.
//!
//! Registration is two-phase for schemas: [`KindRegistry::schema`] issues the
//! handle, [`KindRegistry::define_schema`] attaches the factory. This lets a
//! factory refer to its own kind, or to schemas defined later.
//!
//! The registry is built once during setup and then shared read-only; the
//! factories are `Send + Sync` so parsers on different threads can use it.

use crate::{Context, KindId, MeaningError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

// =============================================================================
// CATEGORIES
// =============================================================================

/// What a kind stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum KindCategory {
    /// A plain entity: no fields of its own, only possible abstractions.
    Entity,
    /// A leaf entity that carries a literal.
    Value,
    /// A relationship marker.
    Relationship,
    /// A composite entity with its own declarations.
    Schema,
}

impl fmt::Display for KindCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Entity => "entity",
            Self::Value => "value",
            Self::Relationship => "relationship",
            Self::Schema => "schema",
        };
        f.write_str(name)
    }
}

/// Populates a freshly created schema context with its declarations.
pub type SchemaFactory = Arc<dyn Fn(&mut Context) -> Result<(), MeaningError> + Send + Sync>;

/// Name and category of a registered kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindInfo {
    pub id: KindId,
    pub name: String,
    pub category: KindCategory,
}

// =============================================================================
// REGISTRY
// =============================================================================

/// Interned kind handles plus schema factories.
#[derive(Clone)]
pub struct KindRegistry {
    kinds: Vec<KindInfo>,
    by_name: BTreeMap<String, KindId>,
    factories: BTreeMap<KindId, SchemaFactory>,
}

impl fmt::Debug for KindRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KindRegistry")
            .field("kinds", &self.kinds)
            .field("schemas_defined", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for KindRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl KindRegistry {
    /// Create a registry holding only the built-in kinds.
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Self {
            kinds: Vec::new(),
            by_name: BTreeMap::new(),
            factories: BTreeMap::new(),
        };

        // Order matches the KindId constants.
        for (name, category) in [
            ("NullRelationship", KindCategory::Relationship),
            ("NullEntity", KindCategory::Entity),
            ("HasA", KindCategory::Relationship),
            ("KindOf", KindCategory::Relationship),
        ] {
            registry.push(name, category);
        }

        registry
    }

    fn push(&mut self, name: &str, category: KindCategory) -> KindId {
        let id = KindId(self.kinds.len() as u32);
        self.kinds.push(KindInfo {
            id,
            name: name.to_string(),
            category,
        });
        self.by_name.insert(name.to_string(), id);
        id
    }

    /// Register a kind, or return the existing handle when the name is
    /// already registered with the same category.
    pub fn register(&mut self, name: &str, category: KindCategory) -> Result<KindId, MeaningError> {
        if name.is_empty() {
            return Err(MeaningError::UnknownKind("kind names must not be empty".to_string()));
        }

        if let Some(&existing) = self.by_name.get(name) {
            let info = self.info(existing)?;
            if info.category != category {
                return Err(MeaningError::KindConflict(format!(
                    "{} is already registered as {} (requested {})",
                    name, info.category, category
                )));
            }
            return Ok(existing);
        }

        Ok(self.push(name, category))
    }

    /// Register a plain entity kind.
    pub fn entity(&mut self, name: &str) -> Result<KindId, MeaningError> {
        self.register(name, KindCategory::Entity)
    }

    /// Register a value kind.
    pub fn value(&mut self, name: &str) -> Result<KindId, MeaningError> {
        self.register(name, KindCategory::Value)
    }

    /// Register a relationship kind.
    pub fn relationship(&mut self, name: &str) -> Result<KindId, MeaningError> {
        self.register(name, KindCategory::Relationship)
    }

    /// Register a schema kind without defining it yet.
    pub fn schema(&mut self, name: &str) -> Result<KindId, MeaningError> {
        self.register(name, KindCategory::Schema)
    }

    /// Attach the factory of a registered schema kind, replacing any earlier one.
    pub fn define_schema<F>(&mut self, kind: KindId, factory: F) -> Result<(), MeaningError>
    where
        F: Fn(&mut Context) -> Result<(), MeaningError> + Send + Sync + 'static,
    {
        let info = self.info(kind)?;
        if info.category != KindCategory::Schema {
            return Err(MeaningError::KindConflict(format!(
                "{} is a {} kind, not a schema",
                info.name, info.category
            )));
        }
        self.factories.insert(kind, Arc::new(factory));
        Ok(())
    }

    /// Register a schema kind and define it in one step.
    ///
    /// Use [`KindRegistry::schema`] + [`KindRegistry::define_schema`] when
    /// the factory needs the schema's own handle.
    pub fn schema_with<F>(&mut self, name: &str, factory: F) -> Result<KindId, MeaningError>
    where
        F: Fn(&mut Context) -> Result<(), MeaningError> + Send + Sync + 'static,
    {
        let kind = self.schema(name)?;
        self.define_schema(kind, factory)?;
        Ok(kind)
    }

    /// Create a context for a schema kind and run its factory.
    pub fn instantiate(&self, kind: KindId) -> Result<Context, MeaningError> {
        let factory = self.factories.get(&kind).ok_or_else(|| {
            MeaningError::UnknownKind(format!("{} has no schema definition", self.name(kind)))
        })?;

        let mut context = Context::for_schema(kind);
        (**factory)(&mut context)?;
        Ok(context)
    }

    /// Look up a kind by name.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<KindId> {
        self.by_name.get(name).copied()
    }

    /// Look up a kind by name, failing when it is not registered.
    pub fn require(&self, name: &str) -> Result<KindId, MeaningError> {
        self.lookup(name)
            .ok_or_else(|| MeaningError::UnknownKind(name.to_string()))
    }

    /// Get the registration record of a kind.
    pub fn info(&self, kind: KindId) -> Result<&KindInfo, MeaningError> {
        self.kinds
            .get(kind.0 as usize)
            .ok_or_else(|| MeaningError::UnknownKind(kind.to_string()))
    }

    /// Name of a kind, or its handle rendering when unknown.
    #[must_use]
    pub fn name(&self, kind: KindId) -> String {
        self.kinds
            .get(kind.0 as usize)
            .map(|info| info.name.clone())
            .unwrap_or_else(|| kind.to_string())
    }

    /// Category of a kind.
    pub fn category(&self, kind: KindId) -> Result<KindCategory, MeaningError> {
        self.info(kind).map(|info| info.category)
    }

    /// True when the kind is a registered schema.
    #[must_use]
    pub fn is_schema(&self, kind: KindId) -> bool {
        matches!(self.category(kind), Ok(KindCategory::Schema))
    }

    /// True when the kind is a registered value kind.
    #[must_use]
    pub fn is_value(&self, kind: KindId) -> bool {
        matches!(self.category(kind), Ok(KindCategory::Value))
    }

    /// True when a factory has been attached to the schema kind.
    #[must_use]
    pub fn is_defined(&self, kind: KindId) -> bool {
        self.factories.contains_key(&kind)
    }

    /// All registered kinds in handle order.
    pub fn kinds(&self) -> impl Iterator<Item = &KindInfo> {
        self.kinds.iter()
    }

    /// All defined schema kinds in handle order.
    pub fn schemas(&self) -> impl Iterator<Item = KindId> + '_ {
        self.factories.keys().copied()
    }

    /// Number of registered kinds, built-ins included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    /// Always false: the built-ins are registered on creation.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

// =============================================================================
// TESTS
// =============================================================================
