//! # Context
//!
//! The runtime container of a schema: its entity, relationship and
//! abstraction declarations, the entities instantiated in it, and an
//! optional lookup recipe.
//!
//! A context created by [`crate::KindRegistry::instantiate`] is bound to its
//! schema kind; [`Context::new`] creates a free-standing one.
//!
//! ## Rollback Policy
//!
//! An addition that violates a declaration is undone before the error is
//! returned, unless the declaration's minimum is not yet met. In that case
//! the entity stays and no error is raised, so a multi-entity minimum can be
//! satisfied one addition at a time.

use crate::declaration::{
    AbstractionDeclaration, Abstractions, EntityDeclaration, RelationshipDeclaration,
    Relationships,
};
use crate::{InstanceId, KindId, Lookup, MeaningError};
use tracing::warn;

// =============================================================================
// ENTITIES
// =============================================================================

/// A concrete entity instance. Identity is the instance id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Entity {
    pub id: InstanceId,
    pub kind: KindId,
}

impl Entity {
    /// Create a new instance of `kind`.
    #[must_use]
    pub fn new(kind: KindId) -> Self {
        Self {
            id: InstanceId::new(),
            kind,
        }
    }

    /// The sentinel that root entities are related to.
    #[must_use]
    pub const fn null() -> Self {
        Self {
            id: InstanceId::NIL,
            kind: KindId::NULL_ENTITY,
        }
    }
}

/// An instantiated (concrete, related-to, relationship) triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextEntity {
    pub concrete: Entity,
    pub related_to: Entity,
    pub relationship: KindId,
}

impl ContextEntity {
    /// A root entry: null relationship to the null entity.
    #[must_use]
    pub fn root(entity: Entity) -> Self {
        Self {
            concrete: entity,
            related_to: Entity::null(),
            relationship: KindId::NULL_RELATIONSHIP,
        }
    }

    /// `target` is in `relationship` with `source`.
    #[must_use]
    pub fn related(relationship: KindId, target: Entity, source: Entity) -> Self {
        Self {
            concrete: target,
            related_to: source,
            relationship,
        }
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.relationship == KindId::NULL_RELATIONSHIP
    }
}

// =============================================================================
// CONTEXT
// =============================================================================

/// Runtime container of declarations and instantiated entities.
#[derive(Debug, Clone, Default)]
pub struct Context {
    kind: Option<KindId>,
    label: Option<String>,
    declarations: Vec<EntityDeclaration>,
    relationships: Relationships,
    abstractions: Abstractions,
    entities: Vec<ContextEntity>,
    lookup: Option<Lookup>,
}

impl Context {
    /// Create a free-standing context not bound to a schema kind.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty context bound to a schema kind.
    #[must_use]
    pub fn for_schema(kind: KindId) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }

    /// The schema kind this context was instantiated for.
    #[must_use]
    pub fn kind(&self) -> Option<KindId> {
        self.kind
    }

    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn set_label(&mut self, label: impl Into<String>) -> &mut Self {
        self.label = Some(label.into());
        self
    }

    // -------------------------------------------------------------------------
    // Declarations
    // -------------------------------------------------------------------------

    /// Declare an entity kind. At most one declaration per kind.
    pub fn declare(&mut self, kind: KindId) -> Result<&mut EntityDeclaration, MeaningError> {
        if self.declarations.iter().any(|d| d.kind() == kind) {
            return Err(MeaningError::DeclarationViolation(format!(
                "declarations must be unique, {} is declared twice",
                kind
            )));
        }

        self.declarations.push(EntityDeclaration::new(kind));
        let index = self.declarations.len() - 1;
        Ok(&mut self.declarations[index])
    }

    /// Declare that `target` participates in `relationship` with `source`.
    pub fn declare_relationship(
        &mut self,
        relationship: KindId,
        target: KindId,
        source: KindId,
    ) -> Result<&mut RelationshipDeclaration, MeaningError> {
        self.relationships.add(relationship, target, source)
    }

    /// `kind` must participate in some relationship; it may not be a bare root.
    pub fn relationship_required(
        &mut self,
        kind: KindId,
    ) -> Result<&mut RelationshipDeclaration, MeaningError> {
        let decl =
            self.relationships
                .add(KindId::NULL_RELATIONSHIP, kind, KindId::NULL_ENTITY)?;
        Ok(decl.min(1).max(0))
    }

    /// Declare that `sub_kind` is-a `super_kind`.
    pub fn add_abstraction(
        &mut self,
        sub_kind: KindId,
        super_kind: KindId,
    ) -> Result<&mut AbstractionDeclaration, MeaningError> {
        self.abstractions.add(sub_kind, super_kind)
    }

    /// Start a lookup recipe with literal text.
    pub fn lookup_renderer(&mut self, text: impl Into<String>) -> &mut Lookup {
        let mut lookup = Lookup::new();
        lookup.text(text);
        self.lookup.insert(lookup)
    }

    /// Start a lookup recipe with a value kind.
    pub fn lookup_renderer_value(&mut self, kind: KindId) -> &mut Lookup {
        let mut lookup = Lookup::new();
        lookup.value(kind);
        self.lookup.insert(lookup)
    }

    // -------------------------------------------------------------------------
    // Instances
    // -------------------------------------------------------------------------

    /// Add a root entity.
    pub fn add(&mut self, entity: Entity) -> Result<(), MeaningError> {
        self.entities.push(ContextEntity::root(entity));
        self.check_entity_declaration(entity)?;
        self.check_relationship_cardinality(KindId::NULL_RELATIONSHIP, entity, Entity::null())
    }

    /// Add `target` in `relationship` with `source`.
    pub fn add_related(
        &mut self,
        relationship: KindId,
        target: Entity,
        source: Entity,
    ) -> Result<(), MeaningError> {
        if !self.relationships.is_empty()
            && !self
                .relationships
                .exists_for(relationship, target.kind, source.kind)
        {
            return Err(MeaningError::RelationshipDeclarationViolation(format!(
                "{} is not declared for {} related to {}",
                relationship, target.kind, source.kind
            )));
        }

        self.entities
            .push(ContextEntity::related(relationship, target, source));
        self.check_entity_declaration(target)?;
        self.check_relationship_cardinality(relationship, target, source)
    }

    fn undo_last(&mut self) {
        self.entities.pop();
    }

    fn check_entity_declaration(&mut self, entity: Entity) -> Result<(), MeaningError> {
        if self.declarations.is_empty() {
            return Ok(());
        }

        let Some(decl) = self.declarations.iter().find(|d| d.kind() == entity.kind) else {
            self.undo_last();
            return Err(MeaningError::DeclarationViolation(format!(
                "no declaration exists for {}",
                entity.kind
            )));
        };

        if decl.validate(&self.entities) {
            return Ok(());
        }

        let minimum = decl.minimum();
        let count = decl.count(&self.entities);
        if minimum <= count {
            self.undo_last();
            warn!(kind = %entity.kind, count, "entity addition rolled back");
            return Err(MeaningError::DeclarationViolation(format!(
                "{} instances of {} violate its declaration",
                count, entity.kind
            )));
        }

        Ok(())
    }

    fn check_relationship_cardinality(
        &mut self,
        relationship: KindId,
        target: Entity,
        source: Entity,
    ) -> Result<(), MeaningError> {
        if self.relationships.is_empty() {
            return Ok(());
        }

        let Some(violation) = self.relationships.validate_addition(
            relationship,
            &target,
            source.kind,
            &self.entities,
        ) else {
            return Ok(());
        };

        if violation.minimum <= violation.count {
            self.undo_last();
            warn!(
                relationship = %relationship,
                target = %target.kind,
                count = violation.count,
                "relationship addition rolled back"
            );
            return Err(MeaningError::RelationshipDeclarationViolation(format!(
                "{} entries of {} for {} violate its declaration",
                violation.count, relationship, target.kind
            )));
        }

        Ok(())
    }

    /// True when every declaration and every related entry is satisfied.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.declarations.iter().all(|d| d.validate(&self.entities))
            && self
                .entities
                .iter()
                .filter(|ce| !ce.is_root())
                .all(|ce| self.relationships.validate(ce, &self.entities))
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// All instantiated entries in insertion order.
    #[must_use]
    pub fn entities(&self) -> &[ContextEntity] {
        &self.entities
    }

    /// Entries whose concrete entity is of `kind`.
    #[must_use]
    pub fn get_kind(&self, kind: KindId) -> Vec<&ContextEntity> {
        self.entities
            .iter()
            .filter(|ce| ce.concrete.kind == kind)
            .collect()
    }

    /// Entries whose concrete entity is `entity`.
    #[must_use]
    pub fn get_entity(&self, entity: &Entity) -> Vec<&ContextEntity> {
        self.entities
            .iter()
            .filter(|ce| ce.concrete.id == entity.id)
            .collect()
    }

    /// The declared entity kinds, in declaration order.
    #[must_use]
    pub fn root_entities(&self) -> &[EntityDeclaration] {
        &self.declarations
    }

    #[must_use]
    pub fn relationships(&self) -> &[RelationshipDeclaration] {
        self.relationships.as_slice()
    }

    #[must_use]
    pub fn abstractions(&self) -> &[AbstractionDeclaration] {
        self.abstractions.as_slice()
    }

    /// Abstractions declared for `sub_kind`.
    #[must_use]
    pub fn abstractions_of(&self, sub_kind: KindId) -> Vec<&AbstractionDeclaration> {
        self.abstractions.abstractions_of(sub_kind)
    }

    /// Abstractions whose super kind is `super_kind`.
    #[must_use]
    pub fn implementations_of(&self, super_kind: KindId) -> Vec<&AbstractionDeclaration> {
        self.abstractions.implementations_of(super_kind)
    }

    #[must_use]
    pub fn lookup(&self) -> Option<&Lookup> {
        self.lookup.as_ref()
    }

    #[must_use]
    pub fn has_lookup(&self) -> bool {
        self.lookup.is_some()
    }
}

// =============================================================================
// TESTS
// =============================================================================
