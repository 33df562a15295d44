//! # Declaration Model
//!
//! Entity, relationship and abstraction declarations plus the collections
//! that own them inside a [`crate::Context`].
//!
//! Declarations are configured through `&mut Self` builders right after
//! they are declared:
//!
//! ```text
//! ctx.declare(first_name)?.labeled("First Name").one_and_only_one();
//! ctx.declare_relationship(beneficiary, employee, person)?.or(business).min(1);
//! ctx.add_abstraction(spouse, person_context)?.coalesce();
//! ```
//!
//! Cardinality maxima use `usize::MAX` for "unbounded".

use crate::{ContextEntity, Entity, KindId, MeaningError};
use std::collections::BTreeSet;

/// Count the distinct entity instances of `kind` among `entities`.
fn distinct_instances(kind: KindId, entities: &[ContextEntity]) -> usize {
    entities
        .iter()
        .filter(|ce| ce.concrete.kind == kind)
        .map(|ce| ce.concrete.id)
        .collect::<BTreeSet<_>>()
        .len()
}

// =============================================================================
// ENTITY DECLARATION
// =============================================================================

/// "This context holds between `minimum` and `maximum` instances of `kind`."
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDeclaration {
    kind: KindId,
    label: Option<String>,
    minimum: usize,
    maximum: usize,
}

impl EntityDeclaration {
    /// Create a declaration with the default cardinality (zero or more).
    #[must_use]
    pub fn new(kind: KindId) -> Self {
        Self {
            kind,
            label: None,
            minimum: 0,
            maximum: usize::MAX,
        }
    }

    #[must_use]
    pub fn kind(&self) -> KindId {
        self.kind
    }

    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    #[must_use]
    pub fn minimum(&self) -> usize {
        self.minimum
    }

    #[must_use]
    pub fn maximum(&self) -> usize {
        self.maximum
    }

    /// Set the display label.
    pub fn labeled(&mut self, label: impl Into<String>) -> &mut Self {
        self.label = Some(label.into());
        self
    }

    pub fn one_and_only_one(&mut self) -> &mut Self {
        self.minimum = 1;
        self.maximum = 1;
        self
    }

    pub fn zero_or_one(&mut self) -> &mut Self {
        self.minimum = 0;
        self.maximum = 1;
        self
    }

    pub fn zero_or_more(&mut self) -> &mut Self {
        self.minimum = 0;
        self.maximum = usize::MAX;
        self
    }

    pub fn one_or_more(&mut self) -> &mut Self {
        self.minimum = 1;
        self.maximum = usize::MAX;
        self
    }

    pub fn exactly(&mut self, n: usize) -> &mut Self {
        self.minimum = n;
        self.maximum = n;
        self
    }

    pub fn min(&mut self, n: usize) -> &mut Self {
        self.minimum = n;
        self
    }

    pub fn max(&mut self, n: usize) -> &mut Self {
        self.maximum = n;
        self
    }

    /// Number of distinct instances of the declared kind among `entities`.
    #[must_use]
    pub fn count(&self, entities: &[ContextEntity]) -> usize {
        distinct_instances(self.kind, entities)
    }

    /// True iff `minimum <= count <= maximum`.
    #[must_use]
    pub fn validate(&self, entities: &[ContextEntity]) -> bool {
        let count = self.count(entities);
        self.minimum <= count && count <= self.maximum
    }
}

// =============================================================================
// RELATIONSHIP DECLARATION
// =============================================================================

/// "`target` participates in `relationship` with `source` (or any of the
/// or-kinds; and, independently, with all of the and-kinds)."
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipDeclaration {
    relationship: KindId,
    target: KindId,
    source: KindId,
    or_sources: Vec<KindId>,
    and_sources: Vec<KindId>,
    minimum: usize,
    maximum: usize,
    label: Option<String>,
    render_as_grid: bool,
    coalesce: bool,
}

impl RelationshipDeclaration {
    #[must_use]
    pub fn new(relationship: KindId, target: KindId, source: KindId) -> Self {
        Self {
            relationship,
            target,
            source,
            or_sources: Vec::new(),
            and_sources: Vec::new(),
            minimum: 0,
            maximum: usize::MAX,
            label: None,
            render_as_grid: false,
            coalesce: false,
        }
    }

    #[must_use]
    pub fn relationship(&self) -> KindId {
        self.relationship
    }

    #[must_use]
    pub fn target(&self) -> KindId {
        self.target
    }

    /// The primary source kind.
    #[must_use]
    pub fn source(&self) -> KindId {
        self.source
    }

    #[must_use]
    pub fn or_sources(&self) -> &[KindId] {
        &self.or_sources
    }

    #[must_use]
    pub fn and_sources(&self) -> &[KindId] {
        &self.and_sources
    }

    /// Primary, then or-kinds, then and-kinds.
    #[must_use]
    pub fn all_sources(&self) -> Vec<KindId> {
        let mut all = Vec::with_capacity(1 + self.or_sources.len() + self.and_sources.len());
        all.push(self.source);
        all.extend_from_slice(&self.or_sources);
        all.extend_from_slice(&self.and_sources);
        all
    }

    /// True when `kind` is the primary source or one of the or-kinds.
    #[must_use]
    pub fn accepts_source(&self, kind: KindId) -> bool {
        self.source == kind || self.or_sources.contains(&kind)
    }

    #[must_use]
    pub fn minimum(&self) -> usize {
        self.minimum
    }

    #[must_use]
    pub fn maximum(&self) -> usize {
        self.maximum
    }

    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    #[must_use]
    pub fn render_as_grid(&self) -> bool {
        self.render_as_grid
    }

    #[must_use]
    pub fn should_coalesce(&self) -> bool {
        self.coalesce
    }

    pub fn labeled(&mut self, label: impl Into<String>) -> &mut Self {
        self.label = Some(label.into());
        self
    }

    pub fn one_and_only_one(&mut self) -> &mut Self {
        self.minimum = 1;
        self.maximum = 1;
        self
    }

    pub fn zero_or_one(&mut self) -> &mut Self {
        self.minimum = 0;
        self.maximum = 1;
        self
    }

    pub fn zero_or_more(&mut self) -> &mut Self {
        self.minimum = 0;
        self.maximum = usize::MAX;
        self
    }

    pub fn one_or_more(&mut self) -> &mut Self {
        self.minimum = 1;
        self.maximum = usize::MAX;
        self
    }

    pub fn exactly(&mut self, n: usize) -> &mut Self {
        self.minimum = n;
        self.maximum = n;
        self
    }

    pub fn min(&mut self, n: usize) -> &mut Self {
        self.minimum = n;
        self
    }

    pub fn max(&mut self, n: usize) -> &mut Self {
        self.maximum = n;
        self
    }

    /// Accept `kind` as an alternative source.
    pub fn or(&mut self, kind: KindId) -> &mut Self {
        if !self.or_sources.contains(&kind) {
            self.or_sources.push(kind);
        }
        self
    }

    /// Require `kind` as an additional co-source.
    pub fn and(&mut self, kind: KindId) -> &mut Self {
        if !self.and_sources.contains(&kind) {
            self.and_sources.push(kind);
        }
        self
    }

    pub fn as_grid(&mut self) -> &mut Self {
        self.render_as_grid = true;
        self
    }

    pub fn coalesce(&mut self) -> &mut Self {
        self.coalesce = true;
        self
    }
}

// =============================================================================
// ABSTRACTION DECLARATION
// =============================================================================

/// "`sub_kind` is-a `super_kind`."
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbstractionDeclaration {
    sub_kind: KindId,
    super_kind: KindId,
    label: Option<String>,
    coalesce: bool,
}

impl AbstractionDeclaration {
    #[must_use]
    pub fn new(sub_kind: KindId, super_kind: KindId) -> Self {
        Self {
            sub_kind,
            super_kind,
            label: None,
            coalesce: false,
        }
    }

    #[must_use]
    pub fn sub_kind(&self) -> KindId {
        self.sub_kind
    }

    #[must_use]
    pub fn super_kind(&self) -> KindId {
        self.super_kind
    }

    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    #[must_use]
    pub fn should_coalesce(&self) -> bool {
        self.coalesce
    }

    pub fn labeled(&mut self, label: impl Into<String>) -> &mut Self {
        self.label = Some(label.into());
        self
    }

    pub fn coalesce(&mut self) -> &mut Self {
        self.coalesce = true;
        self
    }
}

// =============================================================================
// RELATIONSHIPS
// =============================================================================

/// A cardinality check that failed while adding an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardinalityViolation {
    /// Minimum of the violated declaration.
    pub minimum: usize,
    /// Number of matching entries after the addition.
    pub count: usize,
}

/// The relationship declarations of one context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Relationships {
    declarations: Vec<RelationshipDeclaration>,
}

impl Relationships {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[RelationshipDeclaration] {
        &self.declarations
    }

    /// Add a declaration; the (relationship, target, source) triple must be unique.
    pub fn add(
        &mut self,
        relationship: KindId,
        target: KindId,
        source: KindId,
    ) -> Result<&mut RelationshipDeclaration, MeaningError> {
        if self.exists(relationship, target, source) {
            return Err(MeaningError::RelationshipDeclarationViolation(format!(
                "{} is already declared for {} related to {}",
                relationship, target, source
            )));
        }

        self.declarations
            .push(RelationshipDeclaration::new(relationship, target, source));
        let index = self.declarations.len() - 1;
        Ok(&mut self.declarations[index])
    }

    /// True when the exact (relationship, target, primary source) triple is declared.
    #[must_use]
    pub fn exists(&self, relationship: KindId, target: KindId, source: KindId) -> bool {
        self.declarations.iter().any(|r| {
            r.relationship == relationship && r.target == target && r.source == source
        })
    }

    /// True when a declaration admits `source` as primary, or- or and-source.
    #[must_use]
    pub fn exists_for(&self, relationship: KindId, target: KindId, source: KindId) -> bool {
        self.declarations.iter().any(|r| {
            r.relationship == relationship
                && r.target == target
                && (r.accepts_source(source) || r.and_sources.contains(&source))
        })
    }

    /// Check the cardinality of the declarations applicable to a just-added
    /// `(relationship, target, source)` entry.
    ///
    /// Only declarations accepting `source` as primary or or-kind apply.
    /// The count is the number of entries for the same concrete target
    /// whose related entity is of an accepted kind.
    #[must_use]
    pub fn validate_addition(
        &self,
        relationship: KindId,
        target: &Entity,
        source: KindId,
        entities: &[ContextEntity],
    ) -> Option<CardinalityViolation> {
        self.declarations
            .iter()
            .filter(|r| {
                r.relationship == relationship && r.target == target.kind && r.accepts_source(source)
            })
            .find_map(|r| {
                let count = entities
                    .iter()
                    .filter(|e| {
                        e.relationship == relationship
                            && e.concrete.id == target.id
                            && r.accepts_source(e.related_to.kind)
                    })
                    .count();

                (count < r.minimum || count > r.maximum).then_some(CardinalityViolation {
                    minimum: r.minimum,
                    count,
                })
            })
    }

    /// Re-check an instantiated entry against or- then and-requirements.
    #[must_use]
    pub fn validate(&self, ce: &ContextEntity, entities: &[ContextEntity]) -> bool {
        self.validate_or(ce, entities) && self.validate_and(ce, entities)
    }

    fn validate_or(&self, ce: &ContextEntity, entities: &[ContextEntity]) -> bool {
        self.declarations
            .iter()
            .filter(|r| {
                r.relationship == ce.relationship
                    && r.target == ce.concrete.kind
                    && r.accepts_source(ce.related_to.kind)
            })
            .all(|r| {
                let count = entities
                    .iter()
                    .filter(|e| {
                        e.relationship == ce.relationship
                            && e.concrete.id == ce.concrete.id
                            && r.accepts_source(e.related_to.kind)
                    })
                    .count();
                r.minimum <= count && count <= r.maximum
            })
    }

    fn validate_and(&self, ce: &ContextEntity, entities: &[ContextEntity]) -> bool {
        self.declarations
            .iter()
            .filter(|r| {
                r.relationship == ce.relationship
                    && r.target == ce.concrete.kind
                    && !r.and_sources.is_empty()
            })
            .all(|r| {
                let related: BTreeSet<KindId> = entities
                    .iter()
                    .filter(|e| e.relationship == ce.relationship && e.concrete.id == ce.concrete.id)
                    .map(|e| e.related_to.kind)
                    .collect();

                std::iter::once(&r.source)
                    .chain(r.and_sources.iter())
                    .all(|required| related.contains(required))
            })
    }
}

// =============================================================================
// ABSTRACTIONS
// =============================================================================

/// The abstraction declarations of one context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Abstractions {
    declarations: Vec<AbstractionDeclaration>,
}

impl Abstractions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[AbstractionDeclaration] {
        &self.declarations
    }

    /// Add a declaration; the (sub, super) pair must be unique.
    pub fn add(
        &mut self,
        sub_kind: KindId,
        super_kind: KindId,
    ) -> Result<&mut AbstractionDeclaration, MeaningError> {
        if self.exists(sub_kind, super_kind) {
            return Err(MeaningError::AbstractionViolation(format!(
                "abstraction {} -> {} already exists",
                sub_kind, super_kind
            )));
        }

        self.declarations
            .push(AbstractionDeclaration::new(sub_kind, super_kind));
        let index = self.declarations.len() - 1;
        Ok(&mut self.declarations[index])
    }

    #[must_use]
    pub fn exists(&self, sub_kind: KindId, super_kind: KindId) -> bool {
        self.declarations
            .iter()
            .any(|a| a.sub_kind == sub_kind && a.super_kind == super_kind)
    }

    /// Abstractions whose sub kind is `sub_kind`.
    #[must_use]
    pub fn abstractions_of(&self, sub_kind: KindId) -> Vec<&AbstractionDeclaration> {
        self.declarations
            .iter()
            .filter(|a| a.sub_kind == sub_kind)
            .collect()
    }

    /// Abstractions whose super kind is `super_kind`.
    #[must_use]
    pub fn implementations_of(&self, super_kind: KindId) -> Vec<&AbstractionDeclaration> {
        self.declarations
            .iter()
            .filter(|a| a.super_kind == super_kind)
            .collect()
    }
}

// =============================================================================
// TESTS
// =============================================================================
