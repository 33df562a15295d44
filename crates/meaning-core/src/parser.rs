//! # Schema Traversal
//!
//! Flattens an instantiated root schema into [`Group`]s of [`Field`]s. Every
//! field carries its type-path, the address the value store keys on.
//!
//! ## Traversal
//!
//! For each schema reached (the root, or a schema entered as a relationship
//! source):
//!
//! 1. push a `Root` (or `Relationship`) segment; a schema already on the
//!    path stack is recursive
//! 2. declared members: value kinds become fields, schemas are flattened
//!    into the same group (`HasA`, then `Child` further down)
//! 3. relationships: schema sources get a new group (unless coalesced),
//!    plain entity sources contribute the abstractions declared for them
//! 4. abstractions whose super kind is a schema with members get a new
//!    group (unless coalesced); abstractions already drilled for a schema
//!    kind are not drilled again
//! 5. pop
//!
//! Groups that end up without fields are dropped, except the root group.
//!
//! A parser also hands out instance identifiers for one record: the same
//! kind always maps to the same identifier, so all values created through
//! one parser land in the same record of the store.

use crate::declaration::{AbstractionDeclaration, RelationshipDeclaration};
use crate::primitives::MAX_PATH_DEPTH;
use crate::{
    Context, ContextPath, ContextValue, Field, Group, InstanceId, KindId, KindRegistry, Lookup,
    MeaningError, PathSegment, describe_path,
};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, trace};

/// Per-call state of one schema traversal.
#[derive(Debug)]
pub struct Parser<'r> {
    registry: &'r KindRegistry,
    groups: Vec<Group>,
    fields: Vec<Field>,
    path: Vec<ContextPath>,
    all_entities: BTreeSet<KindId>,
    /// Left side of every relationship and abstraction seen, to its right sides.
    all_relationships: BTreeMap<KindId, Vec<KindId>>,
    visited_abstractions: BTreeMap<KindId, Vec<AbstractionDeclaration>>,
    instance_ids: BTreeMap<KindId, InstanceId>,
    lookups: BTreeMap<KindId, Lookup>,
    parsed: bool,
}

impl<'r> Parser<'r> {
    #[must_use]
    pub fn new(registry: &'r KindRegistry) -> Self {
        Self {
            registry,
            groups: Vec::new(),
            fields: Vec::new(),
            path: Vec::new(),
            all_entities: BTreeSet::new(),
            all_relationships: BTreeMap::new(),
            visited_abstractions: BTreeMap::new(),
            instance_ids: BTreeMap::new(),
            lookups: BTreeMap::new(),
            parsed: false,
        }
    }

    /// Instantiate the schema `kind` and parse it.
    pub fn parse_kind(&mut self, kind: KindId) -> Result<(), MeaningError> {
        let context = self.registry.instantiate(kind)?;
        self.parse(&context)
    }

    /// Parse an instantiated root schema, replacing any earlier result.
    pub fn parse(&mut self, context: &Context) -> Result<(), MeaningError> {
        let kind = schema_kind(context)?;

        self.groups.clear();
        self.fields.clear();
        self.path.clear();
        self.all_entities.clear();
        self.all_relationships.clear();
        self.visited_abstractions.clear();
        self.parsed = false;

        self.map_lookup(kind, context);

        let name = context
            .label()
            .map(str::to_string)
            .unwrap_or_else(|| self.registry.name(kind));
        let root = self.create_group(name, kind, None);
        self.generate_master_groups(root, context, false)?;

        let mut index = 0;
        self.groups.retain(|group| {
            let keep = index == 0 || !group.fields().is_empty();
            index += 1;
            keep
        });

        debug!(
            schema = %self.registry.name(kind),
            groups = self.groups.len(),
            fields = self.fields.len(),
            "schema parsed"
        );
        self.parsed = true;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Traversal
    // -------------------------------------------------------------------------

    fn generate_master_groups(
        &mut self,
        group: usize,
        context: &Context,
        via_relationship: bool,
    ) -> Result<(), MeaningError> {
        let kind = schema_kind(context)?;
        debug!(schema = %self.registry.name(kind), via_relationship, "entering schema");
        self.log_entity(kind);

        let segment = if via_relationship {
            PathSegment::Relationship
        } else {
            PathSegment::Root
        };
        self.push_schema(segment, kind)?;

        self.create_fields(context, group)?;

        for decl in context.root_entities() {
            self.drill_into_abstractions(context, group, &context.abstractions_of(decl.kind()))?;
        }

        self.generate_relational_groups(context, group)?;

        // Self-declared abstractions not reached through a member above.
        for abstraction in context.abstractions() {
            let visited = self
                .visited_abstractions
                .get(&kind)
                .is_some_and(|v| v.contains(abstraction));
            if !visited {
                self.drill_into_abstraction(context, group, abstraction)?;
            }
        }

        self.path.pop();
        Ok(())
    }

    fn generate_relational_groups(
        &mut self,
        context: &Context,
        group: usize,
    ) -> Result<(), MeaningError> {
        for relationship in context.relationships() {
            for source in relationship.all_sources() {
                self.log_relationship(relationship.target(), source);
                self.log_entity(source);

                if self.registry.is_schema(source) {
                    debug!(
                        relationship = %self.registry.name(relationship.relationship()),
                        source = %self.registry.name(source),
                        "drilling into relationship schema"
                    );
                    let related = self.registry.instantiate(source)?;
                    self.map_lookup(source, &related);

                    let target_group = if relationship.should_coalesce() {
                        group
                    } else {
                        let name = relationship
                            .label()
                            .or(related.label())
                            .map(str::to_string)
                            .unwrap_or_else(|| self.registry.name(source));
                        self.create_group(name, source, Some(relationship))
                    };

                    self.generate_master_groups(target_group, &related, true)?;
                } else {
                    // A plain entity has no members of its own, only the
                    // abstractions this context declares for it.
                    debug!(
                        relationship = %self.registry.name(relationship.relationship()),
                        source = %self.registry.name(source),
                        "drilling into relationship entity"
                    );
                    let name = relationship
                        .label()
                        .map(str::to_string)
                        .unwrap_or_else(|| self.registry.name(source));
                    let entity_group = self.create_group(name, source, Some(relationship));
                    self.drill_into_abstractions(
                        context,
                        entity_group,
                        &context.abstractions_of(source),
                    )?;
                }
            }
        }

        Ok(())
    }

    fn create_fields(&mut self, context: &Context, group: usize) -> Result<(), MeaningError> {
        for root in context.root_entities() {
            let kind = root.kind();
            self.log_entity(kind);

            if self.registry.is_schema(kind) {
                debug!(schema = %self.registry.name(kind), "flattening member schema");
                let member = self.registry.instantiate(kind)?;
                self.map_lookup(kind, &member);
                self.push_schema(PathSegment::HasA, kind)?;

                for inner in member.root_entities() {
                    let inner_kind = inner.kind();
                    self.log_entity(inner_kind);

                    if self.registry.is_value(inner_kind) {
                        let label = root
                            .label()
                            .or(inner.label())
                            .map(str::to_string)
                            .unwrap_or_else(|| self.registry.name(inner_kind));
                        self.add_field(group, label, inner_kind)?;
                    } else if self.registry.is_schema(inner_kind) {
                        self.push_schema(PathSegment::Child, inner_kind)?;
                        let child = self.registry.instantiate(inner_kind)?;
                        self.map_lookup(inner_kind, &child);
                        self.create_fields(&child, group)?;
                        self.path.pop();
                    } else {
                        return Err(self.kind_error(inner_kind));
                    }
                }

                self.drill_into_abstractions(&member, group, &member.abstractions_of(kind))?;
                self.path.pop();
            } else if self.registry.is_value(kind) {
                let label = root
                    .label()
                    .map(str::to_string)
                    .unwrap_or_else(|| self.registry.name(kind));
                self.add_field(group, label, kind)?;
            } else {
                return Err(self.kind_error(kind));
            }
        }

        Ok(())
    }

    fn drill_into_abstractions(
        &mut self,
        context: &Context,
        group: usize,
        abstractions: &[&AbstractionDeclaration],
    ) -> Result<(), MeaningError> {
        for abstraction in abstractions {
            self.drill_into_abstraction(context, group, abstraction)?;
        }
        Ok(())
    }

    fn drill_into_abstraction(
        &mut self,
        context: &Context,
        group: usize,
        abstraction: &AbstractionDeclaration,
    ) -> Result<(), MeaningError> {
        let super_kind = abstraction.super_kind();
        self.log_entity(super_kind);
        self.log_relationship(abstraction.sub_kind(), super_kind);
        self.visited_abstractions
            .entry(schema_kind(context)?)
            .or_default()
            .push(abstraction.clone());

        // Plain super kinds carry no fields.
        if !self.registry.is_schema(super_kind) {
            return Ok(());
        }

        debug!(
            sub = %self.registry.name(abstraction.sub_kind()),
            super_kind = %self.registry.name(super_kind),
            "drilling into abstraction"
        );
        let super_context = self.registry.instantiate(super_kind)?;
        self.map_lookup(super_kind, &super_context);

        if super_context.root_entities().is_empty() {
            return Ok(());
        }

        let target_group = if abstraction.should_coalesce() {
            group
        } else {
            let name = abstraction
                .label()
                .map(str::to_string)
                .unwrap_or_else(|| self.registry.name(super_kind));
            self.create_group(name, super_kind, None)
        };

        self.push_schema(PathSegment::Abstraction, super_kind)?;
        self.create_fields(&super_context, target_group)?;
        for root in super_context.root_entities() {
            self.drill_into_abstractions(
                &super_context,
                target_group,
                &super_context.abstractions_of(root.kind()),
            )?;
        }
        self.path.pop();

        Ok(())
    }

    // -------------------------------------------------------------------------
    // Bookkeeping
    // -------------------------------------------------------------------------

    /// Entering a schema (root or relationship source) fails when the kind is
    /// anywhere on the path. Members and abstractions only fail when the kind
    /// repeats within the schema entered last.
    fn push_schema(&mut self, segment: PathSegment, kind: KindId) -> Result<(), MeaningError> {
        let scope = match segment {
            PathSegment::Root | PathSegment::Relationship => 0,
            _ => self
                .path
                .iter()
                .rposition(|p| matches!(p.segment, PathSegment::Root | PathSegment::Relationship))
                .unwrap_or(0),
        };

        let repeated = self.path.iter().skip(scope).any(|p| p.kind == kind);
        if repeated || self.path.len() >= MAX_PATH_DEPTH {
            return Err(MeaningError::RecursiveSchema(self.registry.name(kind)));
        }
        self.path.push(ContextPath::new(segment, kind));
        Ok(())
    }

    fn add_field(&mut self, group: usize, label: String, kind: KindId) -> Result<(), MeaningError> {
        if self.path.len() >= MAX_PATH_DEPTH {
            return Err(MeaningError::RecursiveSchema(self.registry.name(kind)));
        }

        let mut path = self.path.clone();
        path.push(ContextPath::new(PathSegment::Field, kind));
        trace!(label = %label, path = %describe_path(self.registry, &path), "field");

        let field = Field::new(label, path);
        self.fields.push(field.clone());
        if let Some(group) = self.groups.get_mut(group) {
            group.add_field(field);
        }
        Ok(())
    }

    fn create_group(
        &mut self,
        name: String,
        kind: KindId,
        relationship: Option<&RelationshipDeclaration>,
    ) -> usize {
        debug!(group = %name, kind = %self.registry.name(kind), "creating group");
        self.groups.push(Group::new(
            name,
            kind,
            self.path.clone(),
            relationship.cloned(),
        ));
        self.groups.len() - 1
    }

    fn kind_error(&self, kind: KindId) -> MeaningError {
        MeaningError::EntityDeclarationKindError(self.registry.name(kind))
    }

    fn map_lookup(&mut self, kind: KindId, context: &Context) {
        if let Some(lookup) = context.lookup() {
            self.lookups.insert(kind, lookup.clone());
        }
    }

    fn log_entity(&mut self, kind: KindId) {
        self.all_entities.insert(kind);
        self.all_relationships.entry(kind).or_default();
    }

    fn log_relationship(&mut self, left: KindId, right: KindId) {
        self.all_relationships.entry(left).or_default().push(right);
    }

    // -------------------------------------------------------------------------
    // Results
    // -------------------------------------------------------------------------

    #[must_use]
    pub fn is_parsed(&self) -> bool {
        self.parsed
    }

    #[must_use]
    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    /// Every field in visitation order.
    #[must_use]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Relationship targets and abstraction sub kinds never seen as an entity.
    #[must_use]
    pub fn missing_declarations(&self) -> Vec<KindId> {
        self.all_relationships
            .keys()
            .filter(|kind| !self.all_entities.contains(kind))
            .copied()
            .collect()
    }

    /// False when declarations are missing, or nothing has been parsed yet.
    #[must_use]
    pub fn are_declarations_valid(&self) -> bool {
        self.parsed && self.missing_declarations().is_empty()
    }

    #[must_use]
    pub fn has_lookup(&self, kind: KindId) -> bool {
        self.lookups.contains_key(&kind)
    }

    #[must_use]
    pub fn lookup(&self, kind: KindId) -> Option<&Lookup> {
        self.lookups.get(&kind)
    }

    /// The field whose type-path kinds are exactly `kinds`.
    pub fn find_field(&self, kinds: &[KindId]) -> Result<&Field, MeaningError> {
        let matching: Vec<&Field> = self
            .fields
            .iter()
            .filter(|f| f.path().iter().map(|p| p.kind).eq(kinds.iter().copied()))
            .collect();

        match matching.as_slice() {
            [field] => Ok(*field),
            _ => Err(MeaningError::AmbiguousOrMissingField {
                path: kinds
                    .iter()
                    .map(|k| self.registry.name(*k))
                    .collect::<Vec<_>>()
                    .join("."),
                found: matching.len(),
            }),
        }
    }

    // -------------------------------------------------------------------------
    // Values
    // -------------------------------------------------------------------------

    /// Bind a literal to the field addressed by `kinds` in this parser's record.
    pub fn create_value(
        &mut self,
        literal: impl Into<String>,
        record_number: usize,
        kinds: &[KindId],
    ) -> Result<ContextValue, MeaningError> {
        if let Some(&last) = kinds.last() {
            if !self.registry.is_value(last) {
                return Err(MeaningError::EntityDeclarationKindError(
                    self.registry.name(last),
                ));
            }
        }

        let field = self.find_field(kinds)?.clone();
        let instance_path = self.create_instance_path(kinds);
        field.create_value(literal, instance_path, record_number)
    }

    /// Stable identifiers for every kind but the last, a fresh one for the last.
    pub fn create_instance_path(&mut self, kinds: &[KindId]) -> Vec<InstanceId> {
        let mut path = Vec::with_capacity(kinds.len());
        if let Some((_, parents)) = kinds.split_last() {
            for kind in parents {
                path.push(*self.instance_ids.entry(*kind).or_insert_with(InstanceId::new));
            }
            path.push(InstanceId::new());
        }
        path
    }

    /// Forget the record identifiers so later values start a new record.
    pub fn new_record(&mut self) {
        self.instance_ids.clear();
    }
}

fn schema_kind(context: &Context) -> Result<KindId, MeaningError> {
    context
        .kind()
        .ok_or_else(|| MeaningError::UnknownKind("context is not bound to a schema kind".to_string()))
}

// =============================================================================
// TESTS
// =============================================================================
