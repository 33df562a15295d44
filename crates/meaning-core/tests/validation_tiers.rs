//! # Validation Tier Tests (T0-T4)
//!
//! If ANY tier fails, the system is INVALID.
//!
//! ## Tiers
//! - T0: Declaration Integrity
//! - T1: Schema Flattening
//! - T2: Value Storage
//! - T3: Structural Search
//! - T4: Persistence

use meaning_core::{
    Context, ContextValue, ContextValueDictionary, Entity, InstanceId, KindId, KindRegistry,
    MeaningError, Parser,
};

// =============================================================================
// SHARED SCHEMAS
// =============================================================================

/// Person-name schemas shared by every tier.
struct Schemas {
    registry: KindRegistry,
    first_name: KindId,
    last_name: KindId,
    employee_id: KindId,
    person_name: KindId,
    person: KindId,
    employee_name: KindId,
    address_book_name: KindId,
    parent: KindId,
    employee: KindId,
}

fn schemas() -> Schemas {
    let mut registry = KindRegistry::new();
    let first_name = registry.value("FirstName").expect("register");
    let last_name = registry.value("LastName").expect("register");
    let employee_id = registry.value("EmployeeId").expect("register");

    let person_name = registry
        .schema_with("PersonNameContext", move |ctx| {
            ctx.declare(first_name)?.one_and_only_one();
            ctx.declare(last_name)?.one_and_only_one();
            ctx.lookup_renderer_value(last_name)
                .text(", ")
                .value(first_name);
            Ok(())
        })
        .expect("define");

    let single_name = move |ctx: &mut Context| -> Result<(), MeaningError> {
        ctx.declare(person_name)?.one_and_only_one();
        Ok(())
    };
    let person = registry
        .schema_with("PersonContext", single_name)
        .expect("define");
    let employee_name = registry
        .schema_with("EmployeeName", single_name)
        .expect("define");
    let address_book_name = registry
        .schema_with("AddressBookName", single_name)
        .expect("define");

    let child = registry
        .schema_with("ChildContext", move |ctx| {
            ctx.declare(person)?.one_and_only_one();
            Ok(())
        })
        .expect("define");
    let parent = registry
        .schema_with("ParentContext", move |ctx| {
            ctx.declare(person)?.one_and_only_one();
            ctx.declare(child)?.zero_or_more();
            Ok(())
        })
        .expect("define");

    let employee = registry.schema("EmployeeContext").expect("register");
    registry
        .define_schema(employee, move |ctx| {
            ctx.declare(employee_id)?.one_and_only_one();
            ctx.add_abstraction(employee, person)?
                .labeled("Employee Name")
                .coalesce();
            Ok(())
        })
        .expect("define");

    Schemas {
        registry,
        first_name,
        last_name,
        employee_id,
        person_name,
        person,
        employee_name,
        address_book_name,
        parent,
        employee,
    }
}

fn parsed(registry: &KindRegistry, kind: KindId) -> Parser<'_> {
    let mut parser = Parser::new(registry);
    parser.parse_kind(kind).expect("parse");
    parser
}

// =============================================================================
// TIER T0: DECLARATION INTEGRITY
// =============================================================================

mod t0_declaration_integrity {
    use super::*;

    fn kinds() -> (KindRegistry, KindId, KindId, KindId) {
        let mut registry = KindRegistry::new();
        let k = registry.entity("K").expect("register");
        let other = registry.entity("Other").expect("register");
        let rel = registry.relationship("Rel").expect("register");
        (registry, k, other, rel)
    }

    /// T0.1: Exceeding a declared maximum rolls the addition back.
    #[test]
    fn add_beyond_exactly_rolls_back() {
        let (_, k, _, _) = kinds();
        let mut ctx = Context::new();
        ctx.declare(k).expect("declare").exactly(2);

        ctx.add(Entity::new(k)).expect("first");
        ctx.add(Entity::new(k)).expect("second");
        let result = ctx.add(Entity::new(k));

        assert!(matches!(result, Err(MeaningError::DeclarationViolation(_))));
        assert_eq!(ctx.get_kind(k).len(), 2);
        assert!(ctx.is_valid());
    }

    /// T0.2: An addition below the minimum is kept without error.
    #[test]
    fn add_below_minimum_is_retained() {
        let (_, k, _, _) = kinds();
        let mut ctx = Context::new();
        ctx.declare(k).expect("declare").exactly(2);

        ctx.add(Entity::new(k)).expect("below minimum");
        assert_eq!(ctx.get_kind(k).len(), 1);
        assert!(!ctx.is_valid());
    }

    /// T0.3: Duplicate declarations fail at declare time, each with its own error.
    #[test]
    fn duplicate_declarations_rejected() {
        let (_, k, other, rel) = kinds();
        let mut ctx = Context::new();

        ctx.declare(k).expect("declare");
        assert!(matches!(
            ctx.declare(k),
            Err(MeaningError::DeclarationViolation(_))
        ));

        ctx.declare_relationship(rel, k, other).expect("declare");
        assert!(matches!(
            ctx.declare_relationship(rel, k, other),
            Err(MeaningError::RelationshipDeclarationViolation(_))
        ));

        ctx.add_abstraction(k, other).expect("declare");
        assert!(matches!(
            ctx.add_abstraction(k, other),
            Err(MeaningError::AbstractionViolation(_))
        ));
    }

    /// T0.4: A relationship that is not declared cannot be added.
    #[test]
    fn undeclared_relationship_rejected() {
        let (mut registry, k, other, rel) = kinds();
        let unrelated = registry.entity("Unrelated").expect("register");
        let mut ctx = Context::new();
        ctx.declare_relationship(rel, k, other).expect("declare");

        let result = ctx.add_related(rel, Entity::new(unrelated), Entity::new(other));
        assert!(matches!(
            result,
            Err(MeaningError::RelationshipDeclarationViolation(_))
        ));
        assert!(ctx.entities().is_empty());
    }

    /// T0.5: A schema instantiated twice yields equal declarations.
    #[test]
    fn instantiation_is_repeatable() {
        let s = schemas();
        let a = s.registry.instantiate(s.person_name).expect("instantiate");
        let b = s.registry.instantiate(s.person_name).expect("instantiate");
        assert_eq!(a.root_entities(), b.root_entities());
        assert!(a.has_lookup());
    }
}

// =============================================================================
// TIER T1: SCHEMA FLATTENING
// =============================================================================

mod t1_schema_flattening {
    use super::*;
    use meaning_core::PathSegment;

    /// T1.1: Nested schemas flatten into one group with full type-paths.
    #[test]
    fn nested_schema_fields_share_a_group() {
        let s = schemas();
        let parser = parsed(&s.registry, s.employee_name);

        assert_eq!(parser.groups().len(), 1);
        let fields = parser.groups()[0].fields();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].path().len(), 3);
        assert_eq!(
            fields[0].kinds(),
            vec![s.employee_name, s.person_name, s.first_name]
        );
        assert_eq!(fields[0].path()[1].segment, PathSegment::HasA);
    }

    /// T1.2: Repeated sub-schemas produce distinct, deeper paths.
    #[test]
    fn sub_contexts_flatten_in_order() {
        let s = schemas();
        let parser = parsed(&s.registry, s.parent);

        assert_eq!(parser.groups().len(), 1);
        let fields = parser.groups()[0].fields();
        assert_eq!(fields.len(), 4);
        assert_eq!(fields[0].path().len(), 4);
        assert_eq!(fields[2].path().len(), 5);
        assert_eq!(fields[2].path()[2].segment, PathSegment::Child);
    }

    /// T1.3: A coalesced abstraction merges into the schema's own group.
    #[test]
    fn coalesced_abstraction_merges() {
        let s = schemas();
        let parser = parsed(&s.registry, s.employee);

        assert_eq!(parser.groups().len(), 1);
        let fields = parser.groups()[0].fields();
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[0].kinds(), vec![s.employee, s.employee_id]);
        assert_eq!(
            fields[1].kinds(),
            vec![s.employee, s.person, s.person_name, s.first_name]
        );
        assert_eq!(fields[1].path()[1].segment, PathSegment::Abstraction);
        assert!(parser.are_declarations_valid());
    }

    /// T1.4: Relationship-qualified abstractions form their own group;
    /// the plain entity's empty group is dropped.
    #[test]
    fn employee_contract_groups() {
        let mut s = schemas();
        let spouse = s.registry.entity("Spouse").expect("register");
        let insured = s.registry.relationship("InsuredSpouse").expect("register");
        let employee = s.employee;
        let person = s.person;
        let contract = s
            .registry
            .schema_with("EmployeeContractContext", move |ctx| {
                ctx.set_label("Employee Contract");
                ctx.declare(employee)?.labeled("Employee").one_and_only_one();
                ctx.declare_relationship(insured, employee, spouse)?
                    .labeled("Spouse")
                    .zero_or_one();
                ctx.add_abstraction(spouse, person)?.labeled("Spouse Name");
                Ok(())
            })
            .expect("define");

        let parser = parsed(&s.registry, contract);
        let groups = parser.groups();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].name(), "Employee Contract");
        assert_eq!(groups[0].fields().len(), 3);
        assert_eq!(groups[1].name(), "Spouse Name");
        assert_eq!(groups[1].fields().len(), 2);
        assert!(parser.are_declarations_valid());
    }

    /// T1.5: Direct self reference is recursive.
    #[test]
    fn self_relationship_is_recursive() {
        let mut registry = KindRegistry::new();
        let rel = registry.relationship("RecursiveRelationship").expect("register");
        let recursive = registry.schema("RecursiveContext").expect("register");
        registry
            .define_schema(recursive, move |ctx| {
                ctx.declare_relationship(rel, recursive, recursive)?;
                Ok(())
            })
            .expect("define");

        let mut parser = Parser::new(&registry);
        assert!(matches!(
            parser.parse_kind(recursive),
            Err(MeaningError::RecursiveSchema(_))
        ));
    }

    /// T1.6: The same schema on separate branches is not recursion.
    #[test]
    fn same_schema_on_separate_branches() {
        let mut s = schemas();
        let knows = s.registry.relationship("Knows").expect("register");
        let person = s.person;
        let household = s.registry.schema("Household").expect("register");
        s.registry
            .define_schema(household, move |ctx| {
                ctx.declare(person)?.one_and_only_one();
                ctx.declare_relationship(knows, household, person)?
                    .labeled("Acquaintance");
                Ok(())
            })
            .expect("define");

        let parser = parsed(&s.registry, household);
        let groups = parser.groups();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[1].name(), "Acquaintance");
        assert_eq!(groups[1].fields().len(), 2);
        assert_eq!(groups[1].fields()[0].path()[1].segment, PathSegment::Relationship);
    }

    /// T1.7: Lookups of nested schemas are collected.
    #[test]
    fn nested_lookups_collected() {
        let s = schemas();
        let parser = parsed(&s.registry, s.employee_name);
        assert!(parser.has_lookup(s.person_name));
        assert!(!parser.has_lookup(s.employee_name));
    }

    /// T1.8: A schema reached again as a member of a relationship source
    /// is not recursion.
    #[test]
    fn schema_member_of_its_relationship_source() {
        let mut registry = KindRegistry::new();
        let first_name = registry.value("FirstName").expect("register");
        let rel = registry.relationship("Mentors").expect("register");
        let outer = registry.schema("Outer").expect("register");
        let inner = registry
            .schema_with("Inner", move |ctx| {
                ctx.declare(outer)?;
                Ok(())
            })
            .expect("define");
        registry
            .define_schema(outer, move |ctx| {
                ctx.declare(first_name)?;
                ctx.declare_relationship(rel, outer, inner)?;
                Ok(())
            })
            .expect("define");

        let mut parser = Parser::new(&registry);
        parser.parse_kind(outer).expect("parse");

        let groups = parser.groups();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[1].name(), "Inner");
        let field = &groups[1].fields()[0];
        assert_eq!(field.kinds(), vec![outer, inner, outer, first_name]);
        assert_eq!(field.path()[1].segment, PathSegment::Relationship);
        assert_eq!(field.path()[2].segment, PathSegment::HasA);
    }

    /// T1.9: A member schema holding its parent is still recursive.
    #[test]
    fn member_cycle_is_recursive() {
        let mut registry = KindRegistry::new();
        let first_name = registry.value("FirstName").expect("register");
        let holder = registry.schema("Holder").expect("register");
        let held = registry
            .schema_with("Held", move |ctx| {
                ctx.declare(first_name)?;
                ctx.declare(holder)?;
                Ok(())
            })
            .expect("define");
        registry
            .define_schema(holder, move |ctx| {
                ctx.declare(held)?;
                Ok(())
            })
            .expect("define");

        let mut parser = Parser::new(&registry);
        assert!(matches!(
            parser.parse_kind(holder),
            Err(MeaningError::RecursiveSchema(_))
        ));
    }

    // -------------------------------------------------------------------------
    // Abstractions and relationships on small schemas
    // -------------------------------------------------------------------------

    struct Small {
        registry: KindRegistry,
        field_a: KindId,
        field_b: KindId,
        context_a: KindId,
        context_b: KindId,
        abstract_context: KindId,
        person_name: KindId,
        person: KindId,
    }

    fn small() -> Small {
        let mut registry = KindRegistry::new();
        let field_a = registry.value("FieldA").expect("register");
        let field_b = registry.value("FieldB").expect("register");
        let first_name = registry.value("FirstName").expect("register");
        let last_name = registry.value("LastName").expect("register");

        let context_a = registry
            .schema_with("ContextA", move |ctx| {
                ctx.declare(field_a)?;
                Ok(())
            })
            .expect("define");
        let context_b = registry
            .schema_with("ContextB", move |ctx| {
                ctx.declare(field_b)?;
                Ok(())
            })
            .expect("define");
        let abstract_context = registry
            .schema_with("AbstractContext", move |ctx| {
                ctx.declare(field_b)?;
                Ok(())
            })
            .expect("define");
        let person_name = registry
            .schema_with("PersonNameContext", move |ctx| {
                ctx.declare(first_name)?.one_and_only_one();
                ctx.declare(last_name)?.one_and_only_one();
                Ok(())
            })
            .expect("define");
        let person = registry
            .schema_with("PersonContext", move |ctx| {
                ctx.declare(person_name)?.one_and_only_one();
                Ok(())
            })
            .expect("define");

        Small {
            registry,
            field_a,
            field_b,
            context_a,
            context_b,
            abstract_context,
            person_name,
            person,
        }
    }

    /// T1.10: An uncoalesced abstraction of the schema itself gets its own group.
    #[test]
    fn self_abstraction_gets_a_group() {
        let mut s = small();
        let (field_a, abstract_context) = (s.field_a, s.abstract_context);
        let schema = s.registry.schema("ContextWithAbstraction").expect("register");
        s.registry
            .define_schema(schema, move |ctx| {
                ctx.declare(field_a)?;
                ctx.add_abstraction(schema, abstract_context)?;
                Ok(())
            })
            .expect("define");

        let parser = parsed(&s.registry, schema);
        assert!(parser.are_declarations_valid());
        let groups = parser.groups();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].name(), "ContextWithAbstraction");
        assert_eq!(groups[0].fields().len(), 1);
        assert_eq!(groups[0].fields()[0].path().len(), 2);
        assert_eq!(groups[1].name(), "AbstractContext");
        assert_eq!(groups[1].fields().len(), 1);

        let field = &groups[1].fields()[0];
        assert_eq!(field.path().len(), 3);
        assert_eq!(field.path()[1].segment, PathSegment::Abstraction);
        assert_eq!(field.kinds(), vec![schema, abstract_context, s.field_b]);
    }

    /// T1.11: A schema made only of abstractions keeps its empty first group.
    #[test]
    fn multiple_abstractions_keep_the_empty_root_group() {
        let mut s = small();
        let (context_a, context_b) = (s.context_a, s.context_b);
        let schema = s.registry.schema("MultipleAbstractions").expect("register");
        s.registry
            .define_schema(schema, move |ctx| {
                ctx.add_abstraction(schema, context_a)?;
                ctx.add_abstraction(schema, context_b)?;
                Ok(())
            })
            .expect("define");

        let parser = parsed(&s.registry, schema);
        let groups = parser.groups();
        assert_eq!(groups.len(), 3);
        assert!(groups[0].fields().is_empty());
        assert_eq!(groups[1].fields().len(), 1);
        assert_eq!(groups[2].fields().len(), 1);

        let a = &groups[1].fields()[0];
        assert_eq!(a.label(), "FieldA");
        assert_eq!(a.path()[1].kind, s.context_a);
        let b = &groups[2].fields()[0];
        assert_eq!(b.label(), "FieldB");
        assert_eq!(b.path()[1].kind, s.context_b);
    }

    /// T1.12: A member schema's own abstraction is drilled from the member.
    #[test]
    fn member_with_self_abstraction() {
        let mut s = small();
        let (field_a, person) = (s.field_a, s.person);
        let sub = s.registry.schema("SubContext").expect("register");
        s.registry
            .define_schema(sub, move |ctx| {
                ctx.declare(field_a)?.one_and_only_one();
                ctx.add_abstraction(sub, person)?.labeled("Name");
                Ok(())
            })
            .expect("define");
        let schema = s
            .registry
            .schema_with("SuperContext", move |ctx| {
                ctx.declare(sub)?.labeled("SubContext").one_and_only_one();
                Ok(())
            })
            .expect("define");

        let parser = parsed(&s.registry, schema);
        assert!(parser.are_declarations_valid());
        let groups = parser.groups();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].fields().len(), 1);
        assert_eq!(groups[1].name(), "Name");
        assert_eq!(groups[1].fields().len(), 2);
        assert_eq!(
            groups[1].fields()[0].path()[2].segment,
            PathSegment::Abstraction
        );
        assert_eq!(groups[1].fields()[0].path()[3].kind, s.person_name);
    }

    /// T1.13: A coalesced abstraction and a relationship to the same super schema.
    #[test]
    fn abstraction_and_relationship_to_one_schema() {
        let mut s = small();
        let (field_a, person) = (s.field_a, s.person);
        let contact = s
            .registry
            .relationship("EmergencyContactRelationship")
            .expect("register");
        let schema = s
            .registry
            .schema("AbstractionAndRelationshipContext")
            .expect("register");
        s.registry
            .define_schema(schema, move |ctx| {
                ctx.declare(field_a)?;
                ctx.add_abstraction(schema, person)?
                    .labeled("Name")
                    .coalesce();
                ctx.declare_relationship(contact, schema, person)?
                    .labeled("Emergency Contact");
                Ok(())
            })
            .expect("define");

        let parser = parsed(&s.registry, schema);
        assert!(parser.are_declarations_valid());
        let groups = parser.groups();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].fields().len(), 3);
        assert_eq!(groups[1].name(), "Emergency Contact");
        assert_eq!(groups[1].fields().len(), 2);
    }

    /// T1.14: A relationship target that is never declared is reported.
    #[test]
    fn disassociated_relationship_is_invalid() {
        let mut s = small();
        let (field_a, field_b, context_b) = (s.field_a, s.field_b, s.context_b);
        let ab = s.registry.relationship("ABRelationship").expect("register");
        let schema = s
            .registry
            .schema_with("DisassociatedRelationship", move |ctx| {
                ctx.declare(field_b)?;
                ctx.declare_relationship(ab, field_a, context_b)?;
                Ok(())
            })
            .expect("define");

        let parser = parsed(&s.registry, schema);
        assert!(!parser.are_declarations_valid());
        assert_eq!(parser.missing_declarations(), vec![s.field_a]);
    }

    /// T1.15: An abstraction of an undeclared kind is reported.
    #[test]
    fn disassociated_abstraction_is_invalid() {
        let mut s = small();
        let (field_a, field_b, context_b) = (s.field_a, s.field_b, s.context_b);
        let schema = s
            .registry
            .schema_with("DisassociatedAbstraction", move |ctx| {
                ctx.declare(field_b)?;
                ctx.add_abstraction(field_a, context_b)?;
                Ok(())
            })
            .expect("define");

        let parser = parsed(&s.registry, schema);
        assert!(!parser.are_declarations_valid());
        assert_eq!(parser.missing_declarations(), vec![s.field_a]);
    }
}

// =============================================================================
// TIER T2: VALUE STORAGE
// =============================================================================

mod t2_value_storage {
    use super::*;

    /// T2.1: A stored value is found again through its field.
    #[test]
    fn stored_value_round_trips_through_field() {
        let s = schemas();
        let store = ContextValueDictionary::new();
        let mut parser = parsed(&s.registry, s.employee_name);
        let kinds = [s.employee_name, s.person_name, s.first_name];

        let cv = parser.create_value("Marc", 0, &kinds).expect("value");
        store.add_or_update(cv.clone()).expect("add");

        let field = parser.find_field(&kinds).expect("field");
        let (node, path) = store
            .try_get_context_node(field, cv.instance_path()[0], 0)
            .expect("lookup")
            .expect("found");
        assert_eq!(node.value.expect("value").value(), "Marc");
        assert_eq!(path, cv.instance_path());

        // Not found is a normal outcome.
        assert!(
            store
                .try_get_context_node(field, cv.instance_path()[0], 1)
                .expect("lookup")
                .is_none()
        );
        assert!(
            store
                .try_get_context_node(field, InstanceId::new(), 0)
                .expect("lookup")
                .is_none()
        );
    }

    /// T2.2: Two values for one slot fail.
    #[test]
    fn duplicate_value_slot_fails() {
        let s = schemas();
        let store = ContextValueDictionary::new();
        let mut parser = parsed(&s.registry, s.parent);
        let kinds = [s.parent, s.person, s.person_name, s.first_name];

        let john = parser.create_value("John", 0, &kinds).expect("value");
        store.add_or_update(john).expect("add");
        let jane = parser.create_value("Jane", 0, &kinds).expect("value");
        assert!(matches!(
            store.add_or_update(jane),
            Err(MeaningError::DuplicateValueSlot(_))
        ));
    }

    /// T2.3: A record referencing stored sub-structure does not copy it.
    #[test]
    fn shared_sub_structure_not_duplicated() {
        let s = schemas();
        let store = ContextValueDictionary::new();
        let (name, first, last) = (InstanceId::new(), InstanceId::new(), InstanceId::new());

        for root_kind in [s.employee_name, s.address_book_name] {
            let root = InstanceId::new();
            for (leaf, kind, literal) in [(first, s.first_name, "Marc"), (last, s.last_name, "Clifton")] {
                let cv = ContextValue::new(
                    literal,
                    vec![root, name, leaf],
                    vec![root_kind, s.person_name, kind],
                    0,
                )
                .expect("value");
                store.add_or_update(cv).expect("add");
            }
        }

        assert_eq!(store.get_context_nodes(s.person_name).expect("nodes").len(), 1);
        assert_eq!(store.get_context_nodes(s.first_name).expect("nodes").len(), 1);
        assert_eq!(store.roots().expect("roots").len(), 2);
        // Two roots, one name, two leaves.
        assert_eq!(store.node_count().expect("count"), 5);
    }

    /// T2.4: Stored values render through the schema's lookup.
    #[test]
    fn lookup_renders_stored_record() {
        let s = schemas();
        let store = ContextValueDictionary::new();
        let mut parser = parsed(&s.registry, s.employee_name);

        for (kind, literal) in [(s.first_name, "Marc"), (s.last_name, "Clifton")] {
            let cv = parser
                .create_value(literal, 0, &[s.employee_name, s.person_name, kind])
                .expect("value");
            store.add_or_update(cv).expect("add");
        }

        let name_node = &store.get_context_nodes(s.person_name).expect("nodes")[0];
        let values = store.get_context_values(name_node.id).expect("values");
        let lookup = parser.lookup(s.person_name).expect("lookup");
        assert_eq!(lookup.render(&values, 0), "Clifton, Marc");
    }
}

// =============================================================================
// TIER T3: STRUCTURAL SEARCH
// =============================================================================

mod t3_structural_search {
    use super::*;

    fn name_query(s: &Schemas, first: Option<&str>, last: Option<&str>) -> Vec<ContextValue> {
        let mut parser = parsed(&s.registry, s.person_name);
        let mut query = Vec::new();
        if let Some(first) = first {
            query.push(
                parser
                    .create_value(first, 0, &[s.person_name, s.first_name])
                    .expect("value"),
            );
        }
        if let Some(last) = last {
            query.push(
                parser
                    .create_value(last, 0, &[s.person_name, s.last_name])
                    .expect("value"),
            );
        }
        query
    }

    fn store_name(
        s: &Schemas,
        store: &ContextValueDictionary,
        root: KindId,
        first: &str,
        last: &str,
    ) -> (ContextValue, ContextValue) {
        let mut parser = parsed(&s.registry, root);
        let fn_cv = parser
            .create_value(first, 0, &[root, s.person_name, s.first_name])
            .expect("value");
        let ln_cv = parser
            .create_value(last, 0, &[root, s.person_name, s.last_name])
            .expect("value");
        store.add_or_update(fn_cv.clone()).expect("add");
        store.add_or_update(ln_cv.clone()).expect("add");
        (fn_cv, ln_cv)
    }

    /// T3.1: Matching name records are found under every owning schema.
    #[test]
    fn two_contexts_share_values() {
        let s = schemas();
        let store = ContextValueDictionary::new();
        let (fn0, ln0) = store_name(&s, &store, s.employee_name, "Marc", "Clifton");
        let (fn1, ln1) = store_name(&s, &store, s.address_book_name, "Marc", "Clifton");
        store_name(&s, &store, s.employee_name, "Ian", "Clifton");

        let matches = store
            .search(&name_query(&s, Some("Marc"), Some("Clifton")))
            .expect("search");
        assert_eq!(matches.len(), 2);

        let owner_kinds: Vec<KindId> = matches
            .iter()
            .map(|m| store.node(m.owner.expect("owner")).expect("node").kind)
            .collect();
        assert_eq!(owner_kinds, vec![s.employee_name, s.address_book_name]);

        let children0 = store.children(matches[0].id).expect("children");
        assert_eq!(children0[0].instance, fn0.instance_id());
        assert_eq!(children0[1].instance, ln0.instance_id());
        let children1 = store.children(matches[1].id).expect("children");
        assert_eq!(children1[0].instance, fn1.instance_id());
        assert_eq!(children1[1].instance, ln1.instance_id());
    }

    /// T3.2: A match deep in one branch of a record is found.
    #[test]
    fn multi_branch_record_search() {
        let s = schemas();
        let store = ContextValueDictionary::new();
        let mut parser = parsed(&s.registry, s.employee);
        for (literal, kinds) in [
            ("0001", vec![s.employee, s.employee_id]),
            ("Marc", vec![s.employee, s.person, s.person_name, s.first_name]),
            ("Clifton", vec![s.employee, s.person, s.person_name, s.last_name]),
        ] {
            let cv = parser.create_value(literal, 0, &kinds).expect("value");
            store.add_or_update(cv).expect("add");
        }

        let matches = store
            .search(&name_query(&s, Some("Marc"), None))
            .expect("search");
        assert_eq!(matches.len(), 1);

        let path = store.get_path(matches[0].id).expect("path");
        assert_eq!(path.kind, s.employee);
        assert_eq!(path.path.len(), 3);
    }

    /// T3.3: Every record row is considered.
    #[test]
    fn multi_row_search() {
        let s = schemas();
        let store = ContextValueDictionary::new();
        let mut parser = parsed(&s.registry, s.parent);
        let child = s.registry.require("ChildContext").expect("kind");
        let parent_kinds = |leaf| vec![s.parent, s.person, s.person_name, leaf];
        let child_kinds = |leaf| vec![s.parent, child, s.person, s.person_name, leaf];

        for (literal, kinds, record) in [
            ("John", parent_kinds(s.first_name), 0),
            ("Doe", parent_kinds(s.last_name), 0),
            ("Jane", child_kinds(s.first_name), 0),
            ("Doe", child_kinds(s.last_name), 0),
            ("Joey", child_kinds(s.first_name), 1),
            ("Doe", child_kinds(s.last_name), 1),
        ] {
            let cv = parser.create_value(literal, record, &kinds).expect("value");
            store.add_or_update(cv).expect("add");
        }

        let does = store
            .search(&name_query(&s, None, Some("Doe")))
            .expect("search");
        assert_eq!(does.len(), 2);

        let joey = store
            .search(&name_query(&s, Some("Joey"), Some("Doe")))
            .expect("search");
        assert_eq!(joey.len(), 1);
        assert_eq!(store.get_path(joey[0].id).expect("path").path.len(), 4);
    }

    /// T3.4: A match propagates to every record referencing it.
    #[test]
    fn match_propagates_through_shared_structure() {
        let s = schemas();
        let store = ContextValueDictionary::new();
        let (employee, book, name, first, last) = (
            InstanceId::new(),
            InstanceId::new(),
            InstanceId::new(),
            InstanceId::new(),
            InstanceId::new(),
        );

        for (root, root_kind) in [(employee, s.employee_name), (book, s.address_book_name)] {
            for (leaf, kind, literal) in [(first, s.first_name, "Marc"), (last, s.last_name, "Clifton")] {
                let cv = ContextValue::new(
                    literal,
                    vec![root, name, leaf],
                    vec![root_kind, s.person_name, kind],
                    0,
                )
                .expect("value");
                store.add_or_update(cv).expect("add");
            }
        }

        let matches = store
            .search(&name_query(&s, Some("Marc"), Some("Clifton")))
            .expect("search");
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].kind, s.person_name);
        assert_eq!(matches[1].instance, book);

        let record_kinds: Vec<KindId> = matches
            .iter()
            .map(|m| store.get_path(m.id).expect("path").kind)
            .collect();
        assert_eq!(record_kinds, vec![s.employee_name, s.address_book_name]);
    }

    /// T3.5: Queries mixing parent kinds are rejected.
    #[test]
    fn mixed_parent_query_rejected() {
        let s = schemas();
        let store = ContextValueDictionary::new();
        let mut parser = parsed(&s.registry, s.employee);
        let id = parser
            .create_value("0001", 0, &[s.employee, s.employee_id])
            .expect("value");
        let mut query = name_query(&s, Some("Marc"), None);
        query.push(id);

        assert!(matches!(
            store.search(&query),
            Err(MeaningError::InvalidQuery(_))
        ));
    }
}

// =============================================================================
// TIER T4: PERSISTENCE
// =============================================================================

mod t4_persistence {
    use super::*;
    use meaning_core::{store_from_bytes, store_to_bytes};

    /// T4.1: A store written to disk reads back with sharing intact.
    #[test]
    fn file_round_trip_preserves_sharing() {
        let s = schemas();
        let store = ContextValueDictionary::new();
        let name = InstanceId::new();
        let first = InstanceId::new();
        for root_kind in [s.employee_name, s.address_book_name] {
            let cv = ContextValue::new(
                "Marc",
                vec![InstanceId::new(), name, first],
                vec![root_kind, s.person_name, s.first_name],
                0,
            )
            .expect("value");
            store.add_or_update(cv).expect("add");
        }

        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("store.mean");
        std::fs::write(&path, store_to_bytes(&store, &s.registry).expect("serialize"))
            .expect("write");

        let bytes = std::fs::read(&path).expect("read");
        let restored = store_from_bytes(&bytes, &s.registry).expect("deserialize");

        let names = restored.get_context_nodes(s.person_name).expect("nodes");
        assert_eq!(names.len(), 1);
        assert_eq!(restored.parents(names[0].id).expect("parents").len(), 2);
        assert_eq!(
            restored.node_count().expect("count"),
            store.node_count().expect("count")
        );

        let query = ContextValue::new(
            "Marc",
            vec![InstanceId::new(), InstanceId::new()],
            vec![s.person_name, s.first_name],
            0,
        )
        .expect("value");
        assert_eq!(restored.search(&[query]).expect("search").len(), 2);
    }
}
