//! # Schema Catalog
//!
//! The schemas the CLI knows about: people, businesses, employees, contact
//! details, an employee contract and an address book.
//!
//! Kind names are stable across runs, so a store written with one catalog
//! build loads with the next as long as the names survive.

use meaning_core::{KindId, KindRegistry, MeaningError};

/// Register every catalog kind and schema.
pub fn catalog() -> Result<KindRegistry, MeaningError> {
    let mut registry = KindRegistry::new();

    // Values
    let first_name = registry.value("FirstName")?;
    let last_name = registry.value("LastName")?;
    let employee_id = registry.value("EmployeeId")?;
    let business_name = registry.value("BusinessName")?;
    let phone_number = registry.value("PhoneNumber")?;
    let email_address = registry.value("EmailAddress")?;

    // Plain entities
    let spouse = registry.entity("Spouse")?;
    let child = registry.entity("Child")?;

    // Relationships
    let insured_spouse = registry.relationship("InsuredSpouse")?;
    let insured_child = registry.relationship("InsuredChild")?;
    let emergency_contact = registry.relationship("EmergencyContactRelationship")?;
    let beneficiary = registry.relationship("Beneficiary")?;
    let supervisor = registry.relationship("SupervisorRelationship")?;

    let person_name = registry.schema_with("PersonNameContext", move |ctx| {
        ctx.declare(first_name)?.labeled("First Name").one_and_only_one();
        ctx.declare(last_name)?.labeled("Last Name").one_and_only_one();
        ctx.lookup_renderer_value(last_name)
            .text(", ")
            .value(first_name);
        Ok(())
    })?;

    let person = registry.schema_with("PersonContext", move |ctx| {
        ctx.declare(person_name)?.one_and_only_one();
        Ok(())
    })?;

    let business = registry.schema_with("BusinessContext", move |ctx| {
        ctx.declare(business_name)?.one_and_only_one();
        ctx.lookup_renderer_value(business_name);
        Ok(())
    })?;

    let employee = registry.schema("EmployeeContext")?;
    registry.define_schema(employee, move |ctx| {
        ctx.declare(employee_id)?.one_and_only_one();
        ctx.add_abstraction(employee, person)?
            .labeled("Employee Name")
            .coalesce();
        Ok(())
    })?;

    let phone = registry.schema_with("PhoneContext", move |ctx| {
        ctx.declare(phone_number)?.labeled("Phone");
        Ok(())
    })?;
    let email = registry.schema_with("EmailContext", move |ctx| {
        ctx.declare(email_address)?.labeled("Email");
        Ok(())
    })?;
    let contact = registry.schema_with("ContactContext", move |ctx| {
        ctx.declare(phone)?;
        ctx.declare(email)?;
        Ok(())
    })?;

    registry.schema_with("EmployeeContractContext", move |ctx| {
        ctx.set_label("Employee Contract");
        ctx.declare(employee)?.labeled("Employee").one_and_only_one();
        ctx.declare_relationship(insured_spouse, employee, spouse)?
            .labeled("Spouse")
            .zero_or_one();
        ctx.declare_relationship(insured_child, employee, child)?
            .labeled("Child")
            .zero_or_more();
        ctx.declare_relationship(emergency_contact, employee, person)?
            .labeled("Emergency Contact")
            .min(1)
            .max(2);
        ctx.declare_relationship(beneficiary, employee, person)?
            .labeled("Beneficiary")
            .or(business);
        ctx.declare_relationship(supervisor, employee, person)?
            .labeled("Supervisor")
            .min(1)
            .max(3);
        ctx.add_abstraction(spouse, person)?.labeled("Spouse Name");
        ctx.add_abstraction(child, person)?.labeled("Child Name");
        Ok(())
    })?;

    registry.schema_with("AddressBookContext", move |ctx| {
        ctx.set_label("Address Book");
        ctx.declare(person)?;
        ctx.declare(contact)?;
        Ok(())
    })?;

    Ok(registry)
}

/// Resolve a schema by name, rejecting kinds that are not schemas.
pub fn schema(registry: &KindRegistry, name: &str) -> Result<KindId, MeaningError> {
    let kind = registry.require(name)?;
    if !registry.is_schema(kind) {
        return Err(MeaningError::KindConflict(format!(
            "{} is a {} kind, not a schema",
            name,
            registry.category(kind)?
        )));
    }
    Ok(kind)
}
