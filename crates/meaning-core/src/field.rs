//! # Fields and Groups
//!
//! The parser's output: fields (leaf value slots addressed by type-path)
//! bundled into named groups.

use crate::declaration::RelationshipDeclaration;
use crate::{ContextPath, ContextValue, InstanceId, KindId, MeaningError};

// =============================================================================
// FIELD
// =============================================================================

/// A leaf value slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    label: String,
    path: Vec<ContextPath>,
}

impl Field {
    #[must_use]
    pub fn new(label: impl Into<String>, path: Vec<ContextPath>) -> Self {
        Self {
            label: label.into(),
            path,
        }
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The type-path from the root schema to the value kind.
    #[must_use]
    pub fn path(&self) -> &[ContextPath] {
        &self.path
    }

    /// The kinds along the type-path.
    #[must_use]
    pub fn kinds(&self) -> Vec<KindId> {
        self.path.iter().map(|p| p.kind).collect()
    }

    /// The value kind at the end of the path.
    #[must_use]
    pub fn value_kind(&self) -> Option<KindId> {
        self.path.last().map(|p| p.kind)
    }

    /// Bind a literal to this field for one record.
    pub fn create_value(
        &self,
        literal: impl Into<String>,
        instance_path: Vec<InstanceId>,
        record_number: usize,
    ) -> Result<ContextValue, MeaningError> {
        ContextValue::new(literal, instance_path, self.kinds(), record_number)
    }
}

// =============================================================================
// GROUP
// =============================================================================

/// Fields sharing a schema-level origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    name: String,
    kind: KindId,
    path: Vec<ContextPath>,
    relationship: Option<RelationshipDeclaration>,
    fields: Vec<Field>,
}

impl Group {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        kind: KindId,
        path: Vec<ContextPath>,
        relationship: Option<RelationshipDeclaration>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            path,
            relationship,
            fields: Vec::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The kind the group originates from.
    #[must_use]
    pub fn kind(&self) -> KindId {
        self.kind
    }

    /// Type-path prefix at the point the group was created.
    #[must_use]
    pub fn path(&self) -> &[ContextPath] {
        &self.path
    }

    /// The relationship the group was reached through, if any.
    #[must_use]
    pub fn relationship(&self) -> Option<&RelationshipDeclaration> {
        self.relationship.as_ref()
    }

    #[must_use]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn add_field(&mut self, field: Field) {
        self.fields.push(field);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PathSegment;

    const NAME: KindId = KindId(10);
    const FIRST_NAME: KindId = KindId(11);

    #[test]
    fn field_value_carries_its_type_path() {
        let field = Field::new(
            "First Name",
            vec![
                ContextPath::new(PathSegment::Root, NAME),
                ContextPath::new(PathSegment::Field, FIRST_NAME),
            ],
        );
        let cv = field
            .create_value("Marc", vec![InstanceId::new(), InstanceId::new()], 2)
            .expect("value");
        assert_eq!(cv.type_path(), &[NAME, FIRST_NAME]);
        assert_eq!(cv.record_number(), 2);
        assert_eq!(field.value_kind(), Some(FIRST_NAME));
    }
}
