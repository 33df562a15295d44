//! # Lookup Rendering
//!
//! A lookup is a short recipe attached to a schema describing how one of
//! its records reads as a single line of text, e.g. `"{LastName}, {FirstName}"`.

use crate::{ContextValue, KindId};

/// One piece of a lookup recipe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupComponent {
    /// Literal text.
    Text(String),
    /// The literal of the value of this kind in the rendered record.
    Value(KindId),
}

/// Ordered text and value components.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Lookup {
    components: Vec<LookupComponent>,
}

impl Lookup {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append literal text.
    pub fn text(&mut self, text: impl Into<String>) -> &mut Self {
        self.components.push(LookupComponent::Text(text.into()));
        self
    }

    /// Append the value of `kind`.
    pub fn value(&mut self, kind: KindId) -> &mut Self {
        self.components.push(LookupComponent::Value(kind));
        self
    }

    #[must_use]
    pub fn components(&self) -> &[LookupComponent] {
        &self.components
    }

    /// The value kinds referenced by this recipe, in order.
    #[must_use]
    pub fn value_kinds(&self) -> Vec<KindId> {
        self.components
            .iter()
            .filter_map(|c| match c {
                LookupComponent::Value(kind) => Some(*kind),
                LookupComponent::Text(_) => None,
            })
            .collect()
    }

    /// Render one record. A value kind with no value in `values` renders empty.
    #[must_use]
    pub fn render(&self, values: &[ContextValue], record_number: usize) -> String {
        self.components
            .iter()
            .map(|component| match component {
                LookupComponent::Text(text) => text.as_str(),
                LookupComponent::Value(kind) => values
                    .iter()
                    .find(|cv| cv.kind() == *kind && cv.record_number() == record_number)
                    .map(ContextValue::value)
                    .unwrap_or_default(),
            })
            .collect()
    }
}
