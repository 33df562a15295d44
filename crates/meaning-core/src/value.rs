//! # Context Values
//!
//! A literal bound to one field of one record: the literal, the instance-path
//! identifying the record's concrete instances, the type-path naming their
//! kinds, and the record number distinguishing repeated values under the
//! same parent.

use crate::primitives::MAX_VALUE_LENGTH;
use crate::{InstanceId, KindId, MeaningError};
use serde::{Deserialize, Serialize};

/// A literal value positioned in the instance graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextValue {
    value: String,
    instance_path: Vec<InstanceId>,
    type_path: Vec<KindId>,
    record_number: usize,
}

impl ContextValue {
    /// Create a value. Both paths must be non-empty and of equal length, and
    /// the literal at most `MAX_VALUE_LENGTH` bytes.
    pub fn new(
        value: impl Into<String>,
        instance_path: Vec<InstanceId>,
        type_path: Vec<KindId>,
        record_number: usize,
    ) -> Result<Self, MeaningError> {
        let value = value.into();
        if value.len() > MAX_VALUE_LENGTH {
            return Err(MeaningError::InvalidValuePath(format!(
                "value of {} bytes exceeds maximum allowed {} bytes",
                value.len(),
                MAX_VALUE_LENGTH
            )));
        }
        if instance_path.is_empty() {
            return Err(MeaningError::InvalidValuePath(
                "instance path must not be empty".to_string(),
            ));
        }
        if instance_path.len() != type_path.len() {
            return Err(MeaningError::InvalidValuePath(format!(
                "instance path has {} entries, type path has {}",
                instance_path.len(),
                type_path.len()
            )));
        }

        Ok(Self {
            value,
            instance_path,
            type_path,
            record_number,
        })
    }

    /// The literal.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    #[must_use]
    pub fn instance_path(&self) -> &[InstanceId] {
        &self.instance_path
    }

    #[must_use]
    pub fn type_path(&self) -> &[KindId] {
        &self.type_path
    }

    #[must_use]
    pub fn record_number(&self) -> usize {
        self.record_number
    }

    /// The value's own kind: the last type-path entry.
    #[must_use]
    pub fn kind(&self) -> KindId {
        self.type_path
            .last()
            .copied()
            .unwrap_or(KindId::NULL_ENTITY)
    }

    /// The value's identity: the last instance-path entry.
    #[must_use]
    pub fn instance_id(&self) -> InstanceId {
        self.instance_path
            .last()
            .copied()
            .unwrap_or(InstanceId::NIL)
    }

    /// Kind and instance of the immediate parent, when the path has one.
    #[must_use]
    pub fn parent(&self) -> Option<TypeInstance> {
        let n = self.type_path.len();
        (n >= 2).then(|| TypeInstance {
            kind: self.type_path[n - 2],
            instance: self.instance_path[n - 2],
        })
    }

    /// Rewrite every kind in the type-path.
    pub(crate) fn map_kinds<F>(self, mut f: F) -> Result<Self, MeaningError>
    where
        F: FnMut(KindId) -> Result<KindId, MeaningError>,
    {
        let type_path = self
            .type_path
            .into_iter()
            .map(&mut f)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { type_path, ..self })
    }
}

/// A (kind, instance) pair along a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TypeInstance {
    pub kind: KindId,
    pub instance: InstanceId,
}
