//! # Persistence Format
//!
//! Binary serialization for value stores.
//!
//! Format: Header (5 bytes) + postcard-serialized [`SerializableStore`].
//! - 4 bytes: Magic ("MEAN")
//! - 1 byte: Version
//!
//! Kind handles are not stable across registries, so the payload names every
//! kind it uses and loading remaps them against the caller's registry. A
//! kind the registry does not know fails the load with `UnknownKind`.
//!
//! Size and header are validated before the payload is decoded.

use crate::{ContextValueDictionary, KindRegistry, MeaningError, SerializableStore, primitives};
use tracing::debug;

// =============================================================================
// LIMITS
// =============================================================================

/// Maximum accepted size of persisted data, header included.
pub const MAX_PERSISTENCE_PAYLOAD_SIZE: usize = 500 * 1024 * 1024; // 500 MB

/// Minimum valid data size (header only).
const MIN_FILE_SIZE: usize = 5;

// =============================================================================
// FILE HEADER
// =============================================================================

/// The persistence header precedes all store data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistenceHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl PersistenceHeader {
    /// Create a header with the current format version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *primitives::MAGIC_BYTES,
            version: primitives::FORMAT_VERSION,
        }
    }

    pub fn validate(&self) -> Result<(), MeaningError> {
        if &self.magic != primitives::MAGIC_BYTES {
            return Err(MeaningError::DeserializationError(
                "Invalid magic bytes".to_string(),
            ));
        }
        if self.version != primitives::FORMAT_VERSION {
            return Err(MeaningError::DeserializationError(format!(
                "Unsupported version: {} (expected {})",
                self.version,
                primitives::FORMAT_VERSION
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; 5] {
        let mut bytes = [0u8; 5];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MeaningError> {
        if bytes.len() < MIN_FILE_SIZE {
            return Err(MeaningError::DeserializationError(
                "Header too short".to_string(),
            ));
        }
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[0..4]);
        Ok(Self {
            magic,
            version: bytes[4],
        })
    }
}

impl Default for PersistenceHeader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// SERIALIZATION FUNCTIONS
// =============================================================================

/// Serialize a store to bytes (header + payload).
pub fn store_to_bytes(
    store: &ContextValueDictionary,
    registry: &KindRegistry,
) -> Result<Vec<u8>, MeaningError> {
    let header = PersistenceHeader::new();
    let serializable = SerializableStore::from_store(store, registry)?;

    let payload = postcard::to_stdvec(&serializable)
        .map_err(|e| MeaningError::SerializationError(e.to_string()))?;

    let mut result = Vec::with_capacity(MIN_FILE_SIZE + payload.len());
    result.extend_from_slice(&header.to_bytes());
    result.extend_from_slice(&payload);

    debug!(bytes = result.len(), nodes = serializable.nodes.len(), "store serialized");
    Ok(result)
}

/// Deserialize a store from bytes, remapping kinds against `registry`.
pub fn store_from_bytes(
    bytes: &[u8],
    registry: &KindRegistry,
) -> Result<ContextValueDictionary, MeaningError> {
    if bytes.len() < MIN_FILE_SIZE {
        return Err(MeaningError::DeserializationError(
            "Data too short: minimum 5 bytes required".to_string(),
        ));
    }

    if bytes.len() > MAX_PERSISTENCE_PAYLOAD_SIZE {
        return Err(MeaningError::DeserializationError(format!(
            "Data size {} bytes exceeds maximum allowed {} bytes",
            bytes.len(),
            MAX_PERSISTENCE_PAYLOAD_SIZE
        )));
    }

    let header = PersistenceHeader::from_bytes(bytes)?;
    header.validate()?;

    let payload = &bytes[MIN_FILE_SIZE..];
    let serializable: SerializableStore = postcard::from_bytes(payload).map_err(|e| {
        MeaningError::DeserializationError(format!("Failed to deserialize store data: {}", e))
    })?;

    serializable.into_store(registry)
}

// =============================================================================
// TESTS
// =============================================================================
