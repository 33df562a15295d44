//! # Formats
//!
//! Pure byte-level transformations of the value store. Reading and writing
//! files is the app's job.

pub mod persistence;

pub use persistence::{
    MAX_PERSISTENCE_PAYLOAD_SIZE, PersistenceHeader, store_from_bytes, store_to_bytes,
};
