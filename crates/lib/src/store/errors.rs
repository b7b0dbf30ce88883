//! Error types for store operations.

use thiserror::Error;

use crate::state::EntityId;

/// Errors raised by [`Store`](super::Store) write sections.
///
/// # Stability
///
/// - New variants may be added in minor versions (enum is `#[non_exhaustive]`)
/// - Helper methods like `is_*()` provide stable APIs
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum StoreError {
    /// Write access was requested while the same thread already holds it
    #[error("Write access requested while a write section is already open on this thread")]
    ReentrantWrite,

    /// A write referenced an entity that is not in the store
    #[error("Record {id} not found in '{collection}'")]
    RecordNotFound { collection: String, id: EntityId },

    /// An update record could not be applied
    #[error("Invalid update for '{name}': {reason}")]
    InvalidUpdate { name: String, reason: String },
}

impl StoreError {
    /// Misuse of the write protocol, as opposed to a data problem
    pub fn is_programming_error(&self) -> bool {
        matches!(self, StoreError::ReentrantWrite)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::RecordNotFound { .. })
    }

    pub fn is_invalid_update(&self) -> bool {
        matches!(self, StoreError::InvalidUpdate { .. })
    }
}

// Conversion from StoreError to the main Error type
impl From<StoreError> for crate::Error {
    fn from(err: StoreError) -> Self {
        crate::Error::Store(err)
    }
}
