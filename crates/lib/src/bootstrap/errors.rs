//! Error types for loading the initial state.

use thiserror::Error;

use crate::state::EntityId;

/// Errors raised while turning server-rendered rows into a [`State`](crate::State).
///
/// # Stability
///
/// - New variants may be added in minor versions (enum is `#[non_exhaustive]`)
/// - Helper methods like `is_*()` provide stable APIs
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("Row {row}: missing attribute '{attribute}'")]
    MissingAttribute { row: usize, attribute: String },

    #[error("Row {row}: attribute '{attribute}' has invalid value '{value}' (expected {expected})")]
    InvalidAttribute {
        row: usize,
        attribute: String,
        value: String,
        expected: &'static str,
    },

    #[error("Row {row}: unknown region '{region}'")]
    UnknownRegion { row: usize, region: String },

    #[error("Duplicate id {id} in '{collection}'")]
    DuplicateId { collection: String, id: EntityId },

    #[error("Item {id} references missing category {categoryid}")]
    OrphanItem { id: EntityId, categoryid: EntityId },
}

impl BootstrapError {
    /// Row the error was found in, for per-row errors
    pub fn row(&self) -> Option<usize> {
        match self {
            BootstrapError::MissingAttribute { row, .. }
            | BootstrapError::InvalidAttribute { row, .. }
            | BootstrapError::UnknownRegion { row, .. } => Some(*row),
            _ => None,
        }
    }

    /// Rows are individually valid but inconsistent with each other
    pub fn is_integrity_error(&self) -> bool {
        matches!(
            self,
            BootstrapError::DuplicateId { .. } | BootstrapError::OrphanItem { .. }
        )
    }
}

// Conversion from BootstrapError to the main Error type
impl From<BootstrapError> for crate::Error {
    fn from(err: BootstrapError) -> Self {
        crate::Error::Bootstrap(err)
    }
}
