//! Error types for the state model.
//!
//! These cover malformed records and violations of the referential rules
//! between collections (items must always point at an existing category).

use thiserror::Error;

use super::EntityId;

/// Errors raised while building or inspecting [`State`](super::State) values.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum StateError {
    /// A record was built from a JSON value that is not an object
    #[error("Record must be a JSON object, found {actual}")]
    NotAnObject { actual: String },

    /// A record is missing its integer `id`
    #[error("Record is missing an integer 'id' field")]
    MissingId,

    /// Two records in one collection share an id
    #[error("Duplicate id {id} in collection '{collection}'")]
    DuplicateId { collection: String, id: EntityId },

    /// A record could not be converted into its typed entity
    #[error("Record {id} in '{collection}' does not match its entity type: {reason}")]
    EntityMismatch {
        collection: String,
        id: EntityId,
        reason: String,
    },

    /// A child record references a parent that does not exist
    #[error("Record {id} in '{collection}' references missing {field} {parent}")]
    DanglingReference {
        collection: String,
        id: EntityId,
        field: String,
        parent: EntityId,
    },
}

impl StateError {
    /// Check if this error describes a malformed record
    pub fn is_malformed_record(&self) -> bool {
        matches!(
            self,
            StateError::NotAnObject { .. }
                | StateError::MissingId
                | StateError::EntityMismatch { .. }
        )
    }

    /// Check if this error is an integrity violation between collections
    pub fn is_integrity_error(&self) -> bool {
        matches!(
            self,
            StateError::DuplicateId { .. } | StateError::DanglingReference { .. }
        )
    }

    /// Get the collection name if this error is scoped to one
    pub fn collection(&self) -> Option<&str> {
        match self {
            StateError::DuplicateId { collection, .. }
            | StateError::EntityMismatch { collection, .. }
            | StateError::DanglingReference { collection, .. } => Some(collection),
            _ => None,
        }
    }
}

// Conversion from StateError to the main Error type
impl From<StateError> for crate::Error {
    fn from(err: StateError) -> Self {
        crate::Error::State(err)
    }
}
