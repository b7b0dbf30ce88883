//! Error types for mutation dispatch.

use thiserror::Error;

use crate::state::EntityId;

/// Errors raised while dispatching mutations.
///
/// # Stability
///
/// - New variants may be added in minor versions (enum is `#[non_exhaustive]`)
/// - Helper methods like `is_*()` provide stable APIs
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum MutationError {
    /// No handler is registered under this name
    #[error("Unknown mutation '{name}'")]
    UnknownMutation { name: String },

    /// The payload does not have the shape the handler expects
    #[error("Invalid payload for '{mutation}': {reason}")]
    InvalidPayload { mutation: String, reason: String },

    /// The mutation targets an entity that is no longer in the store
    #[error("Entity {id} no longer exists in '{collection}'")]
    StaleReference { collection: String, id: EntityId },

    /// The server rejected an update that was already applied locally
    #[error("Server rejected '{mutation}', reloading: {reason}")]
    ReconciliationFailed { mutation: String, reason: String },
}

impl MutationError {
    pub fn is_unknown_mutation(&self) -> bool {
        matches!(self, MutationError::UnknownMutation { .. })
    }

    pub fn is_invalid_payload(&self) -> bool {
        matches!(self, MutationError::InvalidPayload { .. })
    }

    pub fn is_stale_reference(&self) -> bool {
        matches!(self, MutationError::StaleReference { .. })
    }

    pub fn is_reconciliation_failure(&self) -> bool {
        matches!(self, MutationError::ReconciliationFailed { .. })
    }

    /// Get the mutation name involved, if any
    pub fn mutation(&self) -> Option<&str> {
        match self {
            MutationError::UnknownMutation { name } => Some(name),
            MutationError::InvalidPayload { mutation, .. }
            | MutationError::ReconciliationFailed { mutation, .. } => Some(mutation),
            MutationError::StaleReference { .. } => None,
        }
    }
}

// Conversion from MutationError to the main Error type
impl From<MutationError> for crate::Error {
    fn from(err: MutationError) -> Self {
        crate::Error::Mutation(err)
    }
}
