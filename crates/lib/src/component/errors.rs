//! Error types for components.

use thiserror::Error;

use super::ComponentKind;
use crate::state::EntityId;

/// Errors raised by the component tree.
///
/// # Stability
///
/// - New variants may be added in minor versions (enum is `#[non_exhaustive]`)
/// - Helper methods like `is_*()` provide stable APIs
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ComponentError {
    /// A feature configuration was rejected at construction
    #[error("Invalid configuration for feature '{feature}': {reason}")]
    InvalidConfig { feature: String, reason: String },

    /// The component has been removed and can no longer render or act
    #[error("{kind} component {id:?} has been removed")]
    Removed {
        kind: ComponentKind,
        id: Option<EntityId>,
    },

    /// The entity backing the component is no longer in the store
    #[error("{kind} {id} is not in the store")]
    EntityMissing { kind: ComponentKind, id: EntityId },

    /// The gesture makes no sense on this kind of component
    #[error("Gesture '{gesture}' is not supported on {kind} components")]
    UnsupportedGesture {
        kind: ComponentKind,
        gesture: &'static str,
    },
}

impl ComponentError {
    pub fn is_invalid_config(&self) -> bool {
        matches!(self, ComponentError::InvalidConfig { .. })
    }

    pub fn is_removed(&self) -> bool {
        matches!(self, ComponentError::Removed { .. })
    }
}

// Conversion from ComponentError to the main Error type
impl From<ComponentError> for crate::Error {
    fn from(err: ComponentError) -> Self {
        crate::Error::Component(err)
    }
}
