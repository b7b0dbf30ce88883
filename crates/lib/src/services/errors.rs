//! Error types for collaborator services.

use thiserror::Error;

/// Errors raised by server calls and other host services.
///
/// # Stability
///
/// - New variants may be added in minor versions (enum is `#[non_exhaustive]`)
/// - Helper methods like `is_*()` provide stable APIs
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The request never produced a response
    #[error("Request for '{method}' failed: {reason}")]
    Transport { method: String, reason: String },

    /// The server answered with an exception
    #[error("Server rejected '{method}': {message}")]
    Server {
        method: String,
        errorcode: Option<String>,
        message: String,
    },

    /// The server answered with something that is not a valid response
    #[error("Invalid response for '{method}': {reason}")]
    InvalidResponse { method: String, reason: String },

    /// Fewer responses than requests came back
    #[error("Expected {expected} responses, received {actual}")]
    MissingResponse { expected: usize, actual: usize },

    /// A host service such as templates, strings or forms failed
    #[error("{service} failed: {reason}")]
    Service {
        service: &'static str,
        reason: String,
    },
}

impl RemoteError {
    /// Name of the web service method involved, if any
    pub fn method(&self) -> Option<&str> {
        match self {
            RemoteError::Transport { method, .. }
            | RemoteError::Server { method, .. }
            | RemoteError::InvalidResponse { method, .. } => Some(method),
            _ => None,
        }
    }

    /// Check if the server itself rejected the call
    pub fn is_server_error(&self) -> bool {
        matches!(self, RemoteError::Server { .. })
    }

    /// Check if the call failed before the server could answer
    pub fn is_transport_error(&self) -> bool {
        matches!(self, RemoteError::Transport { .. })
    }

    /// Check if the answer could not be interpreted
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            RemoteError::InvalidResponse { .. } | RemoteError::MissingResponse { .. }
        )
    }
}

// Conversion from RemoteError to the main Error type
impl From<RemoteError> for crate::Error {
    fn from(err: RemoteError) -> Self {
        crate::Error::Remote(err)
    }
}
