//! Error types for the watcher bus.

use thiserror::Error;

/// Errors raised when registering watchers.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum WatchError {
    /// The watch key could not be parsed
    #[error("Invalid watch key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },
}

impl WatchError {
    /// Get the offending key
    pub fn key(&self) -> &str {
        match self {
            WatchError::InvalidKey { key, .. } => key,
        }
    }
}

// Conversion from WatchError to the main Error type
impl From<WatchError> for crate::Error {
    fn from(err: WatchError) -> Self {
        crate::Error::Watch(err)
    }
}
