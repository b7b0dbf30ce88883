//!
//! BookIt: reactive state synchronisation for the booking plugin's management views.
//! This library keeps the client-side view of categories and items consistent with
//! the server while the user creates, edits, deletes, toggles and reorders them.
//!
//! ## Core Concepts
//!
//! * **State (`state::State`)**: Named entity collections plus scalar values, loaded
//!   from server-rendered markup by `bootstrap`.
//! * **Store (`store::Store`)**: The single owner of the state. Readers get immutable
//!   snapshots; writers go through a guarded write section that publishes all of its
//!   changes at once and then notifies watchers.
//! * **Watchers (`watch::WatcherBus`)**: Fine-grained change notifications keyed by
//!   collection, change kind and field (`items.categoryid:updated`).
//! * **Mutations (`mutation::Dispatcher`)**: Named asynchronous handlers that call the
//!   server and apply the result in a write section. Optimistic reorders roll back by
//!   reloading the authoritative state when the server rejects them.
//! * **Reorder (`reorder`)**: The "move after target" list algorithm and its application
//!   to sortorder- and list-ordered scopes.
//! * **Components (`component`)**: The container/category/item tree that renders
//!   entities through templates, patches fields in place, and turns gestures into
//!   mutations.

pub mod bootstrap;
pub mod component;
pub mod config;
pub mod constants;
pub mod filter;
pub mod form;
pub mod mutation;
pub mod reorder;
pub mod services;
pub mod state;
pub mod store;
pub mod watch;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use config::FeatureConfig;
pub use mutation::{Dispatcher, MutationRegistry};
pub use state::{EntityId, Record, State};
pub use store::{ChangeSet, Store, UpdateAction, UpdateRecord, WriteGuard};
pub use watch::{ChangeEvent, EventKey, Subscription, WatcherBus};

/// Result type used throughout the BookIt library.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for the BookIt library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Structured state errors from the state module
    #[error(transparent)]
    State(state::StateError),

    /// Structured write protocol errors from the store module
    #[error(transparent)]
    Store(store::StoreError),

    /// Structured watcher registration errors from the watch module
    #[error(transparent)]
    Watch(watch::WatchError),

    /// Structured dispatch errors from the mutation module
    #[error(transparent)]
    Mutation(mutation::MutationError),

    /// Structured server call errors from the services module
    #[error(transparent)]
    Remote(services::RemoteError),

    /// Structured snapshot parsing errors from the bootstrap module
    #[error(transparent)]
    Bootstrap(bootstrap::BootstrapError),

    /// Structured form result errors from the form module
    #[error(transparent)]
    Form(form::FormError),

    /// Structured component errors from the component module
    #[error(transparent)]
    Component(component::ComponentError),
}

impl Error {
    /// Get the originating module for this error.
    pub fn module(&self) -> &'static str {
        match self {
            Error::State(_) => "state",
            Error::Store(_) => "store",
            Error::Watch(_) => "watch",
            Error::Mutation(_) => "mutation",
            Error::Remote(_) => "services",
            Error::Bootstrap(_) => "bootstrap",
            Error::Form(_) => "form",
            Error::Component(_) => "component",
            Error::Io(_) => "io",
            Error::Serialize(_) => "serialize",
        }
    }

    /// Check if this error is misuse of the API rather than a runtime condition.
    ///
    /// Unknown mutations, invalid watch keys, re-entrant writes and invalid
    /// configuration all fall in this class.
    pub fn is_programming_error(&self) -> bool {
        match self {
            Error::Watch(_) => true,
            Error::Store(store_err) => store_err.is_programming_error(),
            Error::Mutation(mutation_err) => mutation_err.is_unknown_mutation(),
            Error::Component(component_err) => component_err.is_invalid_config(),
            _ => false,
        }
    }

    /// Check if this error is a dispatch of an unregistered mutation name.
    pub fn is_unknown_mutation(&self) -> bool {
        match self {
            Error::Mutation(mutation_err) => mutation_err.is_unknown_mutation(),
            _ => false,
        }
    }

    /// Check if this error came from a server call.
    pub fn is_remote_failure(&self) -> bool {
        matches!(self, Error::Remote(_))
    }

    /// Check if this error is a rejected optimistic update that requires a reload.
    pub fn is_reconciliation_failure(&self) -> bool {
        match self {
            Error::Mutation(mutation_err) => mutation_err.is_reconciliation_failure(),
            _ => false,
        }
    }

    /// Check if this error references an entity that no longer exists.
    pub fn is_stale_reference(&self) -> bool {
        match self {
            Error::Mutation(mutation_err) => mutation_err.is_stale_reference(),
            _ => false,
        }
    }

    /// Check if this error indicates a record was not found.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Store(store_err) => store_err.is_not_found(),
            Error::Mutation(mutation_err) => mutation_err.is_stale_reference(),
            _ => false,
        }
    }

    /// Check if this error indicates malformed input data.
    pub fn is_invalid_data(&self) -> bool {
        match self {
            Error::State(state_err) => state_err.is_malformed_record(),
            Error::Store(store_err) => store_err.is_invalid_update(),
            Error::Mutation(mutation_err) => mutation_err.is_invalid_payload(),
            Error::Bootstrap(_) | Error::Form(_) | Error::Serialize(_) => true,
            _ => false,
        }
    }

    /// Check if this error indicates a data integrity issue.
    pub fn is_integrity_error(&self) -> bool {
        match self {
            Error::State(state_err) => state_err.is_integrity_error(),
            Error::Bootstrap(bootstrap_err) => bootstrap_err.is_integrity_error(),
            _ => false,
        }
    }

    /// Check if this error is I/O related.
    pub fn is_io_error(&self) -> bool {
        matches!(self, Error::Io(_))
    }
}

/// Lock a mutex, recovering the data if a panicking thread poisoned it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
