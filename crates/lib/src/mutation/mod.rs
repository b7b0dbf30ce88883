//! Mutation registry and dispatcher.
//!
//! A mutation is a named asynchronous handler: it validates its payload, calls
//! the server where needed, and applies the outcome to the [`Store`] in a
//! write section. Components never write to the store themselves; they call
//! [`Dispatcher::dispatch_reported`], which reports failures to the user and
//! reloads the authoritative state when an optimistic update is rejected.

use std::{collections::HashMap, future::Future, sync::Arc};

use async_trait::async_trait;
use handle_trait::Handle;
use serde_json::Value;

mod errors;
mod handlers;

pub use errors::MutationError;
pub use handlers::{builtin, names};

use crate::{
    Result,
    config::FeatureConfig,
    services::Services,
    state::{EntityId, Record},
    store::{ChangeSet, Store},
};

/// Everything a mutation handler may touch.
#[derive(Debug, Clone)]
pub struct MutationContext {
    pub store: Store,
    pub services: Services,
    pub config: Arc<FeatureConfig>,
}

impl MutationContext {
    /// Current record `id` of `collection`, or a stale reference error
    pub fn require(&self, collection: &str, id: EntityId) -> Result<Record> {
        self.store.record(collection, id).ok_or_else(|| {
            MutationError::StaleReference {
                collection: collection.to_owned(),
                id,
            }
            .into()
        })
    }
}

/// A named state transition.
#[async_trait]
pub trait Mutation: Send + Sync {
    async fn run(&self, ctx: &MutationContext, payload: Value) -> Result<()>;
}

struct FnMutation<F>(F);

#[async_trait]
impl<F, Fut> Mutation for FnMutation<F>
where
    F: Fn(MutationContext, Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send,
{
    async fn run(&self, ctx: &MutationContext, payload: Value) -> Result<()> {
        (self.0)(ctx.clone(), payload).await
    }
}

/// Name to handler map.
#[derive(Clone, Default)]
pub struct MutationRegistry {
    handlers: HashMap<String, Arc<dyn Mutation>>,
}

impl std::fmt::Debug for MutationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutationRegistry")
            .field("names", &self.names())
            .finish()
    }
}

impl MutationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `mutation` under `name`, replacing any earlier registration.
    pub fn register(&mut self, name: impl Into<String>, mutation: impl Mutation + 'static) {
        self.insert(name.into(), Arc::new(mutation));
    }

    /// Register an async closure
    pub fn register_fn<F, Fut>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(MutationContext, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.insert(name.into(), Arc::new(FnMutation(f)));
    }

    fn insert(&mut self, name: String, mutation: Arc<dyn Mutation>) {
        if self.handlers.insert(name.clone(), mutation).is_some() {
            tracing::debug!(mutation = %name, "Replacing registered mutation");
        }
    }

    /// Merge another registry in; its handlers win on name clashes
    pub fn extend(&mut self, other: MutationRegistry) {
        for (name, mutation) in other.handlers {
            self.insert(name, mutation);
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Mutation>> {
        self.handlers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

struct DispatcherInner {
    context: MutationContext,
    registry: MutationRegistry,
}

/// Runs mutations by name. Cheap to clone.
#[derive(Clone, Handle)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("feature", &self.inner.context.config.name)
            .field("registry", &self.inner.registry)
            .finish()
    }
}

impl Dispatcher {
    /// Create a dispatcher with a custom registry
    pub fn new(
        store: Store,
        services: Services,
        config: FeatureConfig,
        registry: MutationRegistry,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(DispatcherInner {
                context: MutationContext {
                    store,
                    services,
                    config: Arc::new(config),
                },
                registry,
            }),
        })
    }

    /// Create a dispatcher with the built-in mutations of `config`
    pub fn for_feature(store: Store, services: Services, config: FeatureConfig) -> Result<Self> {
        let registry = builtin(&config);
        Self::new(store, services, config, registry)
    }

    pub fn store(&self) -> &Store {
        &self.inner.context.store
    }

    pub fn services(&self) -> &Services {
        &self.inner.context.services
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.inner.context.config
    }

    pub fn registry(&self) -> &MutationRegistry {
        &self.inner.registry
    }

    /// Run the mutation registered under `name`.
    ///
    /// A mutation that finds its target entity gone is a no-op and returns
    /// `Ok`. Any other failure is returned to the caller.
    pub async fn dispatch(&self, name: &str, payload: Value) -> Result<()> {
        let Some(mutation) = self.inner.registry.get(name) else {
            tracing::error!(mutation = name, "Dispatch of unknown mutation");
            return Err(MutationError::UnknownMutation {
                name: name.to_owned(),
            }
            .into());
        };

        tracing::debug!(mutation = name, "Dispatching mutation");
        match mutation.run(&self.inner.context, payload).await {
            Err(err) if err.is_stale_reference() => {
                tracing::warn!(
                    mutation = name,
                    error = %err,
                    "Ignoring mutation on stale reference"
                );
                Ok(())
            }
            result => result,
        }
    }

    /// Run a mutation and report any failure to the user instead of returning it.
    ///
    /// A rejected optimistic update additionally reloads the authoritative
    /// state. Returns whether the mutation succeeded.
    pub async fn dispatch_reported(&self, name: &str, payload: Value) -> bool {
        let Err(err) = self.dispatch(name, payload).await else {
            return true;
        };

        tracing::error!(mutation = name, error = %err, "Mutation failed");
        if err.is_reconciliation_failure() {
            if let Err(reload_err) = self.reload().await {
                tracing::error!(error = %reload_err, "Reload after rejected update failed");
                self.services().notifier.exception(&reload_err).await;
            }
        }
        self.services().notifier.exception(&err).await;
        false
    }

    /// Replace the store's state with the authoritative one
    pub async fn reload(&self) -> Result<ChangeSet> {
        tracing::info!(feature = %self.config().name, "Reloading state from server");
        let state = self.services().snapshots.fetch().await?;
        self.store().replace(state)
    }
}
