//! The guarded state container.
//!
//! A [`Store`] holds the current [`State`] as an immutable snapshot. Readers
//! receive `Arc<State>` snapshots and can never mutate them. The only way to
//! change state is a write section:
//!
//! 1. [`Store::begin_write`] acquires write access and hands out a
//!    [`WriteGuard`] over a private working copy.
//! 2. The caller mutates the working copy freely.
//! 3. [`WriteGuard::commit`] diffs the copy against the snapshot it started
//!    from, publishes it as the new snapshot, queues the change events,
//!    releases write access and then notifies the [`WatcherBus`].
//!
//! A commit made from inside a watcher returns before its own events are
//! delivered; they follow once the event being delivered has reached every
//! watcher.
//!
//! Observers therefore see either the snapshot before or the snapshot after a
//! write section, never a mix. A guard dropped without committing discards its
//! changes.
//!
//! Write sections never span an `.await`: [`WriteGuard`] is `!Send`, so any
//! `Send` future (every mutation handler) that tried to hold one across a
//! suspension point would not compile.

use std::{
    ops::{Deref, DerefMut},
    sync::{
        Arc, Mutex, MutexGuard, RwLock,
        atomic::{AtomicU64, Ordering},
    },
    thread::{self, ThreadId},
};

use handle_trait::Handle;
use serde_json::Value;

mod diff;
mod errors;
mod updates;

pub use errors::StoreError;
pub use updates::{UpdateAction, UpdateRecord};

use crate::{
    Result,
    config::FeatureConfig,
    lock,
    state::{Entity, EntityId, Record, State},
    watch::{ChangeEvent, EventKey, WatcherBus},
};

/// The events produced by one committed write section.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    events: Vec<ChangeEvent>,
}

impl ChangeSet {
    pub fn events(&self) -> &[ChangeEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Whether an event with exactly this key was fired
    pub fn contains(&self, key: &EventKey) -> bool {
        self.events.iter().any(|e| &e.key == key)
    }

    /// Whether an event with this key was fired for entity `id`
    pub fn contains_for(&self, key: &EventKey, id: EntityId) -> bool {
        self.events
            .iter()
            .any(|e| &e.key == key && e.id == Some(id))
    }
}

impl IntoIterator for ChangeSet {
    type Item = ChangeEvent;
    type IntoIter = std::vec::IntoIter<ChangeEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.into_iter()
    }
}

pub(crate) struct StoreInner {
    current: RwLock<Arc<State>>,
    /// Serializes write sections
    write_lock: Mutex<()>,
    /// Thread currently inside a write section, for re-entrancy detection
    writer: Mutex<Option<ThreadId>>,
    version: AtomicU64,
    bus: WatcherBus,
}

/// Shared handle to one page's state. Cheap to clone; construct one per view
/// and pass it to every component and mutation handler that needs it.
#[derive(Clone, Handle)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("version", &self.version())
            .field("bus", &self.inner.bus)
            .finish()
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new(State::new())
    }
}

impl Store {
    /// Create a store holding `initial`
    pub fn new(initial: State) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                current: RwLock::new(Arc::new(initial)),
                write_lock: Mutex::new(()),
                writer: Mutex::new(None),
                version: AtomicU64::new(0),
                bus: WatcherBus::new(),
            }),
        }
    }

    /// The current immutable snapshot
    pub fn snapshot(&self) -> Arc<State> {
        let current = self
            .inner
            .current
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Arc::clone(&current)
    }

    /// JSON view of a collection (records in insertion order) or a scalar
    pub fn get(&self, key: &str) -> Option<Value> {
        let state = self.snapshot();
        if let Some(collection) = state.collection(key) {
            return Some(Value::Array(
                collection.iter().map(Record::to_value).collect(),
            ));
        }
        state.scalar(key).cloned()
    }

    pub fn record(&self, collection: &str, id: EntityId) -> Option<Record> {
        self.snapshot().record(collection, id).cloned()
    }

    /// Typed lookup of an entity in its default collection
    pub fn entity<T: Entity>(&self, id: EntityId) -> Result<Option<T>> {
        Ok(self.snapshot().entity(id)?)
    }

    /// Number of write sections that changed something
    pub fn version(&self) -> u64 {
        self.inner.version.load(Ordering::Acquire)
    }

    /// The watcher bus notified by this store
    pub fn bus(&self) -> &WatcherBus {
        &self.inner.bus
    }

    /// Acquire write access (beginWrite).
    ///
    /// Blocks while another thread is inside a write section. Fails with
    /// [`StoreError::ReentrantWrite`] if the calling thread already is.
    pub fn begin_write(&self) -> Result<WriteGuard<'_>> {
        let me = thread::current().id();
        if *lock(&self.inner.writer) == Some(me) {
            tracing::error!("Re-entrant write section on the store");
            return Err(StoreError::ReentrantWrite.into());
        }

        let permit = lock(&self.inner.write_lock);
        *lock(&self.inner.writer) = Some(me);

        let base = self.snapshot();
        let draft = State::clone(&base);
        Ok(WriteGuard {
            store: self,
            base,
            draft,
            permit: Some(permit),
        })
    }

    /// Run `f` inside a write section and commit its changes.
    ///
    /// If `f` returns an error the section is discarded and nothing is
    /// published.
    pub fn write<R>(&self, f: impl FnOnce(&mut State) -> Result<R>) -> Result<R> {
        let mut guard = self.begin_write()?;
        let result = f(&mut *guard)?;
        guard.commit();
        Ok(result)
    }

    /// Replace the whole state, e.g. after reloading it from the server.
    pub fn replace(&self, state: State) -> Result<ChangeSet> {
        let mut guard = self.begin_write()?;
        *guard = state;
        Ok(guard.commit())
    }

    /// Apply a list of update records in a single write section.
    ///
    /// Category deletes cascade to their items. If the result would leave an
    /// item pointing at a missing category, nothing is published and the
    /// integrity error is returned.
    pub fn process_updates(
        &self,
        config: &FeatureConfig,
        updates: &[UpdateRecord],
    ) -> Result<ChangeSet> {
        let mut guard = self.begin_write()?;
        if let Err(err) = apply_updates(&mut guard, config, updates) {
            tracing::warn!(error = %err, "Update list rejected");
            guard.rollback();
            return Err(err);
        }
        Ok(guard.commit())
    }
}

fn apply_updates(
    state: &mut State,
    config: &FeatureConfig,
    updates: &[UpdateRecord],
) -> Result<()> {
    for update in updates {
        update.apply(state, config)?;
    }
    state.check_integrity(config)?;
    Ok(())
}

/// Scoped write access to a [`Store`].
///
/// Derefs to the working copy of the state. Nothing is visible to readers
/// until [`WriteGuard::commit`].
pub struct WriteGuard<'a> {
    store: &'a Store,
    base: Arc<State>,
    draft: State,
    permit: Option<MutexGuard<'a, ()>>,
}

impl std::fmt::Debug for WriteGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteGuard")
            .field("open", &self.permit.is_some())
            .finish_non_exhaustive()
    }
}

impl WriteGuard<'_> {
    /// Publish the working copy and notify watchers (endWrite).
    pub fn commit(mut self) -> ChangeSet {
        let draft = std::mem::take(&mut self.draft);
        let events = diff::diff(&self.base, &draft);

        if !events.is_empty() {
            let mut current = self
                .store
                .inner
                .current
                .write()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            *current = Arc::new(draft);
            self.store.inner.version.fetch_add(1, Ordering::AcqRel);
        }
        // Queued before release so delivery follows commit order
        self.store.inner.bus.enqueue(&events);
        self.release();

        tracing::debug!(events = events.len(), "Store write committed");
        self.store.inner.bus.drain();
        ChangeSet { events }
    }

    /// Discard the working copy without publishing anything.
    pub fn rollback(mut self) {
        tracing::debug!("Store write rolled back");
        self.release();
    }

    fn release(&mut self) {
        if let Some(permit) = self.permit.take() {
            *lock(&self.store.inner.writer) = None;
            drop(permit);
        }
    }
}

impl Deref for WriteGuard<'_> {
    type Target = State;

    fn deref(&self) -> &State {
        &self.draft
    }
}

impl DerefMut for WriteGuard<'_> {
    fn deref_mut(&mut self) -> &mut State {
        &mut self.draft
    }
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        if self.permit.is_some() {
            tracing::warn!("Write section dropped without commit; changes discarded");
            self.release();
        }
    }
}
