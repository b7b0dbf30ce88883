//! Watcher bus: routes change notifications from committed writes to
//! subscribed handlers.
//!
//! Handlers for one event fire in registration order, exactly once each.
//! They run after the store has published the new snapshot and released
//! write access, so a handler may read the store or dispatch further
//! mutations.
//!
//! Events are delivered in commit order. Commits enqueue their events while
//! still holding write access; whichever thread finds the queue idle drains
//! it. A write made by a handler is therefore delivered after the event that
//! triggered it has reached every watcher, never nested inside it.

use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex, Weak,
        atomic::{AtomicU64, Ordering},
    },
};

use handle_trait::Handle;

mod errors;
mod event;

pub use errors::WatchError;
pub use event::{ChangeEvent, ChangeKind, EventKey};

use crate::{Result, lock};

/// Callback invoked for each matching event.
pub type WatchHandler = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

/// Predicate selecting events for [`WatcherBus::watch_matching`].
pub type WatchPredicate = Arc<dyn Fn(&ChangeEvent) -> bool + Send + Sync>;

/// Identifier of one registered watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

enum Filter {
    Key(EventKey),
    Predicate(WatchPredicate),
}

impl Filter {
    fn accepts(&self, event: &ChangeEvent) -> bool {
        match self {
            Filter::Key(key) => key.matches(&event.key),
            Filter::Predicate(predicate) => predicate(event),
        }
    }
}

struct Watcher {
    id: SubscriptionId,
    filter: Filter,
    handler: WatchHandler,
}

#[derive(Default)]
struct Outbox {
    pending: VecDeque<ChangeEvent>,
    /// A thread is currently delivering from `pending`
    draining: bool,
}

#[derive(Default)]
struct BusInner {
    next_id: AtomicU64,
    watchers: Mutex<Vec<Watcher>>,
    outbox: Mutex<Outbox>,
}

/// Clears the draining flag when a handler panics mid-delivery.
struct DrainGuard<'a>(&'a BusInner);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            lock(&self.0.outbox).draining = false;
        }
    }
}

/// The shared watcher registry of one store.
#[derive(Clone, Default, Handle)]
pub struct WatcherBus {
    inner: Arc<BusInner>,
}

impl std::fmt::Debug for WatcherBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherBus")
            .field("watchers", &self.len())
            .finish()
    }
}

impl WatcherBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to a key in string form (`"items"`, `"items:created"`,
    /// `"items.amount:updated"`, `"state:updated"`).
    pub fn watch<F>(&self, key: &str, handler: F) -> Result<Subscription>
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        let key: EventKey = key.parse()?;
        Ok(self.watch_key(key, handler))
    }

    /// Subscribe to an already parsed key
    pub fn watch_key<F>(&self, key: EventKey, handler: F) -> Subscription
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        self.register(Filter::Key(key), Arc::new(handler))
    }

    /// Subscribe to every event accepted by `predicate`
    pub fn watch_matching<P, F>(&self, predicate: P, handler: F) -> Subscription
    where
        P: Fn(&ChangeEvent) -> bool + Send + Sync + 'static,
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        self.register(Filter::Predicate(Arc::new(predicate)), Arc::new(handler))
    }

    fn register(&self, filter: Filter, handler: WatchHandler) -> Subscription {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.inner.watchers).push(Watcher {
            id,
            filter,
            handler,
        });
        Subscription {
            id,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Remove a watcher. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        remove_watcher(&self.inner, id)
    }

    pub fn is_subscribed(&self, id: SubscriptionId) -> bool {
        lock(&self.inner.watchers).iter().any(|w| w.id == id)
    }

    /// Number of registered watchers
    pub fn len(&self) -> usize {
        lock(&self.inner.watchers).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Queue events behind everything published before them.
    pub(crate) fn enqueue(&self, events: &[ChangeEvent]) {
        lock(&self.inner.outbox).pending.extend(events.iter().cloned());
    }

    /// Deliver queued events, unless another call is already doing so.
    ///
    /// The delivering call keeps going until the queue is empty, so events
    /// queued by its own handlers or by other threads are delivered by it,
    /// in queue order.
    pub(crate) fn drain(&self) {
        {
            let mut outbox = lock(&self.inner.outbox);
            if outbox.draining || outbox.pending.is_empty() {
                return;
            }
            outbox.draining = true;
        }
        let _guard = DrainGuard(&self.inner);
        loop {
            let next = {
                let mut outbox = lock(&self.inner.outbox);
                match outbox.pending.pop_front() {
                    Some(event) => event,
                    None => {
                        // Cleared under the same lock a concurrent enqueue takes
                        outbox.draining = false;
                        return;
                    }
                }
            };
            self.deliver(&next);
        }
    }

    /// Enqueue and deliver
    pub(crate) fn publish(&self, events: &[ChangeEvent]) {
        self.enqueue(events);
        self.drain();
    }

    /// Deliver one event to its watchers.
    ///
    /// The matching handlers are collected under the lock and invoked after
    /// it is released. A watcher removed by an earlier handler is skipped.
    fn deliver(&self, event: &ChangeEvent) {
        let matching: Vec<(SubscriptionId, WatchHandler)> = lock(&self.inner.watchers)
            .iter()
            .filter(|w| w.filter.accepts(event))
            .map(|w| (w.id, w.handler.clone()))
            .collect();

        tracing::trace!(event = %event.key, watchers = matching.len(), "Publishing change");

        for (id, handler) in matching {
            if self.is_subscribed(id) {
                handler(event);
            }
        }
    }
}

fn remove_watcher(inner: &BusInner, id: SubscriptionId) -> bool {
    let mut watchers = lock(&inner.watchers);
    let before = watchers.len();
    watchers.retain(|w| w.id != id);
    before != watchers.len()
}

/// Handle to one registered watcher.
///
/// Dropping the handle does not unsubscribe; call [`Subscription::unsubscribe`]
/// when the owning component is torn down.
#[derive(Debug, Clone)]
pub struct Subscription {
    id: SubscriptionId,
    bus: Weak<BusInner>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Stop receiving events. Safe to call any number of times.
    pub fn unsubscribe(&self) {
        let Some(inner) = self.bus.upgrade() else {
            return;
        };
        if remove_watcher(&inner, self.id) {
            tracing::trace!(id = self.id.0, "Watcher unsubscribed");
        }
    }
}
