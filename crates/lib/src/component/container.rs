//! The root component.

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
};

use handle_trait::Handle;
use serde_json::json;
use tokio::sync::Notify;

use super::{
    ComponentEnv, ComponentError, ComponentKind, EntityComponent, Fragment, Gesture, Lifecycle,
    gesture,
};
use crate::{
    Result,
    constants::{ACTIVE_FILTERS, ACTIVE_ROLE, ACTIVE_ROOM},
    filter::ActiveFilters,
    lock,
    reorder::{category_order, item_order},
    state::EntityId,
    watch::{ChangeEvent, ChangeKind, Subscription},
};

struct ContainerState {
    lifecycle: Lifecycle,
    fragment: Fragment,
    /// Rendered structure: categories in order, each with its items in order
    order: Vec<(EntityId, Vec<EntityId>)>,
    categories: HashMap<EntityId, EntityComponent>,
    items: HashMap<EntityId, EntityComponent>,
    /// A structural change arrived since the last flush
    dirty: bool,
    subscriptions: Vec<Subscription>,
}

struct ContainerInner {
    env: ComponentEnv,
    state: Mutex<ContainerState>,
    changed: Notify,
}

impl ContainerInner {
    fn is_structural(&self, event: &ChangeEvent) -> bool {
        let config = self.env.config();
        let Some(name) = event.key.name() else {
            return false;
        };
        let kind = if name == config.categories {
            ComponentKind::Category
        } else if name == config.items {
            ComponentKind::Item
        } else {
            return false;
        };
        match event.field_name() {
            Some(field) => kind.is_structural(config, field),
            None => matches!(event.kind(), Some(ChangeKind::Created | ChangeKind::Deleted)),
        }
    }

    fn affects_visibility(&self, event: &ChangeEvent) -> bool {
        let config = self.env.config();
        match event.key.name() {
            Some(ACTIVE_ROOM | ACTIVE_ROLE | ACTIVE_FILTERS) => true,
            Some(name) if name == config.items => event
                .field_name()
                .is_some_and(|field| field == config.filters.room || field == config.filters.role),
            _ => false,
        }
    }

    fn mark_dirty(&self) {
        let mut state = lock(&self.state);
        if state.lifecycle == Lifecycle::Removed || state.dirty {
            return;
        }
        state.dirty = true;
        drop(state);
        tracing::trace!("Structural change, container needs a flush");
        self.changed.notify_one();
    }

    /// Show or hide items and categories according to the active filters.
    fn apply_visibility(&self) {
        let config = self.env.config();
        let snapshot = self.env.dispatcher.store().snapshot();
        let filters = ActiveFilters::from_state(&snapshot);

        let state = lock(&self.state);
        for (category, items) in &state.order {
            let mut any_visible = false;
            for item in items {
                let visible = snapshot
                    .record(&config.items, *item)
                    .is_none_or(|record| filters.is_visible(record, &config.filters));
                if let Some(component) = state.items.get(item) {
                    component.set_hidden(!visible);
                }
                any_visible |= visible;
            }
            if let Some(component) = state.categories.get(category) {
                component.set_hidden(filters.is_active() && !items.is_empty() && !any_visible);
            }
        }
    }
}

/// Root of the component tree. Cheap to clone; clones share state.
#[derive(Clone, Handle)]
pub struct Container {
    inner: Arc<ContainerInner>,
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("feature", &self.inner.env.config().name)
            .field("lifecycle", &self.lifecycle())
            .finish()
    }
}

impl Container {
    /// Create the container and subscribe it to structural and filter changes.
    pub fn new(env: ComponentEnv) -> Result<Self> {
        env.config().validate()?;
        let bus = env.dispatcher.store().bus().clone();
        let inner = Arc::new(ContainerInner {
            env,
            state: Mutex::new(ContainerState {
                lifecycle: Lifecycle::Uninitialized,
                fragment: Fragment::default(),
                order: Vec::new(),
                categories: HashMap::new(),
                items: HashMap::new(),
                dirty: true,
                subscriptions: Vec::new(),
            }),
            changed: Notify::new(),
        });

        let (filter, handler) = (Arc::downgrade(&inner), Arc::downgrade(&inner));
        let structural = bus.watch_matching(
            move |event| filter.upgrade().is_some_and(|inner| inner.is_structural(event)),
            move |_| {
                if let Some(inner) = handler.upgrade() {
                    inner.mark_dirty();
                }
            },
        );

        let (filter, handler) = (Arc::downgrade(&inner), Arc::downgrade(&inner));
        let visibility = bus.watch_matching(
            move |event| filter.upgrade().is_some_and(|inner| inner.affects_visibility(event)),
            move |_| {
                if let Some(inner) = handler.upgrade() {
                    if lock(&inner.state).lifecycle.is_live() {
                        inner.apply_visibility();
                    }
                }
            },
        );

        lock(&inner.state).subscriptions.extend([structural, visibility]);
        Ok(Self { inner })
    }

    /// Build and render the whole tree for the first time
    pub async fn mount(&self) -> Result<()> {
        tracing::info!(feature = %self.inner.env.config().name, "Mounting component tree");
        self.flush().await
    }

    /// Whether structural changes are waiting for [`Container::flush`]
    pub fn needs_flush(&self) -> bool {
        lock(&self.inner.state).dirty
    }

    /// Wait until a structural change arrives
    pub async fn changed(&self) {
        self.inner.changed.notified().await;
    }

    /// Reconcile the tree with the store.
    ///
    /// Components of deleted entities are removed, components of new entities
    /// are created, and only components whose content or children changed are
    /// rendered again.
    pub async fn flush(&self) -> Result<()> {
        let env = &self.inner.env;
        let config = env.config();
        let snapshot = env.dispatcher.store().snapshot();

        let categories = category_order(&snapshot, config);
        let plan: Vec<(EntityId, Vec<EntityId>)> = categories
            .iter()
            .map(|category| (*category, item_order(&snapshot, config, *category)))
            .collect();

        let mut to_render: Vec<(EntityComponent, Vec<EntityId>)> = Vec::new();
        let render_container;
        {
            let mut state = lock(&self.inner.state);
            if state.lifecycle == Lifecycle::Removed {
                return Err(ComponentError::Removed {
                    kind: ComponentKind::Container,
                    id: None,
                }
                .into());
            }

            let previous_children: HashMap<EntityId, Vec<EntityId>> =
                state.order.iter().cloned().collect();
            let previous_parent: HashMap<EntityId, EntityId> = state
                .order
                .iter()
                .flat_map(|(category, items)| items.iter().map(move |item| (*item, *category)))
                .collect();
            let live_categories: HashSet<EntityId> = categories.iter().copied().collect();
            let live_items: HashSet<EntityId> = plan
                .iter()
                .flat_map(|(_, items)| items.iter().copied())
                .collect();

            state.categories.retain(|id, component| {
                let keep = live_categories.contains(id);
                if !keep {
                    component.remove();
                }
                keep
            });
            state.items.retain(|id, component| {
                let keep = live_items.contains(id);
                if !keep {
                    component.remove();
                }
                keep
            });

            for (category, items) in &plan {
                let existing = state.categories.get(category).cloned();
                let (component, created) = match existing {
                    Some(existing) => (existing, false),
                    None => {
                        let component =
                            EntityComponent::new(env.clone(), ComponentKind::Category, *category);
                        state.categories.insert(*category, component.clone());
                        (component, true)
                    }
                };
                let children_changed = previous_children.get(category) != Some(items);
                if component.take_structural() || created || children_changed {
                    to_render.push((component, items.clone()));
                }

                for item in items {
                    let existing = state.items.get(item).cloned();
                    let (component, created) = match existing {
                        Some(existing) => (existing, false),
                        None => {
                            let component =
                                EntityComponent::new(env.clone(), ComponentKind::Item, *item);
                            state.items.insert(*item, component.clone());
                            (component, true)
                        }
                    };
                    let reparented = previous_parent.get(item) != Some(category);
                    if component.take_structural() || created || reparented {
                        to_render.push((component, Vec::new()));
                    }
                }
            }

            let previous_categories: Vec<EntityId> = state.order.iter().map(|(c, _)| *c).collect();
            render_container = state.lifecycle == Lifecycle::Uninitialized
                || previous_categories != categories;
            state.order = plan;
            state.dirty = false;
        }

        tracing::debug!(components = to_render.len(), "Flushing component tree");
        for (component, children) in &to_render {
            component.render(children).await?;
        }

        if render_container {
            let rendered = env
                .dispatcher
                .services()
                .templates
                .render(&config.templates.container, &json!({ "categories": categories }))
                .await?;
            let mut state = lock(&self.inner.state);
            if state.lifecycle != Lifecycle::Removed {
                state.fragment = Fragment {
                    html: rendered.html,
                    js: rendered.js,
                    fields: Default::default(),
                    hidden: false,
                    children: categories,
                };
                state.lifecycle = Lifecycle::Rendered;
            }
        }

        self.inner.apply_visibility();
        Ok(())
    }

    pub fn lifecycle(&self) -> Lifecycle {
        lock(&self.inner.state).lifecycle
    }

    pub fn fragment(&self) -> Fragment {
        lock(&self.inner.state).fragment.clone()
    }

    /// Category ids in rendered order
    pub fn category_ids(&self) -> Vec<EntityId> {
        lock(&self.inner.state).order.iter().map(|(c, _)| *c).collect()
    }

    /// Item ids of `category` in rendered order
    pub fn item_ids(&self, category: EntityId) -> Vec<EntityId> {
        lock(&self.inner.state)
            .order
            .iter()
            .find(|(c, _)| *c == category)
            .map(|(_, items)| items.clone())
            .unwrap_or_default()
    }

    pub fn category(&self, id: EntityId) -> Option<EntityComponent> {
        lock(&self.inner.state).categories.get(&id).cloned()
    }

    pub fn item(&self, id: EntityId) -> Option<EntityComponent> {
        lock(&self.inner.state).items.get(&id).cloned()
    }

    /// Handle a container-level gesture (create category, select room/role)
    pub async fn handle(&self, gesture: Gesture) -> Result<bool> {
        if self.lifecycle() == Lifecycle::Removed {
            return Err(ComponentError::Removed {
                kind: ComponentKind::Container,
                id: None,
            }
            .into());
        }
        gesture::perform(&self.inner.env, ComponentKind::Container, None, gesture).await
    }

    /// Tear down the whole tree and unsubscribe every watcher. Idempotent.
    pub fn remove(&self) {
        let mut state = lock(&self.inner.state);
        if state.lifecycle == Lifecycle::Removed {
            return;
        }
        for (_, component) in state.items.drain() {
            component.remove();
        }
        for (_, component) in state.categories.drain() {
            component.remove();
        }
        for subscription in state.subscriptions.drain(..) {
            subscription.unsubscribe();
        }
        state.order.clear();
        state.lifecycle = Lifecycle::Removed;
        tracing::debug!("Removed component tree");
    }
}
