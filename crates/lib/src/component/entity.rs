//! Category and item components.

use std::sync::{Arc, Mutex, Weak};

use handle_trait::Handle;
use serde_json::{Value, json};

use super::{ComponentEnv, ComponentError, ComponentKind, Fragment, Gesture, Lifecycle, gesture};
use crate::{
    Result, lock,
    state::EntityId,
    watch::{ChangeEvent, Subscription},
};

struct EntityState {
    lifecycle: Lifecycle,
    fragment: Fragment,
    subscriptions: Vec<Subscription>,
    /// A structural field changed since the last render
    structural: bool,
    renders: usize,
    patches: usize,
}

struct EntityInner {
    kind: ComponentKind,
    id: EntityId,
    env: ComponentEnv,
    state: Mutex<EntityState>,
}

impl EntityInner {
    fn on_field_change(&self, event: &ChangeEvent) {
        let Some(field) = event.field_name() else {
            return;
        };
        let config = self.env.config();
        let mut state = lock(&self.state);
        if !state.lifecycle.is_live() {
            return;
        }
        if self.kind.is_structural(config, field) {
            state.structural = true;
            return;
        }
        let Some(spec) = self
            .kind
            .fields(config)
            .iter()
            .find(|spec| spec.display && spec.field == field)
        else {
            return;
        };

        let text = event
            .value
            .as_ref()
            .and_then(|value| (self.env.strategies.format_field)(spec, value));
        match text {
            Some(text) => state.fragment.fields.insert(field.to_owned(), text),
            None => state.fragment.fields.remove(field),
        };
        state.lifecycle = Lifecycle::Patched;
        state.patches += 1;
        tracing::trace!(kind = %self.kind, id = self.id, field, "Patched field in place");
    }
}

/// A category or item component. Cheap to clone; clones share state.
#[derive(Clone, Handle)]
pub struct EntityComponent {
    inner: Arc<EntityInner>,
}

impl std::fmt::Debug for EntityComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityComponent")
            .field("kind", &self.inner.kind)
            .field("id", &self.inner.id)
            .field("lifecycle", &self.lifecycle())
            .finish()
    }
}

impl EntityComponent {
    /// Create the component and subscribe it to field changes of its entity
    pub(crate) fn new(env: ComponentEnv, kind: ComponentKind, id: EntityId) -> Self {
        let collection = kind
            .collection(env.config())
            .unwrap_or_default()
            .to_owned();
        let bus = env.dispatcher.store().bus().clone();
        let inner = Arc::new(EntityInner {
            kind,
            id,
            env,
            state: Mutex::new(EntityState {
                lifecycle: Lifecycle::Uninitialized,
                fragment: Fragment::default(),
                subscriptions: Vec::new(),
                structural: false,
                renders: 0,
                patches: 0,
            }),
        });

        let weak: Weak<EntityInner> = Arc::downgrade(&inner);
        let subscription = bus.watch_matching(
            move |event| {
                event.id == Some(id)
                    && event.field_name().is_some()
                    && event.key.name() == Some(collection.as_str())
            },
            move |event| {
                if let Some(inner) = weak.upgrade() {
                    inner.on_field_change(event);
                }
            },
        );
        lock(&inner.state).subscriptions.push(subscription);
        Self { inner }
    }

    pub fn id(&self) -> EntityId {
        self.inner.id
    }

    pub fn kind(&self) -> ComponentKind {
        self.inner.kind
    }

    pub fn lifecycle(&self) -> Lifecycle {
        lock(&self.inner.state).lifecycle
    }

    pub fn fragment(&self) -> Fragment {
        lock(&self.inner.state).fragment.clone()
    }

    pub fn is_hidden(&self) -> bool {
        lock(&self.inner.state).fragment.hidden
    }

    /// Number of full renders so far
    pub fn renders(&self) -> usize {
        lock(&self.inner.state).renders
    }

    /// Number of in-place field patches so far
    pub fn patches(&self) -> usize {
        lock(&self.inner.state).patches
    }

    fn removed_error(&self) -> crate::Error {
        ComponentError::Removed {
            kind: self.inner.kind,
            id: Some(self.inner.id),
        }
        .into()
    }

    /// Render the entity's template with its current record.
    pub async fn render(&self, children: &[EntityId]) -> Result<()> {
        if self.lifecycle() == Lifecycle::Removed {
            return Err(self.removed_error());
        }
        let env = &self.inner.env;
        let config = env.config();
        let kind = self.inner.kind;
        let id = self.inner.id;

        let record = kind
            .collection(config)
            .and_then(|collection| env.dispatcher.store().record(collection, id))
            .ok_or(ComponentError::EntityMissing { kind, id })?;

        let mut context = record.to_value();
        if let Value::Object(map) = &mut context {
            map.insert("children".to_owned(), json!(children));
        }
        let rendered = env
            .dispatcher
            .services()
            .templates
            .render(kind.template(config), &context)
            .await?;
        let fields = env.strategies.display_fields(kind, config, &record);

        let mut state = lock(&self.inner.state);
        if state.lifecycle == Lifecycle::Removed {
            return Ok(());
        }
        let hidden = state.fragment.hidden;
        state.fragment = Fragment {
            html: rendered.html,
            js: rendered.js,
            fields,
            hidden,
            children: children.to_vec(),
        };
        state.lifecycle = Lifecycle::Rendered;
        state.structural = false;
        state.renders += 1;
        tracing::trace!(%kind, id, "Rendered component");
        Ok(())
    }

    /// Translate a user gesture into a mutation. Returns whether it took effect.
    pub async fn handle(&self, gesture: Gesture) -> Result<bool> {
        if self.lifecycle() == Lifecycle::Removed {
            return Err(self.removed_error());
        }
        gesture::perform(&self.inner.env, self.inner.kind, Some(self.inner.id), gesture).await
    }

    /// Tear down: unsubscribe every watcher. Idempotent.
    pub fn remove(&self) {
        let mut state = lock(&self.inner.state);
        if state.lifecycle == Lifecycle::Removed {
            return;
        }
        for subscription in state.subscriptions.drain(..) {
            subscription.unsubscribe();
        }
        state.lifecycle = Lifecycle::Removed;
        tracing::trace!(kind = %self.inner.kind, id = self.inner.id, "Removed component");
    }

    pub(crate) fn set_hidden(&self, hidden: bool) {
        lock(&self.inner.state).fragment.hidden = hidden;
    }

    /// Whether a structural change is pending; clears the flag
    pub(crate) fn take_structural(&self) -> bool {
        std::mem::take(&mut lock(&self.inner.state).structural)
    }
}
