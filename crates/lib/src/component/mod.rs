//! The component tree.
//!
//! One generic implementation serves every feature: a [`Container`] holds
//! category components, each holding item components, all parameterised by
//! the [`FeatureConfig`] and a set of [`Strategies`].
//!
//! Components subscribe to the store's watcher bus when they are created and
//! unsubscribe when removed. A field change patches the owning component's
//! fragment in place; structural changes (created, deleted, reparented or
//! reordered entities) mark the container dirty, and [`Container::flush`]
//! rebuilds and re-renders only the affected parts. User gestures become
//! mutation dispatches; components never write to the store.

use std::collections::BTreeMap;

use chrono::DateTime;
use serde_json::Value;

mod container;
mod entity;
mod errors;
mod gesture;

pub use container::Container;
pub use entity::EntityComponent;
pub use errors::ComponentError;
pub use gesture::Gesture;

use crate::{
    config::{FeatureConfig, FieldKind, FieldSpec},
    constants::SORTORDER,
    mutation::Dispatcher,
    state::{EntityId, Record},
};

/// Level of a component in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    Container,
    Category,
    Item,
}

impl std::fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ComponentKind::Container => "container",
            ComponentKind::Category => "category",
            ComponentKind::Item => "item",
        })
    }
}

impl ComponentKind {
    pub(crate) fn collection(self, config: &FeatureConfig) -> Option<&str> {
        match self {
            ComponentKind::Container => None,
            ComponentKind::Category => Some(&config.categories),
            ComponentKind::Item => Some(&config.items),
        }
    }

    pub(crate) fn template(self, config: &FeatureConfig) -> &str {
        match self {
            ComponentKind::Container => &config.templates.container,
            ComponentKind::Category => &config.templates.category,
            ComponentKind::Item => &config.templates.item,
        }
    }

    pub(crate) fn fields(self, config: &FeatureConfig) -> &[FieldSpec] {
        match self {
            ComponentKind::Container => &[],
            ComponentKind::Category => &config.category_fields,
            ComponentKind::Item => &config.item_fields,
        }
    }

    /// Fields whose change moves the entity in the tree rather than changing its content
    pub(crate) fn is_structural(self, config: &FeatureConfig, field: &str) -> bool {
        if field == SORTORDER {
            return true;
        }
        match self {
            ComponentKind::Item => field == config.foreign_key,
            ComponentKind::Category => config.item_list_field() == Some(field),
            ComponentKind::Container => false,
        }
    }
}

/// Lifecycle of a component: `Uninitialized → Rendered → Patched* → Removed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Uninitialized,
    Rendered,
    Patched,
    Removed,
}

impl Lifecycle {
    pub fn is_live(self) -> bool {
        matches!(self, Lifecycle::Rendered | Lifecycle::Patched)
    }
}

/// Rendered output of one component.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fragment {
    pub html: String,
    pub js: String,
    /// Display text of each displayed field, patched in place on change
    pub fields: BTreeMap<String, String>,
    pub hidden: bool,
    /// Child entity ids in display order
    pub children: Vec<EntityId>,
}

/// Turns a field value into its display text; `None` hides the field.
pub type FieldFormatter = fn(&FieldSpec, &Value) -> Option<String>;

/// Feature-specific behaviour plugged into the generic components.
#[derive(Debug, Clone, Copy)]
pub struct Strategies {
    pub format_field: FieldFormatter,
}

impl Default for Strategies {
    fn default() -> Self {
        Self {
            format_field: format_plain,
        }
    }
}

impl Strategies {
    /// Checklist items show their due date as a calendar date
    pub fn checklist() -> Self {
        Self {
            format_field: format_with_dates,
        }
    }

    /// Strategies for a preset feature name
    pub fn for_feature(config: &FeatureConfig) -> Self {
        match config.name.as_str() {
            "checklist" => Self::checklist(),
            _ => Self::default(),
        }
    }

    pub(crate) fn display_fields(
        &self,
        kind: ComponentKind,
        config: &FeatureConfig,
        record: &Record,
    ) -> BTreeMap<String, String> {
        kind.fields(config)
            .iter()
            .filter(|spec| spec.display)
            .filter_map(|spec| {
                let value = record.get(&spec.field)?;
                Some((spec.field.clone(), (self.format_field)(spec, value)?))
            })
            .collect()
    }
}

/// Default formatter: text as is, numbers and flags as digits, id lists comma separated
pub fn format_plain(spec: &FieldSpec, value: &Value) -> Option<String> {
    match (spec.kind, value) {
        (_, Value::Null) => None,
        (_, Value::String(text)) => Some(text.clone()),
        (FieldKind::IdList, Value::Array(ids)) => Some(
            ids.iter()
                .map(|id| id.to_string())
                .collect::<Vec<_>>()
                .join(","),
        ),
        (FieldKind::Flag, Value::Bool(flag)) => Some(u8::from(*flag).to_string()),
        (_, other) => Some(other.to_string()),
    }
}

fn format_with_dates(spec: &FieldSpec, value: &Value) -> Option<String> {
    if spec.field == "duedate" {
        let seconds = value.as_i64()?;
        if seconds <= 0 {
            return None;
        }
        return DateTime::from_timestamp(seconds, 0).map(|date| date.format("%Y-%m-%d").to_string());
    }
    format_plain(spec, value)
}

/// What every component needs: the dispatcher (and through it the store,
/// services and configuration) plus the feature's strategies.
#[derive(Debug, Clone)]
pub struct ComponentEnv {
    pub dispatcher: Dispatcher,
    pub strategies: Strategies,
}

impl ComponentEnv {
    pub fn new(dispatcher: Dispatcher) -> Self {
        let strategies = Strategies::for_feature(dispatcher.config());
        Self {
            dispatcher,
            strategies,
        }
    }

    pub fn config(&self) -> &FeatureConfig {
        self.dispatcher.config()
    }
}
