//! Room/role visibility filter.
//!
//! Items can be restricted to rooms and roles. The active room and role are
//! scalars in the state; an item is visible when it passes both dimensions.
//! Each dimension is evaluated the same way: no selection, or an item
//! without restrictions for that dimension, passes.

use serde_json::Value;

use crate::{
    config::FilterFields,
    constants::{ACTIVE_FILTERS, ACTIVE_ROLE, ACTIVE_ROOM},
    state::{EntityId, Record, State, record::value_as_i64},
};

/// The currently selected room and role.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActiveFilters {
    pub room: Option<EntityId>,
    pub role: Option<EntityId>,
}

fn selection(value: Option<&Value>) -> Option<EntityId> {
    value.and_then(value_as_i64).filter(|id| *id > 0)
}

/// Ids an item is restricted to: a JSON list, a comma separated string or a single id
fn restriction(record: &Record, field: &str) -> Vec<EntityId> {
    match record.get(field) {
        Some(Value::Array(values)) => values.iter().filter_map(value_as_i64).collect(),
        Some(Value::String(text)) => text
            .split(',')
            .filter_map(|part| part.trim().parse().ok())
            .collect(),
        Some(value) => value_as_i64(value).into_iter().collect(),
        None => Vec::new(),
    }
}

fn passes(record: &Record, field: &str, selected: Option<EntityId>) -> bool {
    let Some(selected) = selected else {
        return true;
    };
    let allowed = restriction(record, field);
    allowed.is_empty() || allowed.contains(&selected)
}

impl ActiveFilters {
    /// Read the selection from the state. The dedicated scalars win over
    /// keys of the generic filter object.
    pub fn from_state(state: &State) -> Self {
        let filters = state.scalar(ACTIVE_FILTERS);
        let from_object = |key: &str| selection(filters.and_then(|f| f.get(key)));
        Self {
            room: selection(state.scalar(ACTIVE_ROOM)).or_else(|| from_object("room")),
            role: selection(state.scalar(ACTIVE_ROLE)).or_else(|| from_object("role")),
        }
    }

    pub fn is_active(&self) -> bool {
        self.room.is_some() || self.role.is_some()
    }

    pub fn is_visible(&self, record: &Record, fields: &FilterFields) -> bool {
        passes(record, &fields.room, self.room) && passes(record, &fields.role, self.role)
    }
}
