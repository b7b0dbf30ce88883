//! Reordering of categories and items.
//!
//! [`move_after`] is the pure list operation every drag-and-drop ends in.
//! [`apply_reorder`] applies a [`ReorderRequest`] to a state inside a write
//! section: it renumbers `sortorder` fields or rewrites the parent's ordered
//! id list, depending on the feature's [`OrderingSource`], and moves the entity
//! to a new parent when the drop crossed scopes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

mod drag;

pub use drag::{DRAG_THRESHOLD_PX, DragSession, DropTarget};

use crate::{
    config::{FeatureConfig, OrderingSource},
    constants::SORTORDER,
    state::{EntityId, State, id_list},
};

/// Move `id_to_move` so that it immediately follows `target_id`.
///
/// An id that is not yet in the list is appended first. If the target is not
/// in the list (or is the moved id itself) the move is dropped and the list is
/// returned as it stands after that append.
///
/// ```
/// use bookit::reorder::move_after;
///
/// assert_eq!(move_after(&[1, 2, 3, 4], 1, 3), vec![2, 3, 1, 4]);
/// assert_eq!(move_after(&[1, 2, 3], 2, 99), vec![1, 2, 3]);
/// assert_eq!(move_after(&[1, 2, 3], 5, 99), vec![1, 2, 3, 5]);
/// ```
pub fn move_after(list: &[EntityId], id_to_move: EntityId, target_id: EntityId) -> Vec<EntityId> {
    let mut order = list.to_vec();
    if !order.contains(&id_to_move) {
        order.push(id_to_move);
    }
    if id_to_move == target_id || !order.contains(&target_id) {
        return order;
    }

    order.retain(|id| *id != id_to_move);
    let Some(position) = order.iter().position(|id| *id == target_id) else {
        return order;
    };
    order.insert(position + 1, id_to_move);
    order
}

/// Which level of the hierarchy a reorder applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReorderScope {
    Categories,
    Items,
}

/// A drop: place `id` after `target_id`, optionally under a new parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReorderRequest {
    pub id: EntityId,
    /// Sibling to follow; `None` appends at the end of the destination
    #[serde(rename = "targetid", default)]
    pub target_id: Option<EntityId>,
    /// Destination category for items; defaults to the target's category
    #[serde(rename = "targetparentid", default)]
    pub target_parent_id: Option<EntityId>,
}

impl ReorderRequest {
    pub fn new(id: EntityId, target_id: EntityId) -> Self {
        Self {
            id,
            target_id: Some(target_id),
            target_parent_id: None,
        }
    }

    pub fn into_parent(mut self, parent: EntityId) -> Self {
        self.target_parent_id = Some(parent);
        self
    }
}

/// A reorder that changed the state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Move {
    /// New sibling order of the destination scope
    pub order: Vec<EntityId>,
    /// Destination parent, for item moves
    pub parent: Option<EntityId>,
    /// Parent the item left, if the move crossed scopes
    pub previous_parent: Option<EntityId>,
}

/// Result of [`apply_reorder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReorderOutcome {
    Moved(Move),
    /// The drop left everything where it was
    Unchanged,
    /// The entity to move is not in the state
    MissingEntity,
    /// The destination parent is not in the state
    MissingParent(EntityId),
}

impl ReorderOutcome {
    pub fn is_moved(&self) -> bool {
        matches!(self, ReorderOutcome::Moved(_))
    }
}

fn place(list: &[EntityId], id: EntityId, target: Option<EntityId>) -> Vec<EntityId> {
    match target {
        Some(target) => move_after(list, id, target),
        None => {
            let mut order = list.to_vec();
            if !order.contains(&id) {
                order.push(id);
            }
            order
        }
    }
}

/// Current order of the categories
pub fn category_order(state: &State, config: &FeatureConfig) -> Vec<EntityId> {
    state
        .collection(&config.categories)
        .map(|c| c.sorted_by(SORTORDER).into_iter().map(|r| r.id()).collect())
        .unwrap_or_default()
}

/// Current order of the items in category `parent`
pub fn item_order(state: &State, config: &FeatureConfig, parent: EntityId) -> Vec<EntityId> {
    match &config.item_ordering {
        OrderingSource::SortOrder => state
            .children(&config.items, &config.foreign_key, parent)
            .into_iter()
            .map(|r| r.id())
            .collect(),
        OrderingSource::ParentList { field } => {
            let Some(category) = state.record(&config.categories, parent) else {
                return Vec::new();
            };
            let mut order: Vec<EntityId> = id_list(category, field)
                .into_iter()
                .filter(|id| {
                    state
                        .record(&config.items, *id)
                        .is_some_and(|r| r.get_i64(&config.foreign_key) == Some(parent))
                })
                .collect();
            // Items missing from the list keep their sortorder position at the end
            for child in state.children(&config.items, &config.foreign_key, parent) {
                if !order.contains(&child.id()) {
                    order.push(child.id());
                }
            }
            order
        }
    }
}

fn renumber(state: &mut State, collection: &str, order: &[EntityId]) {
    let collection = state.collection_mut(collection);
    for (position, id) in order.iter().enumerate() {
        if let Some(record) = collection.get_mut(*id) {
            let position = position as i64;
            if record.get_i64(SORTORDER) != Some(position) {
                record.set(SORTORDER, position);
            }
        }
    }
}

fn write_item_order(
    state: &mut State,
    config: &FeatureConfig,
    parent: EntityId,
    order: &[EntityId],
) {
    match &config.item_ordering {
        OrderingSource::SortOrder => renumber(state, &config.items, order),
        OrderingSource::ParentList { field } => {
            if let Some(category) = state.record_mut(&config.categories, parent) {
                let list = Value::Array(order.iter().map(|id| Value::from(*id)).collect());
                if category.get(field) != Some(&list) {
                    category.set(field.clone(), list);
                }
            }
        }
    }
}

/// Apply a reorder to `state`.
///
/// Every field change (sortorder, ordered list, foreign key) happens on the
/// given state, so callers holding a write guard publish them together.
pub fn apply_reorder(
    state: &mut State,
    config: &FeatureConfig,
    scope: ReorderScope,
    request: &ReorderRequest,
) -> ReorderOutcome {
    match scope {
        ReorderScope::Categories => reorder_categories(state, config, request),
        ReorderScope::Items => reorder_items(state, config, request),
    }
}

fn reorder_categories(
    state: &mut State,
    config: &FeatureConfig,
    request: &ReorderRequest,
) -> ReorderOutcome {
    if state.record(&config.categories, request.id).is_none() {
        return ReorderOutcome::MissingEntity;
    }
    let current = category_order(state, config);
    let order = place(&current, request.id, request.target_id);
    if order == current {
        return ReorderOutcome::Unchanged;
    }
    renumber(state, &config.categories, &order);
    ReorderOutcome::Moved(Move {
        order,
        parent: None,
        previous_parent: None,
    })
}

fn reorder_items(
    state: &mut State,
    config: &FeatureConfig,
    request: &ReorderRequest,
) -> ReorderOutcome {
    let fk = config.foreign_key.as_str();
    let Some(item) = state.record(&config.items, request.id) else {
        return ReorderOutcome::MissingEntity;
    };
    let current_parent = item.get_i64(fk);

    let target_parent = request
        .target_id
        .and_then(|target| state.record(&config.items, target))
        .and_then(|target| target.get_i64(fk));
    let Some(parent) = request.target_parent_id.or(target_parent).or(current_parent) else {
        return ReorderOutcome::MissingEntity;
    };
    if state.record(&config.categories, parent).is_none() {
        return ReorderOutcome::MissingParent(parent);
    }

    let current = item_order(state, config, parent);
    let order = place(&current, request.id, request.target_id);
    let crosses = current_parent != Some(parent);
    if !crosses && order == current {
        return ReorderOutcome::Unchanged;
    }

    if crosses {
        if let Some(item) = state.record_mut(&config.items, request.id) {
            item.set(fk, parent);
        }
        if let Some(previous) = current_parent {
            let remaining: Vec<EntityId> = item_order(state, config, previous)
                .into_iter()
                .filter(|id| *id != request.id)
                .collect();
            write_item_order(state, config, previous, &remaining);
        }
    }
    write_item_order(state, config, parent, &order);

    ReorderOutcome::Moved(Move {
        order,
        parent: Some(parent),
        previous_parent: if crosses { current_parent } else { None },
    })
}
