//! Built-in mutations shared by every feature.
//!
//! Creates, updates and deletes are pessimistic: the server is asked first and
//! the store only changes once it answered. Reorders are optimistic: the store
//! changes immediately and a server rejection becomes a
//! [`MutationError::ReconciliationFailed`], which makes the dispatcher reload.

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use super::{Mutation, MutationContext, MutationError, MutationRegistry};
use crate::{
    Result,
    config::FeatureConfig,
    constants::{ACTIVE_FILTERS, ACTIVE_ROLE, ACTIVE_ROOM},
    reorder::{ReorderOutcome, ReorderRequest, ReorderScope, apply_reorder},
    services::RemoteError,
    state::{EntityId, Record, State, record::value_as_i64},
    store::UpdateRecord,
};

/// Names of the built-in mutations.
pub mod names {
    pub const CREATE_CATEGORY: &str = "createCategory";
    pub const UPDATE_CATEGORY: &str = "updateCategory";
    pub const DELETE_CATEGORY: &str = "deleteCategory";
    pub const TOGGLE_CATEGORY_ACTIVE: &str = "toggleCategoryActive";
    pub const REORDER_CATEGORIES: &str = "reorderCategories";
    pub const CREATE_ITEM: &str = "createItem";
    pub const UPDATE_ITEM: &str = "updateItem";
    pub const DELETE_ITEM: &str = "deleteItem";
    pub const TOGGLE_ITEM_ACTIVE: &str = "toggleItemActive";
    pub const REORDER_ITEMS: &str = "reorderItems";
    pub const SET_ACTIVE_FILTER: &str = "setActiveFilter";
    pub const SET_ACTIVE_ROOM: &str = "setActiveRoom";
    pub const SET_ACTIVE_ROLE: &str = "setActiveRole";
    pub const PROCESS_UPDATES: &str = "processUpdates";
}

/// The built-in mutations for one feature
pub fn builtin(config: &FeatureConfig) -> MutationRegistry {
    tracing::debug!(feature = %config.name, "Registering built-in mutations");
    let mut registry = MutationRegistry::new();
    for level in [Level::Category, Level::Item] {
        registry.register(
            level.name(names::CREATE_CATEGORY, names::CREATE_ITEM),
            CreateEntity(level),
        );
        registry.register(
            level.name(names::UPDATE_CATEGORY, names::UPDATE_ITEM),
            UpdateEntity(level),
        );
        registry.register(
            level.name(names::DELETE_CATEGORY, names::DELETE_ITEM),
            DeleteEntity(level),
        );
        registry.register(
            level.name(names::TOGGLE_CATEGORY_ACTIVE, names::TOGGLE_ITEM_ACTIVE),
            ToggleActive(level),
        );
    }
    registry.register(names::REORDER_CATEGORIES, Reorder(ReorderScope::Categories));
    registry.register(names::REORDER_ITEMS, Reorder(ReorderScope::Items));
    registry.register(names::SET_ACTIVE_FILTER, SetActiveFilter);
    registry.register(names::SET_ACTIVE_ROOM, SetScalar(ACTIVE_ROOM));
    registry.register(names::SET_ACTIVE_ROLE, SetScalar(ACTIVE_ROLE));
    registry.register(names::PROCESS_UPDATES, ProcessUpdates);
    registry
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    Category,
    Item,
}

impl Level {
    fn name(self, category: &'static str, item: &'static str) -> &'static str {
        match self {
            Level::Category => category,
            Level::Item => item,
        }
    }

    fn collection(self, config: &FeatureConfig) -> &str {
        match self {
            Level::Category => &config.categories,
            Level::Item => &config.items,
        }
    }
}

fn invalid(mutation: &str, reason: impl Into<String>) -> crate::Error {
    MutationError::InvalidPayload {
        mutation: mutation.to_owned(),
        reason: reason.into(),
    }
    .into()
}

fn object(mutation: &str, payload: Value) -> Result<Map<String, Value>> {
    match payload {
        Value::Object(map) => Ok(map),
        other => Err(invalid(mutation, format!("expected an object, got {other}"))),
    }
}

fn required_id(mutation: &str, fields: &Map<String, Value>, field: &str) -> Result<EntityId> {
    fields
        .get(field)
        .and_then(value_as_i64)
        .ok_or_else(|| invalid(mutation, format!("missing integer '{field}'")))
}

/// Fields the server returned for a created or updated entity.
///
/// Services answer with the full record, with `{id}` only, or with the bare id.
fn response_fields(method: &str, response: Value) -> Result<Map<String, Value>> {
    match response {
        Value::Object(map) => Ok(map),
        Value::Number(_) => Ok(Map::from_iter([("id".to_owned(), response)])),
        Value::Null => Ok(Map::new()),
        other => Err(RemoteError::InvalidResponse {
            method: method.to_owned(),
            reason: format!("expected a record, got {other}"),
        }
        .into()),
    }
}

/// Append `id` to the ordered list of `parent`, for list-ordered features
fn append_to_parent_list(
    state: &mut State,
    config: &FeatureConfig,
    parent: EntityId,
    id: EntityId,
) {
    let Some(field) = config.item_list_field() else {
        return;
    };
    if let Some(category) = state.record_mut(&config.categories, parent) {
        let mut list = crate::state::id_list(category, field);
        if !list.contains(&id) {
            list.push(id);
            category.set(field, json!(list));
        }
    }
}

fn remove_from_parent_list(
    state: &mut State,
    config: &FeatureConfig,
    parent: EntityId,
    id: EntityId,
) {
    let Some(field) = config.item_list_field() else {
        return;
    };
    if let Some(category) = state.record_mut(&config.categories, parent) {
        let mut list = crate::state::id_list(category, field);
        if list.contains(&id) {
            list.retain(|other| *other != id);
            category.set(field, json!(list));
        }
    }
}

/// `createCategory` / `createItem`: payload is the new entity's fields
struct CreateEntity(Level);

#[async_trait]
impl Mutation for CreateEntity {
    async fn run(&self, ctx: &MutationContext, payload: Value) -> Result<()> {
        let level = self.0;
        let name = level.name(names::CREATE_CATEGORY, names::CREATE_ITEM);
        let config = &ctx.config;
        let collection = level.collection(config);
        let method = match level {
            Level::Category => &config.methods.create_category,
            Level::Item => &config.methods.create_item,
        };

        let fields = object(name, payload)?;
        let parent = match level {
            Level::Item => {
                let parent = required_id(name, &fields, &config.foreign_key)?;
                ctx.require(&config.categories, parent)?;
                Some(parent)
            }
            Level::Category => None,
        };

        let response = ctx
            .services
            .remote
            .call_one(method, Value::Object(fields.clone()))
            .await?;

        let mut record_fields = fields;
        for (key, value) in response_fields(method, response)? {
            record_fields.insert(key, value);
        }
        let record = Record::from_map(record_fields).map_err(|e| RemoteError::InvalidResponse {
            method: method.clone(),
            reason: e.to_string(),
        })?;
        let id = record.id();

        ctx.store.write(|state| {
            if let Some(parent) = parent {
                if state.record(&config.categories, parent).is_none() {
                    tracing::warn!(id, parent, "Parent category removed while creating item");
                    return Ok(());
                }
                append_to_parent_list(state, config, parent, id);
            }
            state.collection_mut(collection).insert(record);
            Ok(())
        })?;
        tracing::info!(collection, id, "Created entity");
        Ok(())
    }
}

/// Persist `fields` for entity `id` and apply them locally
async fn update_entity(
    ctx: &MutationContext,
    level: Level,
    mutation: &str,
    id: EntityId,
    mut fields: Map<String, Value>,
) -> Result<()> {
    let config = &ctx.config;
    let collection = level.collection(config);
    let method = match level {
        Level::Category => &config.methods.update_category,
        Level::Item => &config.methods.update_item,
    };

    ctx.require(collection, id)?;
    let new_parent = match level {
        Level::Item => match fields.get(&config.foreign_key) {
            Some(value) => {
                let parent = value_as_i64(value).ok_or_else(|| {
                    invalid(mutation, format!("'{}' must be an integer", config.foreign_key))
                })?;
                ctx.require(&config.categories, parent)?;
                Some(parent)
            }
            None => None,
        },
        Level::Category => None,
    };

    fields.insert("id".to_owned(), json!(id));
    let response = ctx
        .services
        .remote
        .call_one(method, Value::Object(fields.clone()))
        .await?;
    for (key, value) in response_fields(method, response)? {
        fields.insert(key, value);
    }
    fields.remove("id");

    ctx.store.write(|state| {
        let Some(current) = state.record(collection, id) else {
            tracing::warn!(collection, id, "Entity removed while updating");
            return Ok(());
        };
        let old_parent = current.get_i64(&config.foreign_key);

        if let Some(parent) = new_parent {
            if state.record(&config.categories, parent).is_none() {
                tracing::warn!(id, parent, "Target category removed while updating");
                return Ok(());
            }
            if old_parent != Some(parent) {
                if let Some(old) = old_parent {
                    remove_from_parent_list(state, config, old, id);
                }
                append_to_parent_list(state, config, parent, id);
            }
        }
        if let Some(record) = state.record_mut(collection, id) {
            record.merge(&fields);
        }
        Ok(())
    })
}

/// `updateCategory` / `updateItem`: payload is `{id, ...changed fields}`
struct UpdateEntity(Level);

#[async_trait]
impl Mutation for UpdateEntity {
    async fn run(&self, ctx: &MutationContext, payload: Value) -> Result<()> {
        let name = self.0.name(names::UPDATE_CATEGORY, names::UPDATE_ITEM);
        let mut fields = object(name, payload)?;
        let id = required_id(name, &fields, "id")?;
        fields.remove("id");
        update_entity(ctx, self.0, name, id, fields).await
    }
}

/// `toggleCategoryActive` / `toggleItemActive`: payload is `{id}`
struct ToggleActive(Level);

#[async_trait]
impl Mutation for ToggleActive {
    async fn run(&self, ctx: &MutationContext, payload: Value) -> Result<()> {
        let name = self.0.name(names::TOGGLE_CATEGORY_ACTIVE, names::TOGGLE_ITEM_ACTIVE);
        let fields = object(name, payload)?;
        let id = required_id(name, &fields, "id")?;
        let record = ctx.require(self.0.collection(&ctx.config), id)?;
        let active = record.get_bool("active").unwrap_or(true);
        let fields = Map::from_iter([("active".to_owned(), json!(u8::from(!active)))]);
        update_entity(ctx, self.0, name, id, fields).await
    }
}

/// `deleteCategory` / `deleteItem`: payload is `{id}`. Deleting a category
/// removes its items in the same write.
struct DeleteEntity(Level);

#[async_trait]
impl Mutation for DeleteEntity {
    async fn run(&self, ctx: &MutationContext, payload: Value) -> Result<()> {
        let level = self.0;
        let name = level.name(names::DELETE_CATEGORY, names::DELETE_ITEM);
        let config = &ctx.config;
        let collection = level.collection(config);
        let method = match level {
            Level::Category => &config.methods.delete_category,
            Level::Item => &config.methods.delete_item,
        };

        let fields = object(name, payload)?;
        let id = required_id(name, &fields, "id")?;
        ctx.require(collection, id)?;

        ctx.services.remote.call_one(method, json!({"id": id})).await?;

        ctx.store.write(|state| {
            match level {
                Level::Category => {
                    let removed = state.cascade_delete(
                        &config.categories,
                        &config.items,
                        &config.foreign_key,
                        config.item_list_field(),
                        id,
                    );
                    match removed {
                        Some((_, children)) => {
                            tracing::info!(id, items = children.len(), "Deleted category")
                        }
                        None => tracing::warn!(id, "Category already gone"),
                    }
                }
                Level::Item => {
                    let removed = state.collection_mut(collection).remove(id);
                    let parent = removed.as_ref().and_then(|r| r.get_i64(&config.foreign_key));
                    if let Some(parent) = parent {
                        remove_from_parent_list(state, config, parent, id);
                    }
                    tracing::info!(id, "Deleted item");
                }
            }
            Ok(())
        })
    }
}

/// `reorderCategories` / `reorderItems`: payload is a [`ReorderRequest`]
struct Reorder(ReorderScope);

#[async_trait]
impl Mutation for Reorder {
    async fn run(&self, ctx: &MutationContext, payload: Value) -> Result<()> {
        let scope = self.0;
        let config = &ctx.config;
        let (name, method, collection) = match scope {
            ReorderScope::Categories => (
                names::REORDER_CATEGORIES,
                &config.methods.reorder_categories,
                &config.categories,
            ),
            ReorderScope::Items => (
                names::REORDER_ITEMS,
                &config.methods.reorder_items,
                &config.items,
            ),
        };
        let request: ReorderRequest =
            serde_json::from_value(payload).map_err(|e| invalid(name, e.to_string()))?;

        let outcome = ctx
            .store
            .write(|state| Ok(apply_reorder(state, config, scope, &request)))?;

        let moved = match outcome {
            ReorderOutcome::Moved(moved) => moved,
            ReorderOutcome::Unchanged => return Ok(()),
            ReorderOutcome::MissingEntity => {
                return Err(MutationError::StaleReference {
                    collection: collection.clone(),
                    id: request.id,
                }
                .into());
            }
            ReorderOutcome::MissingParent(parent) => {
                return Err(MutationError::StaleReference {
                    collection: config.categories.clone(),
                    id: parent,
                }
                .into());
            }
        };

        let args = json!({
            "id": request.id,
            "targetid": request.target_id,
            "targetparentid": moved.parent,
            "order": moved.order,
        });
        if let Err(err) = ctx.services.remote.call_one(method, args).await {
            return Err(MutationError::ReconciliationFailed {
                mutation: name.to_owned(),
                reason: err.to_string(),
            }
            .into());
        }
        Ok(())
    }
}

/// `setActiveRoom` / `setActiveRole`: payload is the selected id, or null/0 for all
struct SetScalar(&'static str);

#[async_trait]
impl Mutation for SetScalar {
    async fn run(&self, ctx: &MutationContext, payload: Value) -> Result<()> {
        let value = match payload {
            Value::Object(mut map) => map.remove("value").unwrap_or(Value::Null),
            other => other,
        };
        ctx.store.write(|state| {
            state.set_scalar(self.0, value);
            Ok(())
        })
    }
}

/// `setActiveFilter`: payload is `{name, value}`, stored in the filter object
struct SetActiveFilter;

#[async_trait]
impl Mutation for SetActiveFilter {
    async fn run(&self, ctx: &MutationContext, payload: Value) -> Result<()> {
        let mut fields = object(names::SET_ACTIVE_FILTER, payload)?;
        let Some(Value::String(filter)) = fields.remove("name") else {
            return Err(invalid(names::SET_ACTIVE_FILTER, "missing string 'name'"));
        };
        let value = fields.remove("value").unwrap_or(Value::Null);
        ctx.store.write(|state| {
            let mut filters = match state.scalar(ACTIVE_FILTERS) {
                Some(Value::Object(existing)) => existing.clone(),
                _ => Map::new(),
            };
            filters.insert(filter, value);
            state.set_scalar(ACTIVE_FILTERS, Value::Object(filters));
            Ok(())
        })
    }
}

/// `processUpdates`: payload is a list of update records already persisted
/// by the server (e.g. through a modal form)
struct ProcessUpdates;

#[async_trait]
impl Mutation for ProcessUpdates {
    async fn run(&self, ctx: &MutationContext, payload: Value) -> Result<()> {
        let updates: Vec<UpdateRecord> = serde_json::from_value(payload)
            .map_err(|e| invalid(names::PROCESS_UPDATES, e.to_string()))?;
        let changes = ctx.store.process_updates(&ctx.config, &updates)?;
        tracing::debug!(updates = updates.len(), events = changes.len(), "Processed updates");
        Ok(())
    }
}
