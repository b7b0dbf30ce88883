//! Update records: server-described state changes applied in one write.
//!
//! Modal forms and some web services answer with a list of
//! `{name, action, fields}` records describing what changed on the server.
//! Records whose `fields` carry an `id` target an entity in the collection
//! `name`; records without one target the scalar `name`.
//!
//! Deleting a category removes its items with it, as every other delete path
//! does.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::StoreError;
use crate::{
    config::FeatureConfig,
    state::{Record, State, record::value_as_i64},
};

/// What an update record does to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateAction {
    /// Add a new entity (replaces an existing one with the same id)
    Create,
    /// Create or merge into an existing entity
    Put,
    /// Merge into an existing entity; skipped if the entity is gone
    Update,
    /// Replace every field of an entity, creating it if needed
    Override,
    /// Remove an entity or scalar
    Delete,
}

/// One server-described change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateRecord {
    /// Collection or scalar name
    pub name: String,
    pub action: UpdateAction,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl UpdateRecord {
    pub fn new(name: impl Into<String>, action: UpdateAction, fields: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            action,
            fields,
        }
    }

    fn entity_id(&self) -> Option<i64> {
        self.fields.get("id").and_then(value_as_i64)
    }

    /// Apply this record to a state under an open write section.
    ///
    /// Returns `false` if the record referenced an entity that no longer exists
    /// and was skipped.
    pub(crate) fn apply(
        &self,
        state: &mut State,
        config: &FeatureConfig,
    ) -> Result<bool, StoreError> {
        if self.name.is_empty() {
            return Err(StoreError::InvalidUpdate {
                name: self.name.clone(),
                reason: "empty target name".to_owned(),
            });
        }

        let Some(id) = self.entity_id() else {
            return Ok(self.apply_scalar(state));
        };

        if self.action == UpdateAction::Delete && self.name == config.categories {
            return Ok(self.delete_category(state, config, id));
        }

        let collection = state.collection_mut(&self.name);
        match self.action {
            UpdateAction::Create => {
                let record = Record::from_map(self.fields.clone()).map_err(|e| {
                    StoreError::InvalidUpdate {
                        name: self.name.clone(),
                        reason: e.to_string(),
                    }
                })?;
                collection.insert(record);
            }
            UpdateAction::Put => match collection.get_mut(id) {
                Some(record) => record.merge(&self.fields),
                None => {
                    let mut record = Record::new(id);
                    record.merge(&self.fields);
                    collection.insert(record);
                }
            },
            UpdateAction::Override => {
                let mut record = Record::new(id);
                record.overwrite(&self.fields);
                collection.insert(record);
            }
            UpdateAction::Update => match collection.get_mut(id) {
                Some(record) => record.merge(&self.fields),
                None => {
                    tracing::warn!(name = %self.name, id, "Skipping update of missing record");
                    return Ok(false);
                }
            },
            UpdateAction::Delete => {
                if collection.remove(id).is_none() {
                    tracing::warn!(name = %self.name, id, "Skipping delete of missing record");
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    fn delete_category(&self, state: &mut State, config: &FeatureConfig, id: i64) -> bool {
        let removed = state.cascade_delete(
            &config.categories,
            &config.items,
            &config.foreign_key,
            config.item_list_field(),
            id,
        );
        match removed {
            Some((_, children)) => {
                tracing::debug!(id, items = children.len(), "Cascaded category delete");
                true
            }
            None => {
                tracing::warn!(name = %self.name, id, "Skipping delete of missing record");
                false
            }
        }
    }

    fn apply_scalar(&self, state: &mut State) -> bool {
        match self.action {
            UpdateAction::Delete => state.remove_scalar(&self.name).is_some(),
            UpdateAction::Update | UpdateAction::Put => {
                let mut merged = match state.scalar(&self.name) {
                    Some(Value::Object(existing)) => existing.clone(),
                    _ => Map::new(),
                };
                for (key, value) in &self.fields {
                    merged.insert(key.clone(), value.clone());
                }
                state.set_scalar(self.name.clone(), Value::Object(merged));
                true
            }
            UpdateAction::Create | UpdateAction::Override => {
                state.set_scalar(self.name.clone(), Value::Object(self.fields.clone()));
                true
            }
        }
    }
}
