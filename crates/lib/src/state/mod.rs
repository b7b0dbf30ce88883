//! The state model held by a [`Store`](crate::Store).
//!
//! A [`State`] is a set of named [`Collection`]s (categories, items, checklist
//! entries) plus named scalar values (active filters, the selected room or
//! role). Collections hold untyped [`Record`]s so that change detection can
//! report individual fields; the [`Entity`] trait provides typed access.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::FeatureConfig;

mod entity;
mod errors;
pub(crate) mod record;

pub use entity::{Category, ChecklistCategory, ChecklistItem, Entity, Item};
pub use errors::StateError;
pub use record::{Collection, Record};

/// Server-assigned integer id of an entity.
pub type EntityId = i64;

/// The full client-side state of one page/view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct State {
    #[serde(default)]
    collections: BTreeMap<String, Collection>,
    #[serde(default)]
    scalars: BTreeMap<String, Value>,
}

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn collection(&self, name: &str) -> Option<&Collection> {
        self.collections.get(name)
    }

    /// Mutable access to a collection, creating it empty if needed
    pub fn collection_mut(&mut self, name: &str) -> &mut Collection {
        self.collections.entry(name.to_owned()).or_default()
    }

    pub fn collection_names(&self) -> impl Iterator<Item = &str> {
        self.collections.keys().map(String::as_str)
    }

    pub(crate) fn collections(&self) -> &BTreeMap<String, Collection> {
        &self.collections
    }

    pub fn scalar(&self, name: &str) -> Option<&Value> {
        self.scalars.get(name)
    }

    pub fn set_scalar(
        &mut self,
        name: impl Into<String>,
        value: impl Into<Value>,
    ) -> Option<Value> {
        self.scalars.insert(name.into(), value.into())
    }

    pub fn remove_scalar(&mut self, name: &str) -> Option<Value> {
        self.scalars.remove(name)
    }

    pub(crate) fn scalars(&self) -> &BTreeMap<String, Value> {
        &self.scalars
    }

    pub fn record(&self, collection: &str, id: EntityId) -> Option<&Record> {
        self.collections.get(collection)?.get(id)
    }

    pub fn record_mut(&mut self, collection: &str, id: EntityId) -> Option<&mut Record> {
        self.collections.get_mut(collection)?.get_mut(id)
    }

    /// Typed lookup in the entity's default collection
    pub fn entity<T: Entity>(&self, id: EntityId) -> Result<Option<T>, StateError> {
        self.entity_in(T::COLLECTION, id)
    }

    /// Typed lookup in an explicitly named collection
    pub fn entity_in<T: Entity>(
        &self,
        collection: &str,
        id: EntityId,
    ) -> Result<Option<T>, StateError> {
        self.record(collection, id).map(T::from_record).transpose()
    }

    /// All entities of a type in display (`sortorder`) order
    pub fn entities<T: Entity>(&self) -> Result<Vec<T>, StateError> {
        match self.collection(T::COLLECTION) {
            Some(collection) => collection
                .sorted_by(crate::constants::SORTORDER)
                .into_iter()
                .map(T::from_record)
                .collect(),
            None => Ok(Vec::new()),
        }
    }

    /// Insert or replace a typed entity in its default collection
    pub fn put_entity<T: Entity>(&mut self, entity: &T) -> Result<(), StateError> {
        let record = entity.to_record()?;
        self.collection_mut(T::COLLECTION).insert(record);
        Ok(())
    }

    /// Children of `parent_id` in `collection`, in `sortorder` order
    pub fn children(
        &self,
        collection: &str,
        foreign_key: &str,
        parent_id: EntityId,
    ) -> Vec<&Record> {
        match self.collection(collection) {
            Some(c) => c.filter_by(foreign_key, parent_id, crate::constants::SORTORDER),
            None => Vec::new(),
        }
    }

    /// Verify that every record in `child` points at an existing record in `parent`.
    pub fn check_references(
        &self,
        child: &str,
        foreign_key: &str,
        parent: &str,
    ) -> Result<(), StateError> {
        let Some(children) = self.collection(child) else {
            return Ok(());
        };
        for record in children.iter() {
            let parent_id = record.get_i64(foreign_key);
            let exists = parent_id.is_some_and(|pid| self.record(parent, pid).is_some());
            if !exists {
                return Err(StateError::DanglingReference {
                    collection: child.to_owned(),
                    id: record.id(),
                    field: foreign_key.to_owned(),
                    parent: parent_id.unwrap_or_default(),
                });
            }
        }
        Ok(())
    }

    /// Verify the invariants of a feature's state: every item references an
    /// existing category.
    pub fn check_integrity(&self, config: &FeatureConfig) -> Result<(), StateError> {
        self.check_references(&config.items, &config.foreign_key, &config.categories)
    }

    /// Remove a parent record and every child referencing it.
    ///
    /// Children are found through `foreign_key` and, when `list_field` is given,
    /// through the parent's own ordered id list as well. Returns the removed
    /// parent and children, or `None` if the parent does not exist.
    pub fn cascade_delete(
        &mut self,
        parent: &str,
        child: &str,
        foreign_key: &str,
        list_field: Option<&str>,
        parent_id: EntityId,
    ) -> Option<(Record, Vec<Record>)> {
        let removed_parent = self.collections.get_mut(parent)?.remove(parent_id)?;

        let mut doomed: Vec<EntityId> = self
            .collection(child)
            .map(|c| {
                c.iter()
                    .filter(|r| r.get_i64(foreign_key) == Some(parent_id))
                    .map(Record::id)
                    .collect()
            })
            .unwrap_or_default();
        if let Some(field) = list_field {
            for id in id_list(&removed_parent, field) {
                if !doomed.contains(&id) {
                    doomed.push(id);
                }
            }
        }

        let children = self.collection_mut(child);
        let removed_children = doomed.into_iter().filter_map(|id| children.remove(id)).collect();
        Some((removed_parent, removed_children))
    }
}

/// Read an ordered id list stored in a record field
pub fn id_list(record: &Record, field: &str) -> Vec<EntityId> {
    match record.get(field) {
        Some(Value::Array(values)) => values.iter().filter_map(record::value_as_i64).collect(),
        _ => Vec::new(),
    }
}
