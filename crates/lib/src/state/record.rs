//! Untyped entity records and the insertion-ordered collections holding them.

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use serde_json::{Map, Value};

use super::{EntityId, StateError};

/// One entity in a collection: an integer `id` plus arbitrary named fields.
///
/// The id is kept outside the field map so it can never be changed through
/// [`Record::set`]; field-level change detection therefore never reports `id`.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    id: EntityId,
    fields: Map<String, Value>,
}

impl Record {
    /// Create an empty record with the given id
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            fields: Map::new(),
        }
    }

    /// Build a record from a JSON value, which must be an object with an integer `id`
    pub fn from_value(value: Value) -> Result<Self, StateError> {
        match value {
            Value::Object(map) => Self::from_map(map),
            other => Err(StateError::NotAnObject {
                actual: json_type_name(&other).to_owned(),
            }),
        }
    }

    /// Build a record from a JSON object.
    ///
    /// Numeric strings are accepted for `id` since web services frequently
    /// return ids as strings.
    pub fn from_map(mut map: Map<String, Value>) -> Result<Self, StateError> {
        let id = map
            .remove("id")
            .as_ref()
            .and_then(value_as_i64)
            .ok_or(StateError::MissingId)?;
        Ok(Self { id, fields: map })
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Get a field value. `id` is not a field, use [`Record::id`].
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Get a field as an integer, accepting numeric strings
    pub fn get_i64(&self, field: &str) -> Option<i64> {
        self.fields.get(field).and_then(value_as_i64)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }

    /// Get a field as a flag: `true`/`false`, `0`/`1` or `"0"`/`"1"`
    pub fn get_bool(&self, field: &str) -> Option<bool> {
        match self.fields.get(field)? {
            Value::Bool(b) => Some(*b),
            other => value_as_i64(other).map(|n| n != 0),
        }
    }

    /// Set a field, returning the previous value.
    ///
    /// Writing `id` is ignored; an entity keeps its id for its whole life.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let field = field.into();
        if field == "id" {
            tracing::warn!(id = self.id, "Ignoring attempt to overwrite a record id");
            return None;
        }
        self.fields.insert(field, value.into())
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.remove(field)
    }

    /// Iterate over the fields (excluding `id`) in name order
    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    /// Copy every field of `other` into this record, leaving fields it does not name untouched
    pub fn merge(&mut self, other: &Map<String, Value>) {
        for (field, value) in other {
            if field != "id" {
                self.fields.insert(field.clone(), value.clone());
            }
        }
    }

    /// Replace all fields with the fields of `other`
    pub fn overwrite(&mut self, other: &Map<String, Value>) {
        self.fields.clear();
        self.merge(other);
    }

    /// The record as a JSON object including its `id`
    pub fn to_value(&self) -> Value {
        let mut map = Map::with_capacity(self.fields.len() + 1);
        map.insert("id".to_owned(), Value::from(self.id));
        for (field, value) in &self.fields {
            map.insert(field.clone(), value.clone());
        }
        Value::Object(map)
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = Map::<String, Value>::deserialize(deserializer)?;
        Record::from_map(map).map_err(de::Error::custom)
    }
}

/// A keyed set of records that iterates in insertion order.
///
/// Display order is never the iteration order; use [`Collection::sorted_by`]
/// with the ordering field (normally `sortorder`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Collection {
    order: Vec<EntityId>,
    records: HashMap<EntityId, Record>,
}

impl Collection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record. A replaced record keeps its insertion position.
    pub fn insert(&mut self, record: Record) -> Option<Record> {
        let id = record.id();
        let previous = self.records.insert(id, record);
        if previous.is_none() {
            self.order.push(id);
        }
        previous
    }

    pub fn get(&self, id: EntityId) -> Option<&Record> {
        self.records.get(&id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Record> {
        self.records.get_mut(&id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.records.contains_key(&id)
    }

    pub fn remove(&mut self, id: EntityId) -> Option<Record> {
        let removed = self.records.remove(&id)?;
        self.order.retain(|existing| *existing != id);
        Some(removed)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Ids in insertion order
    pub fn ids(&self) -> &[EntityId] {
        &self.order
    }

    /// Records in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.order.iter().filter_map(|id| self.records.get(id))
    }

    /// Records ordered by an integer field, ties broken by id.
    /// Records without the field sort last.
    pub fn sorted_by(&self, field: &str) -> Vec<&Record> {
        let mut records: Vec<&Record> = self.iter().collect();
        records.sort_by_key(|record| (record.get_i64(field).unwrap_or(i64::MAX), record.id()));
        records
    }

    /// Records whose `field` equals `value`, ordered by `order_field`
    pub fn filter_by(&self, field: &str, value: EntityId, order_field: &str) -> Vec<&Record> {
        self.sorted_by(order_field)
            .into_iter()
            .filter(|record| record.get_i64(field) == Some(value))
            .collect()
    }
}

impl Serialize for Collection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

impl<'de> Deserialize<'de> for Collection {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let records = Vec::<Record>::deserialize(deserializer)?;
        let mut collection = Collection::new();
        for record in records {
            let id = record.id();
            if collection.insert(record).is_some() {
                return Err(de::Error::custom(format!("duplicate record id {id}")));
            }
        }
        Ok(collection)
    }
}

/// Read an integer out of a JSON number or numeric string
pub(crate) fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
