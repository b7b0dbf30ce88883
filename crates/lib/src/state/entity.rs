//! Typed views over records.
//!
//! The store itself is untyped so that change detection can work field by
//! field; these types give mutation handlers and components a checked view of
//! the records they care about.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use super::{EntityId, Record, StateError};
use crate::constants::{CATEGORIES, CHECKLIST_CATEGORIES, CHECKLIST_ITEMS, ITEMS};

/// A typed entity stored in a named collection.
pub trait Entity: Serialize + DeserializeOwned {
    /// Default collection name for this entity type
    const COLLECTION: &'static str;

    fn id(&self) -> EntityId;

    /// Convert into an untyped record
    fn to_record(&self) -> Result<Record, StateError> {
        let value = serde_json::to_value(self).map_err(|e| StateError::EntityMismatch {
            collection: Self::COLLECTION.to_owned(),
            id: self.id(),
            reason: e.to_string(),
        })?;
        Record::from_value(value)
    }

    /// Convert from an untyped record
    fn from_record(record: &Record) -> Result<Self, StateError> {
        serde_json::from_value(record.to_value()).map_err(|e| StateError::EntityMismatch {
            collection: Self::COLLECTION.to_owned(),
            id: record.id(),
            reason: e.to_string(),
        })
    }
}

/// A resource category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, with = "int_flex")]
    pub sortorder: i64,
    #[serde(default = "default_true", with = "flag")]
    pub active: bool,
}

impl Entity for Category {
    const COLLECTION: &'static str = CATEGORIES;

    fn id(&self) -> EntityId {
        self.id
    }
}

/// A bookable resource, owned by a [`Category`] through `categoryid`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(with = "int_flex")]
    pub categoryid: EntityId,
    #[serde(default, with = "int_flex")]
    pub sortorder: i64,
    #[serde(default = "default_true", with = "flag")]
    pub active: bool,
    #[serde(default, with = "int_flex")]
    pub amount: i64,
    #[serde(default, with = "flag")]
    pub amountirrelevant: bool,
}

impl Entity for Item {
    const COLLECTION: &'static str = ITEMS;

    fn id(&self) -> EntityId {
        self.id
    }
}

/// A checklist category. Its `items` list is the ordering source of truth for
/// the checklist items it contains.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChecklistCategory {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, with = "int_flex")]
    pub sortorder: i64,
    #[serde(default)]
    pub items: Vec<EntityId>,
}

impl Entity for ChecklistCategory {
    const COLLECTION: &'static str = CHECKLIST_CATEGORIES;

    fn id(&self) -> EntityId {
        self.id
    }
}

/// A checklist entry, optionally bound to a resource and a due date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(with = "int_flex")]
    pub categoryid: EntityId,
    #[serde(default, with = "int_flex")]
    pub sortorder: i64,
    #[serde(default)]
    pub resourceid: Option<EntityId>,
    /// Unix timestamp in seconds
    #[serde(default)]
    pub duedate: Option<i64>,
    #[serde(default)]
    pub duedatetype: Option<String>,
}

impl ChecklistItem {
    pub fn due_date(&self) -> Option<DateTime<Utc>> {
        self.duedate.and_then(|secs| DateTime::from_timestamp(secs, 0))
    }
}

impl Entity for ChecklistItem {
    const COLLECTION: &'static str = CHECKLIST_ITEMS;

    fn id(&self) -> EntityId {
        self.id
    }
}

fn default_true() -> bool {
    true
}

/// Integers that may arrive as numbers or numeric strings.
mod int_flex {
    use serde::{Deserialize, Deserializer, Serializer, de};
    use serde_json::Value;

    pub fn serialize<S: Serializer>(value: &i64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(*value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        let value = Value::deserialize(deserializer)?;
        crate::state::record::value_as_i64(&value)
            .ok_or_else(|| de::Error::custom(format!("expected an integer, found {value}")))
    }
}

/// Flags stored as `0`/`1`, accepting booleans and numeric strings on input.
mod flag {
    use serde::{Deserialize, Deserializer, Serializer, de};
    use serde_json::Value;

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(u8::from(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Bool(b) => Ok(b),
            other => crate::state::record::value_as_i64(&other)
                .map(|n| n != 0)
                .ok_or_else(|| de::Error::custom(format!("expected a flag, found {other}"))),
        }
    }
}
