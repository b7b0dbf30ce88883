//! Change events and the keys watchers subscribe with.
//!
//! Keys use the string forms of the reactive UI layer:
//!
//! | key                      | meaning                                       |
//! |--------------------------|-----------------------------------------------|
//! | `state:updated`          | any committed change                          |
//! | `items`                  | any created/updated/deleted event of `items`  |
//! | `items:created`          | an entity was added to `items`                |
//! | `items.amount:updated`   | the `amount` field of an item changed         |
//! | `activeFilters:updated`  | a scalar changed                              |

use std::{fmt, str::FromStr};

use serde_json::Value;

use super::WatchError;
use crate::{
    constants::STATE_UPDATED,
    state::{EntityId, Record},
};

/// What happened to an entity or scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Created => "created",
            ChangeKind::Updated => "updated",
            ChangeKind::Deleted => "deleted",
        }
    }
}

impl FromStr for ChangeKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(ChangeKind::Created),
            "updated" => Ok(ChangeKind::Updated),
            "deleted" => Ok(ChangeKind::Deleted),
            _ => Err(()),
        }
    }
}

/// A watch key, or the concrete key of a fired event.
///
/// Fired events only ever carry `StateUpdated`, `Named` or `Field`; `Any` is a
/// subscription-side wildcard.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKey {
    /// `state:updated`
    StateUpdated,
    /// `<name>`: every created/updated/deleted event of a collection or scalar
    Any(String),
    /// `<name>:<kind>`
    Named { name: String, kind: ChangeKind },
    /// `<name>.<field>:updated`
    Field { name: String, field: String },
}

impl EventKey {
    pub fn named(name: impl Into<String>, kind: ChangeKind) -> Self {
        EventKey::Named {
            name: name.into(),
            kind,
        }
    }

    pub fn field(name: impl Into<String>, field: impl Into<String>) -> Self {
        EventKey::Field {
            name: name.into(),
            field: field.into(),
        }
    }

    /// Collection or scalar name this key refers to (`None` for `state:updated`)
    pub fn name(&self) -> Option<&str> {
        match self {
            EventKey::StateUpdated => None,
            EventKey::Any(name) | EventKey::Named { name, .. } | EventKey::Field { name, .. } => {
                Some(name)
            }
        }
    }

    /// Whether a watcher subscribed with `self` wants the event fired as `fired`
    pub fn matches(&self, fired: &EventKey) -> bool {
        match (self, fired) {
            (EventKey::Any(name), EventKey::Named { name: other, .. }) => name == other,
            (watch, fired) => watch == fired,
        }
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKey::StateUpdated => f.write_str(STATE_UPDATED),
            EventKey::Any(name) => f.write_str(name),
            EventKey::Named { name, kind } => write!(f, "{name}:{}", kind.as_str()),
            EventKey::Field { name, field } => write!(f, "{name}.{field}:updated"),
        }
    }
}

impl FromStr for EventKey {
    type Err = WatchError;

    fn from_str(key: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| WatchError::InvalidKey {
            key: key.to_owned(),
            reason: reason.to_owned(),
        };

        if key == STATE_UPDATED {
            return Ok(EventKey::StateUpdated);
        }

        let Some((target, kind)) = key.rsplit_once(':') else {
            if key.is_empty() || key.contains('.') {
                return Err(invalid("expected a collection name"));
            }
            return Ok(EventKey::Any(key.to_owned()));
        };

        let kind: ChangeKind = kind
            .parse()
            .map_err(|_| invalid("event must be created, updated or deleted"))?;

        match target.split_once('.') {
            Some((name, field)) => {
                if kind != ChangeKind::Updated {
                    return Err(invalid("field events only exist as ':updated'"));
                }
                if name.is_empty() || field.is_empty() {
                    return Err(invalid("empty collection or field name"));
                }
                Ok(EventKey::field(name, field))
            }
            None if target.is_empty() => Err(invalid("empty collection name")),
            None => Ok(EventKey::named(target, kind)),
        }
    }
}

/// One fired change notification.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    /// Concrete key of the event
    pub key: EventKey,
    /// Entity id for collection events
    pub id: Option<EntityId>,
    /// Post-mutation record (the removed record for `deleted` events)
    pub record: Option<Record>,
    /// New value: the changed field for field events, the scalar for scalar events
    pub value: Option<Value>,
    /// Value before the write, for field and scalar events
    pub previous: Option<Value>,
}

impl ChangeEvent {
    pub(crate) fn state_updated() -> Self {
        Self {
            key: EventKey::StateUpdated,
            id: None,
            record: None,
            value: None,
            previous: None,
        }
    }

    pub(crate) fn entity(name: &str, kind: ChangeKind, record: &Record) -> Self {
        Self {
            key: EventKey::named(name, kind),
            id: Some(record.id()),
            record: Some(record.clone()),
            value: None,
            previous: None,
        }
    }

    pub(crate) fn field(
        name: &str,
        field: &str,
        record: &Record,
        previous: Option<&Value>,
    ) -> Self {
        Self {
            key: EventKey::field(name, field),
            id: Some(record.id()),
            record: Some(record.clone()),
            value: record.get(field).cloned(),
            previous: previous.cloned(),
        }
    }

    pub(crate) fn scalar(
        key: EventKey,
        value: Option<&Value>,
        previous: Option<&Value>,
    ) -> Self {
        Self {
            key,
            id: None,
            record: None,
            value: value.cloned(),
            previous: previous.cloned(),
        }
    }

    /// Name of the changed field, for field events
    pub fn field_name(&self) -> Option<&str> {
        match &self.key {
            EventKey::Field { field, .. } => Some(field),
            _ => None,
        }
    }

    pub fn kind(&self) -> Option<ChangeKind> {
        match &self.key {
            EventKey::Named { kind, .. } => Some(*kind),
            EventKey::Field { .. } => Some(ChangeKind::Updated),
            _ => None,
        }
    }
}
