//! Change detection between two state snapshots.
//!
//! Event order is fixed so that watcher behaviour is reproducible:
//! collections by name, and within a collection deleted, then created, then
//! updated entities (each followed by its field events), ids ascending; then
//! scalars by name; `state:updated` last.

use std::collections::BTreeSet;

use serde_json::Value;

use crate::{
    state::{Collection, EntityId, Record, State},
    watch::{ChangeEvent, ChangeKind, EventKey},
};

pub(crate) fn diff(before: &State, after: &State) -> Vec<ChangeEvent> {
    let mut events = Vec::new();

    let names: BTreeSet<&String> = before
        .collections()
        .keys()
        .chain(after.collections().keys())
        .collect();
    for name in names {
        diff_collection(
            name,
            before.collection(name),
            after.collection(name),
            &mut events,
        );
    }

    let scalar_names: BTreeSet<&String> = before
        .scalars()
        .keys()
        .chain(after.scalars().keys())
        .collect();
    for name in scalar_names {
        diff_scalar(name, before.scalar(name), after.scalar(name), &mut events);
    }

    if !events.is_empty() {
        events.push(ChangeEvent::state_updated());
    }
    events
}

fn sorted_ids(collection: Option<&Collection>) -> BTreeSet<EntityId> {
    collection
        .map(|c| c.ids().iter().copied().collect())
        .unwrap_or_default()
}

fn diff_collection(
    name: &str,
    before: Option<&Collection>,
    after: Option<&Collection>,
    events: &mut Vec<ChangeEvent>,
) {
    let before_ids = sorted_ids(before);
    let after_ids = sorted_ids(after);

    for id in before_ids.difference(&after_ids) {
        if let Some(record) = before.and_then(|c| c.get(*id)) {
            events.push(ChangeEvent::entity(name, ChangeKind::Deleted, record));
        }
    }
    for id in after_ids.difference(&before_ids) {
        if let Some(record) = after.and_then(|c| c.get(*id)) {
            events.push(ChangeEvent::entity(name, ChangeKind::Created, record));
        }
    }
    for id in before_ids.intersection(&after_ids) {
        let old = before.and_then(|c| c.get(*id));
        let new = after.and_then(|c| c.get(*id));
        if let (Some(old), Some(new)) = (old, new) {
            if old != new {
                events.push(ChangeEvent::entity(name, ChangeKind::Updated, new));
                diff_fields(name, old, new, events);
            }
        }
    }
}

fn diff_fields(name: &str, old: &Record, new: &Record, events: &mut Vec<ChangeEvent>) {
    let fields: BTreeSet<&String> = old
        .fields()
        .map(|(f, _)| f)
        .chain(new.fields().map(|(f, _)| f))
        .collect();
    for field in fields {
        let previous = old.get(field);
        if previous != new.get(field) {
            events.push(ChangeEvent::field(name, field, new, previous));
        }
    }
}

fn diff_scalar(
    name: &str,
    before: Option<&Value>,
    after: Option<&Value>,
    events: &mut Vec<ChangeEvent>,
) {
    if before == after {
        return;
    }
    let kind = match (before, after) {
        (None, _) => ChangeKind::Created,
        (_, None) => ChangeKind::Deleted,
        _ => ChangeKind::Updated,
    };
    events.push(ChangeEvent::scalar(
        EventKey::named(name, kind),
        after,
        before,
    ));

    // Object scalars (e.g. the active filters) also report each changed key
    if let (Some(Value::Object(old)), Some(Value::Object(new))) = (before, after) {
        let keys: BTreeSet<&String> = old.keys().chain(new.keys()).collect();
        for key in keys {
            if old.get(key) != new.get(key) {
                events.push(ChangeEvent::scalar(
                    EventKey::field(name, key.as_str()),
                    new.get(key),
                    old.get(key),
                ));
            }
        }
    }
}
