//! Initial state from server-rendered markup.
//!
//! The page renders one row per category and item, carrying the entity's
//! fields as `data-*` attributes. A [`Snapshot`] is those attribute maps in
//! document order, plus any scalar values the page embeds. [`load_state`]
//! turns a snapshot into a [`State`], rejecting missing or malformed
//! attributes instead of guessing.

use std::{collections::BTreeMap, path::Path};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

mod errors;

pub use errors::BootstrapError;

use crate::{
    Result,
    config::{FeatureConfig, FieldKind, FieldSpec, OrderingSource},
    constants::SORTORDER,
    state::{EntityId, Record, State, id_list},
};

/// `data-*` attributes of one row
pub type RowAttributes = BTreeMap<String, String>;

/// Attribute naming the kind of row
pub const REGION_ATTRIBUTE: &str = "data-region";

/// Rows and scalars as rendered by the server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub rows: Vec<RowAttributes>,
    #[serde(default)]
    pub scalars: BTreeMap<String, Value>,
}

impl Snapshot {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Region {
    Category,
    Item,
}

fn parse_value(
    row: usize,
    attribute: &str,
    raw: &str,
    kind: FieldKind,
) -> std::result::Result<Value, BootstrapError> {
    let invalid = |expected| BootstrapError::InvalidAttribute {
        row,
        attribute: attribute.to_owned(),
        value: raw.to_owned(),
        expected,
    };
    let text = raw.trim();
    match kind {
        FieldKind::Text => Ok(Value::String(raw.to_owned())),
        FieldKind::Int => text
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| invalid("an integer")),
        FieldKind::Flag => match text {
            "1" | "true" => Ok(Value::from(1)),
            "0" | "false" | "" => Ok(Value::from(0)),
            _ => Err(invalid("0 or 1")),
        },
        FieldKind::IdList => {
            let mut ids = Vec::new();
            for part in text.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                let id: i64 = part.parse().map_err(|_| invalid("comma separated integers"))?;
                ids.push(Value::from(id));
            }
            Ok(Value::Array(ids))
        }
    }
}

fn parse_row(
    row: usize,
    attributes: &RowAttributes,
    id_attribute: &str,
    specs: &[FieldSpec],
) -> std::result::Result<Record, BootstrapError> {
    let missing = |attribute: &str| BootstrapError::MissingAttribute {
        row,
        attribute: attribute.to_owned(),
    };

    let raw_id = attributes.get(id_attribute).ok_or_else(|| missing(id_attribute))?;
    let id = match parse_value(row, id_attribute, raw_id, FieldKind::Int)? {
        Value::Number(n) => n.as_i64(),
        _ => None,
    };
    let Some(id) = id else {
        return Err(missing(id_attribute));
    };

    let mut fields = Map::new();
    for spec in specs {
        match attributes.get(&spec.attribute) {
            Some(raw) => {
                let value = parse_value(row, &spec.attribute, raw, spec.kind)?;
                fields.insert(spec.field.clone(), value);
            }
            None if spec.required => return Err(missing(&spec.attribute)),
            None => {}
        }
    }

    let mut record = Record::new(id);
    record.merge(&fields);
    Ok(record)
}

/// Build the initial state for `config` from `snapshot`.
pub fn load_state(config: &FeatureConfig, snapshot: &Snapshot) -> Result<State> {
    let mut state = State::new();
    let mut category_count: i64 = 0;
    let mut item_counts: BTreeMap<EntityId, i64> = BTreeMap::new();

    // Both collections exist even when empty
    state.collection_mut(&config.categories);
    state.collection_mut(&config.items);

    for (row, attributes) in snapshot.rows.iter().enumerate() {
        let region = match attributes.get(REGION_ATTRIBUTE).map(String::as_str) {
            Some("category") => Region::Category,
            Some("item") => Region::Item,
            Some(other) => {
                return Err(BootstrapError::UnknownRegion {
                    row,
                    region: other.to_owned(),
                }
                .into());
            }
            None => {
                return Err(BootstrapError::MissingAttribute {
                    row,
                    attribute: REGION_ATTRIBUTE.to_owned(),
                }
                .into());
            }
        };

        let (collection, mut record) = match region {
            Region::Category => (
                &config.categories,
                parse_row(
                    row,
                    attributes,
                    config.category_attribute_id(),
                    &config.category_fields,
                )?,
            ),
            Region::Item => (
                &config.items,
                parse_row(row, attributes, config.item_attribute_id(), &config.item_fields)?,
            ),
        };

        // Rows without an explicit sortorder keep their document position
        if record.get(SORTORDER).is_none() {
            let position = match region {
                Region::Category => category_count,
                Region::Item => {
                    let parent = record.get_i64(&config.foreign_key).unwrap_or_default();
                    item_counts.get(&parent).copied().unwrap_or_default()
                }
            };
            record.set(SORTORDER, position);
        }
        match region {
            Region::Category => category_count += 1,
            Region::Item => {
                let parent = record.get_i64(&config.foreign_key).unwrap_or_default();
                *item_counts.entry(parent).or_default() += 1;
            }
        }

        let id = record.id();
        if state.collection_mut(collection).insert(record).is_some() {
            return Err(BootstrapError::DuplicateId {
                collection: collection.clone(),
                id,
            }
            .into());
        }
    }

    if let Some(items) = state.collection(&config.items) {
        for item in items.iter() {
            let categoryid = item.get_i64(&config.foreign_key).unwrap_or_default();
            if state.record(&config.categories, categoryid).is_none() {
                return Err(BootstrapError::OrphanItem {
                    id: item.id(),
                    categoryid,
                }
                .into());
            }
        }
    }

    if let OrderingSource::ParentList { field } = &config.item_ordering {
        complete_parent_lists(&mut state, config, field);
    }

    for (name, value) in &snapshot.scalars {
        state.set_scalar(name.clone(), value.clone());
    }

    tracing::info!(
        feature = %config.name,
        categories = state.collection(&config.categories).map_or(0, |c| c.len()),
        items = state.collection(&config.items).map_or(0, |c| c.len()),
        "Loaded initial state"
    );
    Ok(state)
}

/// Make each category's ordered list name exactly its items: ids of other
/// categories' items are dropped, unlisted children are appended by sortorder.
fn complete_parent_lists(state: &mut State, config: &FeatureConfig, field: &str) {
    let category_ids: Vec<EntityId> = state
        .collection(&config.categories)
        .map(|c| c.ids().to_vec())
        .unwrap_or_default();

    for category_id in category_ids {
        let children: Vec<EntityId> = state
            .children(&config.items, &config.foreign_key, category_id)
            .into_iter()
            .map(Record::id)
            .collect();
        let Some(category) = state.record_mut(&config.categories, category_id) else {
            continue;
        };
        let mut list: Vec<EntityId> = id_list(category, field)
            .into_iter()
            .filter(|id| children.contains(id))
            .collect();
        for child in children {
            if !list.contains(&child) {
                list.push(child);
            }
        }
        category.set(field, Value::from(list));
    }
}
