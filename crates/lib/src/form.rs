//! Modal form results.
//!
//! A submitted form answers with a list of update records
//! (`[{name, action, fields}]`). Older forms answer with a single
//! `{result, data, action}` object; that shape is still accepted, logged as
//! deprecated, and converted to the list form.

use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::{
    state::record::{json_type_name, value_as_i64},
    store::{UpdateAction, UpdateRecord},
};

/// Errors raised while interpreting a form result.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum FormError {
    /// The payload matches neither the list nor the legacy shape
    #[error(
        "Unrecognized form result: expected a list of updates or a result object, got {actual}"
    )]
    UnrecognizedPayload { actual: &'static str },

    /// One entry of an update list is malformed
    #[error("Invalid update record at index {index}: {reason}")]
    InvalidRecord { index: usize, reason: String },

    /// A legacy result object is malformed
    #[error("Invalid form result: {reason}")]
    InvalidLegacy { reason: String },

    /// The server reported that the form was not saved
    #[error("Form was not saved: {message}")]
    Rejected { message: String },
}

impl FormError {
    pub fn is_rejected(&self) -> bool {
        matches!(self, FormError::Rejected { .. })
    }
}

// Conversion from FormError to the main Error type
impl From<FormError> for crate::Error {
    fn from(err: FormError) -> Self {
        crate::Error::Form(err)
    }
}

/// The deprecated single-object result.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LegacyResult {
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// A parsed form result.
#[derive(Debug, Clone, PartialEq)]
pub enum FormSubmission {
    Updates(Vec<UpdateRecord>),
    Legacy(LegacyResult),
}

impl FormSubmission {
    pub fn parse(payload: Value) -> Result<Self, FormError> {
        let is_legacy = match &payload {
            Value::Object(map) => map.contains_key("data") || map.contains_key("result"),
            _ => false,
        };
        if is_legacy {
            tracing::warn!("Form answered with the deprecated single-object result");
            let legacy = serde_json::from_value(payload).map_err(|e| FormError::InvalidLegacy {
                reason: e.to_string(),
            })?;
            return Ok(FormSubmission::Legacy(legacy));
        }

        match payload {
            Value::Array(entries) => {
                let mut updates = Vec::with_capacity(entries.len());
                for (index, entry) in entries.into_iter().enumerate() {
                    let update =
                        serde_json::from_value(entry).map_err(|e| FormError::InvalidRecord {
                            index,
                            reason: e.to_string(),
                        })?;
                    updates.push(update);
                }
                Ok(FormSubmission::Updates(updates))
            }
            // Some forms hand back their JSON as a string
            Value::String(text) => match serde_json::from_str::<Value>(&text) {
                Ok(inner @ (Value::Array(_) | Value::Object(_))) => Self::parse(inner),
                _ => Err(FormError::UnrecognizedPayload { actual: "string" }),
            },
            other => Err(FormError::UnrecognizedPayload {
                actual: json_type_name(&other),
            }),
        }
    }

    /// Convert to update records. Legacy results target `default_collection`.
    pub fn into_updates(self, default_collection: &str) -> Result<Vec<UpdateRecord>, FormError> {
        let legacy = match self {
            FormSubmission::Updates(updates) => return Ok(updates),
            FormSubmission::Legacy(legacy) => legacy,
        };

        if matches!(legacy.result, Some(Value::Bool(false))) {
            return Err(FormError::Rejected {
                message: legacy.message.unwrap_or_else(|| "unknown reason".to_owned()),
            });
        }

        let data = match legacy.data {
            Value::String(text) => {
                serde_json::from_str(&text).map_err(|e| FormError::InvalidLegacy {
                    reason: format!("data is not JSON: {e}"),
                })?
            }
            other => other,
        };
        let fields: Map<String, Value> = match data {
            Value::Object(map) => map,
            other => {
                return Err(FormError::InvalidLegacy {
                    reason: format!("data must be an object, got {}", json_type_name(&other)),
                });
            }
        };
        if fields.get("id").and_then(value_as_i64).is_none() {
            return Err(FormError::InvalidLegacy {
                reason: "data carries no id".to_owned(),
            });
        }

        let action = match legacy.action.as_deref() {
            Some("delete") => UpdateAction::Delete,
            Some("create") => UpdateAction::Create,
            Some("update") => UpdateAction::Update,
            Some("override") => UpdateAction::Override,
            Some("put") | None => UpdateAction::Put,
            Some(other) => {
                return Err(FormError::InvalidLegacy {
                    reason: format!("unknown action '{other}'"),
                });
            }
        };
        Ok(vec![UpdateRecord::new(default_collection, action, fields)])
    }
}
