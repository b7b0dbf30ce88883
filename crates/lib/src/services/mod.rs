//! Host services the reactive core talks to.
//!
//! The store and mutation layers never reach the server, the template engine,
//! modal forms or notification UI directly. They go through the traits here,
//! bundled in [`Services`], so that a page wires in real implementations and
//! tests wire in the fakes from `bookit::testing`.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

mod errors;
#[cfg(feature = "http")]
mod http;

pub use errors::RemoteError;
#[cfg(feature = "http")]
pub use http::{HttpRemote, RemoteConfig};

use crate::{Result, state::State};

/// One web service call in a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRequest {
    pub methodname: String,
    pub args: Value,
}

impl RemoteRequest {
    pub fn new(methodname: impl Into<String>, args: Value) -> Self {
        Self {
            methodname: methodname.into(),
            args,
        }
    }
}

/// Batched server calls. Responses come back in request order.
#[async_trait]
pub trait RemoteService: Send + Sync {
    async fn call(&self, requests: Vec<RemoteRequest>) -> Result<Vec<Value>>;

    /// Convenience for a batch of one
    async fn call_one(&self, methodname: &str, args: Value) -> Result<Value> {
        let mut responses = self.call(vec![RemoteRequest::new(methodname, args)]).await?;
        if responses.is_empty() {
            return Err(RemoteError::MissingResponse {
                expected: 1,
                actual: 0,
            }
            .into());
        }
        Ok(responses.swap_remove(0))
    }
}

/// Rendered template output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rendered {
    pub html: String,
    pub js: String,
}

#[async_trait]
pub trait TemplateRenderer: Send + Sync {
    async fn render(&self, template: &str, context: &Value) -> Result<Rendered>;
}

/// A modal form to open.
#[derive(Debug, Clone, PartialEq)]
pub struct FormRequest {
    pub form_class: String,
    pub args: Value,
    pub title: String,
}

/// Modal form host. Returns the submitted payload, or `None` if the user
/// cancelled.
#[async_trait]
pub trait ModalForms: Send + Sync {
    async fn open(&self, request: FormRequest) -> Result<Option<Value>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub message: String,
    pub kind: NotificationKind,
}

/// A confirmation dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub title: String,
    pub message: String,
    pub confirm_label: String,
}

/// User-visible feedback.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn add_notification(&self, notification: Notification);

    /// Report a failed operation to the user
    async fn exception(&self, error: &crate::Error);

    /// Ask the user to confirm; `true` if they did
    async fn confirm(&self, confirmation: Confirmation) -> bool;
}

/// Localised strings.
#[async_trait]
pub trait StringSource: Send + Sync {
    async fn get_string(&self, key: &str, component: &str) -> Result<String>;
}

/// Source of the authoritative state, used to reload after a failed
/// optimistic update.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn fetch(&self) -> Result<State>;
}

/// The collaborators one page is wired with.
#[derive(Clone)]
pub struct Services {
    pub remote: Arc<dyn RemoteService>,
    pub templates: Arc<dyn TemplateRenderer>,
    pub forms: Arc<dyn ModalForms>,
    pub notifier: Arc<dyn Notifier>,
    pub strings: Arc<dyn StringSource>,
    pub snapshots: Arc<dyn SnapshotSource>,
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services").finish_non_exhaustive()
    }
}
