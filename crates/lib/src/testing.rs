//! In-memory fakes of the host services, for tests and offline tools.

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::{
    Result, lock,
    services::{
        Confirmation, FormRequest, ModalForms, Notification, Notifier, RemoteError, RemoteRequest,
        RemoteService, Rendered, Services, SnapshotSource, StringSource, TemplateRenderer,
    },
    state::State,
};

/// Scripted answer for one method.
#[derive(Debug, Clone)]
enum Reply {
    Data(Value),
    Fail(String),
}

/// A [`RemoteService`] answering from per-method scripts.
///
/// Unscripted methods answer `null`.
#[derive(Debug, Default)]
pub struct ScriptedRemote {
    replies: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<Vec<RemoteRequest>>,
}

impl ScriptedRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful answer for the next call of `method`
    pub fn respond(&self, method: &str, data: Value) {
        lock(&self.replies)
            .entry(method.to_owned())
            .or_default()
            .push_back(Reply::Data(data));
    }

    /// Queue a server exception for the next call of `method`
    pub fn fail(&self, method: &str, message: &str) {
        lock(&self.replies)
            .entry(method.to_owned())
            .or_default()
            .push_back(Reply::Fail(message.to_owned()));
    }

    /// Every request received so far
    pub fn calls(&self) -> Vec<RemoteRequest> {
        lock(&self.calls).clone()
    }

    pub fn calls_to(&self, method: &str) -> Vec<RemoteRequest> {
        lock(&self.calls)
            .iter()
            .filter(|r| r.methodname == method)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl RemoteService for ScriptedRemote {
    async fn call(&self, requests: Vec<RemoteRequest>) -> Result<Vec<Value>> {
        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            lock(&self.calls).push(request.clone());
            let reply = lock(&self.replies)
                .get_mut(&request.methodname)
                .and_then(VecDeque::pop_front);
            match reply {
                Some(Reply::Data(data)) => results.push(data),
                Some(Reply::Fail(message)) => {
                    return Err(RemoteError::Server {
                        method: request.methodname,
                        errorcode: None,
                        message,
                    }
                    .into());
                }
                None => results.push(Value::Null),
            }
        }
        Ok(results)
    }
}

/// A [`Notifier`] that records everything and answers confirmations with a
/// preset value.
#[derive(Debug)]
pub struct RecordingNotifier {
    notifications: Mutex<Vec<Notification>>,
    exceptions: Mutex<Vec<String>>,
    confirmations: Mutex<Vec<Confirmation>>,
    answer: Mutex<bool>,
}

impl Default for RecordingNotifier {
    fn default() -> Self {
        Self {
            notifications: Mutex::default(),
            exceptions: Mutex::default(),
            confirmations: Mutex::default(),
            answer: Mutex::new(true),
        }
    }
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer future confirmations with `answer`
    pub fn answer_confirmations(&self, answer: bool) {
        *lock(&self.answer) = answer;
    }

    pub fn notifications(&self) -> Vec<Notification> {
        lock(&self.notifications).clone()
    }

    /// Messages of the reported exceptions
    pub fn exceptions(&self) -> Vec<String> {
        lock(&self.exceptions).clone()
    }

    pub fn confirmations(&self) -> Vec<Confirmation> {
        lock(&self.confirmations).clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn add_notification(&self, notification: Notification) {
        lock(&self.notifications).push(notification);
    }

    async fn exception(&self, error: &crate::Error) {
        lock(&self.exceptions).push(error.to_string());
    }

    async fn confirm(&self, confirmation: Confirmation) -> bool {
        lock(&self.confirmations).push(confirmation);
        *lock(&self.answer)
    }
}

/// A [`TemplateRenderer`] producing `<template>{context}</template>`.
#[derive(Debug, Default)]
pub struct StaticTemplates {
    renders: Mutex<Vec<String>>,
}

impl StaticTemplates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of the templates rendered so far, in order
    pub fn renders(&self) -> Vec<String> {
        lock(&self.renders).clone()
    }

    pub fn render_count(&self, template: &str) -> usize {
        lock(&self.renders).iter().filter(|t| *t == template).count()
    }
}

#[async_trait]
impl TemplateRenderer for StaticTemplates {
    async fn render(&self, template: &str, context: &Value) -> Result<Rendered> {
        lock(&self.renders).push(template.to_owned());
        Ok(Rendered {
            html: format!("<{template}>{context}</{template}>"),
            js: String::new(),
        })
    }
}

/// A [`StringSource`] answering `[key,component]` unless overridden.
#[derive(Debug, Default)]
pub struct StaticStrings {
    strings: Mutex<HashMap<String, String>>,
}

impl StaticStrings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: &str, value: &str) {
        lock(&self.strings).insert(key.to_owned(), value.to_owned());
    }
}

#[async_trait]
impl StringSource for StaticStrings {
    async fn get_string(&self, key: &str, component: &str) -> Result<String> {
        Ok(lock(&self.strings)
            .get(key)
            .cloned()
            .unwrap_or_else(|| format!("[{key},{component}]")))
    }
}

/// A [`ModalForms`] host submitting queued payloads; cancels when the queue is empty.
#[derive(Debug, Default)]
pub struct ScriptedForms {
    submissions: Mutex<VecDeque<Option<Value>>>,
    opened: Mutex<Vec<FormRequest>>,
}

impl ScriptedForms {
    pub fn new() -> Self {
        Self::default()
    }

    /// Submit `payload` when the next form opens
    pub fn submit(&self, payload: Value) {
        lock(&self.submissions).push_back(Some(payload));
    }

    /// Cancel the next form
    pub fn cancel(&self) {
        lock(&self.submissions).push_back(None);
    }

    pub fn opened(&self) -> Vec<FormRequest> {
        lock(&self.opened).clone()
    }
}

#[async_trait]
impl ModalForms for ScriptedForms {
    async fn open(&self, request: FormRequest) -> Result<Option<Value>> {
        lock(&self.opened).push(request);
        Ok(lock(&self.submissions).pop_front().flatten())
    }
}

/// A [`SnapshotSource`] serving a settable state.
#[derive(Debug, Default)]
pub struct StaticSnapshotSource {
    state: Mutex<State>,
    fetches: Mutex<usize>,
}

impl StaticSnapshotSource {
    pub fn new(state: State) -> Self {
        Self {
            state: Mutex::new(state),
            fetches: Mutex::new(0),
        }
    }

    pub fn set(&self, state: State) {
        *lock(&self.state) = state;
    }

    pub fn fetches(&self) -> usize {
        *lock(&self.fetches)
    }
}

#[async_trait]
impl SnapshotSource for StaticSnapshotSource {
    async fn fetch(&self) -> Result<State> {
        *lock(&self.fetches) += 1;
        Ok(lock(&self.state).clone())
    }
}

/// A full set of fakes plus the [`Services`] bundle wired to them.
#[derive(Debug, Clone)]
pub struct FakeServices {
    pub services: Services,
    pub remote: Arc<ScriptedRemote>,
    pub templates: Arc<StaticTemplates>,
    pub forms: Arc<ScriptedForms>,
    pub notifier: Arc<RecordingNotifier>,
    pub strings: Arc<StaticStrings>,
    pub snapshots: Arc<StaticSnapshotSource>,
}

impl FakeServices {
    /// Fakes whose snapshot source serves `authoritative`
    pub fn new(authoritative: State) -> Self {
        let remote = Arc::new(ScriptedRemote::new());
        let templates = Arc::new(StaticTemplates::new());
        let forms = Arc::new(ScriptedForms::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let strings = Arc::new(StaticStrings::new());
        let snapshots = Arc::new(StaticSnapshotSource::new(authoritative));
        let services = Services {
            remote: remote.clone(),
            templates: templates.clone(),
            forms: forms.clone(),
            notifier: notifier.clone(),
            strings: strings.clone(),
            snapshots: snapshots.clone(),
        };
        Self {
            services,
            remote,
            templates,
            forms,
            notifier,
            strings,
            snapshots,
        }
    }
}

impl Default for FakeServices {
    fn default() -> Self {
        Self::new(State::new())
    }
}

/// Canonical form payload for a single `put` of `fields` into `name`
pub fn form_put(name: &str, fields: Value) -> Value {
    json!([{"name": name, "action": "put", "fields": fields}])
}
