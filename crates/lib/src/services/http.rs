//! AJAX web service client.
//!
//! Posts batches of `{index, methodname, args}` calls to the site's AJAX
//! service endpoint using reqwest, and maps per-call exceptions to
//! [`RemoteError::Server`].

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use url::Url;

use super::{RemoteError, RemoteRequest, RemoteService};
use crate::{Result, constants::AJAX_SERVICE_PATH};

/// Where and how to reach the site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Site root, e.g. `https://moodle.example.org`
    pub wwwroot: Url,
    /// Session key sent with every call
    pub sesskey: String,
    #[serde(default = "default_timeout", with = "timeout_secs")]
    pub timeout: Duration,
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

mod timeout_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(deserializer)?))
    }
}

impl RemoteConfig {
    pub fn new(wwwroot: Url, sesskey: impl Into<String>) -> Self {
        Self {
            wwwroot,
            sesskey: sesskey.into(),
            timeout: default_timeout(),
        }
    }

    /// Endpoint URL for a batch of methods
    pub fn endpoint(&self, methods: &[&str]) -> std::result::Result<Url, url::ParseError> {
        let mut base = self.wwwroot.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let mut url = base.join(AJAX_SERVICE_PATH)?;
        url.query_pairs_mut()
            .append_pair("sesskey", &self.sesskey)
            .append_pair("info", &methods.join(","));
        Ok(url)
    }
}

/// Per-call envelope in the endpoint's response array.
#[derive(Debug, Deserialize)]
struct CallResponse {
    #[serde(default)]
    error: bool,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    exception: Option<ExceptionInfo>,
}

#[derive(Debug, Default, Deserialize)]
struct ExceptionInfo {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errorcode: Option<String>,
}

/// [`RemoteService`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpRemote {
    client: reqwest::Client,
    config: RemoteConfig,
}

impl HttpRemote {
    pub fn new(config: RemoteConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RemoteError::Transport {
                method: String::new(),
                reason: format!("Failed to build HTTP client: {e}"),
            })?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }
}

#[async_trait]
impl RemoteService for HttpRemote {
    async fn call(&self, requests: Vec<RemoteRequest>) -> Result<Vec<Value>> {
        let methods: Vec<&str> = requests.iter().map(|r| r.methodname.as_str()).collect();
        let label = methods.join(",");
        let url = self
            .config
            .endpoint(&methods)
            .map_err(|e| RemoteError::Transport {
                method: label.clone(),
                reason: format!("Invalid endpoint: {e}"),
            })?;

        let body: Vec<Value> = requests
            .iter()
            .enumerate()
            .map(|(index, r)| json!({"index": index, "methodname": r.methodname, "args": r.args}))
            .collect();

        tracing::debug!(methods = %label, "Calling web services");
        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| RemoteError::Transport {
                method: label.clone(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(RemoteError::Transport {
                method: label,
                reason: format!("Server returned error: {}", response.status()),
            }
            .into());
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| RemoteError::InvalidResponse {
                method: label.clone(),
                reason: format!("Failed to parse response: {e}"),
            })?;

        parse_responses(&requests, payload)
    }
}

/// Split the endpoint's answer into per-call results.
fn parse_responses(requests: &[RemoteRequest], payload: Value) -> Result<Vec<Value>> {
    let label = || {
        requests
            .iter()
            .map(|r| r.methodname.as_str())
            .collect::<Vec<_>>()
            .join(",")
    };

    // Session or access failures answer the whole batch with one object
    let responses: Vec<CallResponse> = match payload {
        Value::Array(_) => serde_json::from_value(payload).map_err(|e| {
            RemoteError::InvalidResponse {
                method: label(),
                reason: e.to_string(),
            }
        })?,
        Value::Object(ref map) if map.contains_key("error") => {
            let message = map
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_owned();
            let errorcode = map.get("errorcode").and_then(Value::as_str).map(str::to_owned);
            return Err(RemoteError::Server {
                method: label(),
                errorcode,
                message,
            }
            .into());
        }
        other => {
            return Err(RemoteError::InvalidResponse {
                method: label(),
                reason: format!("expected an array, got {other}"),
            }
            .into());
        }
    };

    if responses.len() < requests.len() {
        return Err(RemoteError::MissingResponse {
            expected: requests.len(),
            actual: responses.len(),
        }
        .into());
    }

    let mut results = Vec::with_capacity(responses.len());
    for (request, response) in requests.iter().zip(responses) {
        if response.error {
            let exception = response.exception.unwrap_or_default();
            tracing::warn!(
                method = %request.methodname,
                message = %exception.message,
                "Web service raised an exception"
            );
            return Err(RemoteError::Server {
                method: request.methodname.clone(),
                errorcode: exception.errorcode,
                message: exception.message,
            }
            .into());
        }
        results.push(response.data);
    }
    Ok(results)
}
