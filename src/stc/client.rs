//! REST client for the TestCenter automation API
//!
//! Speaks the session-manager protocol: sessions under
//! `/stcapi/sessions`, object reads/writes under `/stcapi/objects`,
//! commands via `/stcapi/perform`. Every request after session creation
//! carries the session id in the `X-STC-API-Session` header.

use anyhow::{Context, Result};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info};

use super::api::{StcApi, StcError};

const SESSION_HEADER: &str = "X-STC-API-Session";
const SEQUENCER_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// REST client for one appliance session
pub struct StcRestClient {
    http: Client,
    base_url: Option<String>,
    session_id: Option<String>,
}

impl StcRestClient {
    /// Create a client with the given per-request timeout.
    pub fn new(timeout_secs: u64) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            base_url: None,
            session_id: None,
        })
    }

    /// Normalize a lab server address into the API base URL.
    fn base_url_for(server: &str) -> String {
        if server.starts_with("http://") || server.starts_with("https://") {
            format!("{}/stcapi", server.trim_end_matches('/'))
        } else {
            format!("http://{server}/stcapi")
        }
    }

    fn base(&self) -> Result<&str, StcError> {
        self.base_url.as_deref().ok_or(StcError::NoSession)
    }

    fn session(&self) -> Result<&str, StcError> {
        self.session_id.as_deref().ok_or(StcError::NoSession)
    }

    /// Build a request carrying the session header.
    fn request(&self, method: Method, url: &str) -> Result<RequestBuilder, StcError> {
        Ok(self
            .http
            .request(method, url)
            .header(SESSION_HEADER, self.session()?))
    }

    /// Send a request, turning non-2xx responses into [`StcError::Api`].
    async fn send(&self, operation: &str, req: RequestBuilder) -> Result<Value, StcError> {
        let response = req.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(StcError::Api {
                operation: operation.to_string(),
                status: status.as_u16(),
                message: body,
            });
        }

        if body.is_empty() {
            return Ok(Value::Null);
        }
        // some commands answer with plain text rather than JSON
        Ok(serde_json::from_str(&body).unwrap_or(Value::String(body)))
    }
}

/// Render a JSON value as the appliance's flat string form.
fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Array(items) => items
            .iter()
            .map(value_to_string)
            .collect::<Vec<_>>()
            .join(" "),
        other => other.to_string(),
    }
}

/// Pull one attribute out of a response object, tolerating the
/// case-insensitive attribute names the appliance uses.
fn extract_attr(value: &Value, attr: &str) -> Option<String> {
    match value {
        Value::Object(map) => map
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(attr))
            .map(|(_, v)| value_to_string(v)),
        // single-attribute reads may answer with the bare value
        other => Some(value_to_string(other)),
    }
}

/// Convert a response object into a flat attribute map.
fn to_attr_map(value: &Value) -> BTreeMap<String, String> {
    match value {
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| (k.clone(), value_to_string(v)))
            .collect(),
        _ => BTreeMap::new(),
    }
}

impl StcApi for StcRestClient {
    async fn new_session(
        &mut self,
        server: &str,
        session_name: &str,
        user: &str,
    ) -> Result<(), StcError> {
        let base = Self::base_url_for(server);
        info!("opening session {session_name} on {server} as {user}");

        let response = self
            .http
            .post(format!("{base}/sessions"))
            .form(&[("userid", user), ("sessionname", session_name)])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        // CONFLICT means the session already exists; join it
        if !status.is_success() && status != StatusCode::CONFLICT {
            return Err(StcError::Api {
                operation: "new_session".to_string(),
                status: status.as_u16(),
                message: body,
            });
        }

        let session_id = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| extract_attr(&v, "session_id"))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| format!("{session_name} - {user}"));

        debug!("session id: {session_id}");
        self.base_url = Some(base);
        self.session_id = Some(session_id);
        Ok(())
    }

    async fn end_session(&mut self, terminate: bool) -> Result<(), StcError> {
        let url = format!("{}/sessions/{}", self.base()?, self.session()?);
        let mut req = self.http.delete(&url).header(SESSION_HEADER, self.session()?);
        if terminate {
            req = req.query(&[("kill", "true")]);
        }

        self.send("end_session", req).await?;
        info!("session ended");
        self.session_id = None;
        Ok(())
    }

    async fn get(&self, handle: &str, attr: &str) -> Result<String, StcError> {
        let url = format!("{}/objects/{handle}?{attr}", self.base()?);
        let value = self.send("get", self.request(Method::GET, &url)?).await?;

        extract_attr(&value, attr).ok_or_else(|| StcError::MissingField(attr.to_string()))
    }

    async fn get_many(
        &self,
        handle: &str,
        attrs: &[&str],
    ) -> Result<BTreeMap<String, String>, StcError> {
        let url = format!("{}/objects/{handle}?{}", self.base()?, attrs.join("&"));
        let value = self.send("get", self.request(Method::GET, &url)?).await?;
        Ok(to_attr_map(&value))
    }

    async fn config(&self, handle: &str, attrs: &[(&str, &str)]) -> Result<(), StcError> {
        let url = format!("{}/objects/{handle}", self.base()?);
        let body: BTreeMap<&str, &str> = attrs.iter().copied().collect();
        debug!("config {handle}: {body:?}");

        self.send("config", self.request(Method::PUT, &url)?.json(&body))
            .await?;
        Ok(())
    }

    async fn create(
        &self,
        object_type: &str,
        under: &str,
        attrs: &[(&str, &str)],
    ) -> Result<String, StcError> {
        let url = format!("{}/objects", self.base()?);
        let mut body: BTreeMap<&str, &str> = attrs.iter().copied().collect();
        body.insert("object_type", object_type);
        body.insert("under", under);
        debug!("create {object_type} under {under}");

        let value = self
            .send("create", self.request(Method::POST, &url)?.json(&body))
            .await?;

        extract_attr(&value, "handle")
            .filter(|h| !h.is_empty())
            .ok_or_else(|| StcError::MissingField("handle".to_string()))
    }

    async fn perform(
        &self,
        command: &str,
        params: &[(&str, &str)],
    ) -> Result<BTreeMap<String, String>, StcError> {
        let url = format!("{}/perform", self.base()?);
        let mut body: BTreeMap<&str, &str> = params.iter().copied().collect();
        body.insert("command", command);
        debug!("perform {command}");

        let value = self
            .send(command, self.request(Method::POST, &url)?.json(&body))
            .await?;
        Ok(to_attr_map(&value))
    }

    async fn apply(&self) -> Result<(), StcError> {
        let url = format!("{}/apply", self.base()?);
        self.send("apply", self.request(Method::PUT, &url)?).await?;
        Ok(())
    }

    async fn wait_until_complete(&self, timeout: Option<Duration>) -> Result<(), StcError> {
        let started = tokio::time::Instant::now();

        loop {
            let state = self.get("system1.sequencer", "State").await?;
            debug!("sequencer state: {state}");

            match state.as_str() {
                "IDLE" | "PAUSE" | "FINISHED" => return Ok(()),
                _ => {}
            }

            if let Some(limit) = timeout {
                if started.elapsed() >= limit {
                    return Err(StcError::SequencerTimeout(limit.as_secs()));
                }
            }

            tokio::time::sleep(SEQUENCER_POLL_INTERVAL).await;
        }
    }
}
