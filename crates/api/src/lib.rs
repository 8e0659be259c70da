//! HTTP client for the downstream stage services.
//!
//! This crate provides a lightweight client shared by every stage executor.
//! It focuses on:
//!
//! - Constructing an HTTP client with sensible defaults
//! - Validating configured service base URLs
//! - POSTing a JSON body and returning the decoded JSON object
//! - Folding every transport, status, and decoding failure into [`RemoteError`]
//!
//! The client performs exactly one attempt per call. Deadlines and retries
//! belong to the caller.
//!
//! # Example
//!
//! ```ignore
//! use sparta_api::{StageClient, validate_base_url};
//! use serde_json::json;
//!
//! let client = StageClient::new()?;
//! let base = validate_base_url("http://localhost:8010")?;
//! let payload = client.post_json(&base, "/parse", &json!({"text": "Create a 4-bit adder"})).await?;
//! println!("intent: {}", payload["intent"]);
//! ```

use std::env;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use reqwest::{Client, RequestBuilder, header};
use serde::Serialize;
use serde_json::Value;
use sparta_types::{JsonObject, RemoteError, RemoteErrorKind};
use tracing::debug;

pub use reqwest::Url;

/// Upper bound for establishing a TCP connection to a stage service.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Longest response body excerpt carried into an error message.
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Thin wrapper around a configured `reqwest::Client` for stage service calls.
#[derive(Debug, Clone)]
pub struct StageClient {
    pub http: Client,
    pub user_agent: String,
}

impl StageClient {
    /// Build a client with JSON accept headers and a bounded connect timeout.
    pub fn new() -> Result<Self> {
        let mut default_headers = header::HeaderMap::new();
        default_headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .default_headers(default_headers)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .context("build http client")?;

        Ok(Self {
            http,
            user_agent: format!("sparta-orchestrator/{}; {}", env!("CARGO_PKG_VERSION"), env::consts::OS),
        })
    }

    /// Build a `reqwest::RequestBuilder` for a method and absolute URL.
    pub fn request(&self, method: reqwest::Method, url: Url) -> RequestBuilder {
        debug!(%url, "building request");
        self.http.request(method, url).header(header::USER_AGENT, &self.user_agent)
    }

    /// POST `body` as JSON to `path` under `base_url` and return the response object.
    ///
    /// Fails with a [`RemoteError`] when the service is unreachable, answers with
    /// a non-2xx status, or returns anything other than a JSON object.
    pub async fn post_json<B>(&self, base_url: &Url, path: &str, body: &B) -> Result<JsonObject, RemoteError>
    where
        B: Serialize + ?Sized,
    {
        let url = endpoint_url(base_url, path)?;
        let response = self
            .request(reqwest::Method::POST, url.clone())
            .json(body)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        let text = response.text().await.map_err(classify_transport_error)?;
        if !status.is_success() {
            debug!(%url, status = status.as_u16(), "stage service returned an error status");
            return Err(RemoteError::http_status(status.as_u16(), truncate(&text)));
        }

        match serde_json::from_str::<Value>(&text) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(RemoteError::malformed(format!(
                "expected a JSON object from {url}, got {}",
                json_kind(&other)
            ))),
            Err(error) => Err(RemoteError::malformed(format!("invalid JSON from {url}: {error}"))),
        }
    }
}

/// Validate that a configured base URL is usable for stage calls.
///
/// Rules:
/// - the scheme must be `http` or `https`
/// - a host must be present
/// - query strings and fragments are not allowed
pub fn validate_base_url(base: &str) -> Result<Url> {
    let parsed_base_url = Url::parse(base).map_err(|e| anyhow!("Invalid service URL '{}': {}", base, e))?;

    if !matches!(parsed_base_url.scheme(), "http" | "https") {
        return Err(anyhow!(
            "service URL '{}' must use http or https; got '{}://'",
            base,
            parsed_base_url.scheme()
        ));
    }
    if parsed_base_url.host_str().is_none() {
        return Err(anyhow!("service URL '{}' must include a host", base));
    }
    if parsed_base_url.query().is_some() || parsed_base_url.fragment().is_some() {
        return Err(anyhow!("service URL '{}' must not carry a query or fragment", base));
    }

    Ok(parsed_base_url)
}

/// Append `path` to `base_url`, keeping any path prefix the base already has.
pub fn endpoint_url(base_url: &Url, path: &str) -> Result<Url, RemoteError> {
    let joined = format!(
        "{}/{}",
        base_url.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    Url::parse(&joined).map_err(|error| RemoteError::connection(format!("invalid endpoint '{joined}': {error}")))
}

fn classify_transport_error(error: reqwest::Error) -> RemoteError {
    if error.is_timeout() {
        RemoteError::new(RemoteErrorKind::Timeout, format!("request timed out: {error}"))
    } else if error.is_decode() || error.is_body() {
        RemoteError::malformed(format!("failed to read response body: {error}"))
    } else {
        RemoteError::connection(format!("request failed: {error}"))
    }
}

fn truncate(text: &str) -> String {
    if text.chars().count() <= MAX_ERROR_BODY_CHARS {
        return text.to_string();
    }
    let mut excerpt: String = text.chars().take(MAX_ERROR_BODY_CHARS).collect();
    excerpt.push('…');
    excerpt
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
