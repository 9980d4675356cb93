// crates/fieldscope-store-http/src/store.rs
// ============================================================================
// Module: HTTP Remote Store
// Description: RemoteStore over a JSON-over-HTTP database REST endpoint.
// Purpose: Issue path reads, equality reads, and path writes with strict limits.
// Dependencies: fieldscope-core, reqwest, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Each store path maps to `<base_url>/<segments>.json`:
//! - reads issue `GET`, equality reads add `orderBy` and `equalTo` parameters
//!   carrying JSON-quoted field and value,
//! - `Set` issues `PUT`, `Merge` issues `PATCH`, and `Delete` issues `DELETE`.
//!
//! An optional auth token is sent as the `auth` query parameter. Redirects
//! are not followed and response bodies larger than `max_response_bytes`
//! fail closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;
use fieldscope_core::RemoteStore;
use fieldscope_core::StoreError;
use fieldscope_core::StorePath;
use fieldscope_core::WriteOp;
use reqwest::Client;
use reqwest::Method;
use reqwest::Url;
use reqwest::header::CONTENT_TYPE;
use reqwest::redirect::Policy;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default request timeout (ms).
const DEFAULT_TIMEOUT_MS: u64 = 10_000;
/// Default response body limit.
const DEFAULT_MAX_RESPONSE_BYTES: usize = 16 * 1024 * 1024;
/// Maximum characters of an error body kept in status errors.
const MAX_ERROR_PREVIEW_CHARS: usize = 256;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Configuration for the HTTP store.
///
/// # Invariants
/// - `allow_http = false` blocks cleartext `http://` base URLs.
/// - Base URLs with embedded credentials are rejected.
/// - `timeout_ms` applies to the full request lifecycle.
/// - `max_response_bytes` is a hard upper bound on response bodies.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HttpStoreConfig {
    /// Database base URL.
    pub base_url: String,
    /// Optional auth token sent as the `auth` query parameter.
    #[serde(default)]
    pub auth_token: Option<String>,
    /// Allow cleartext HTTP (disabled by default).
    #[serde(default)]
    pub allow_http: bool,
    /// Request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Maximum response size allowed, in bytes.
    #[serde(default = "default_max_response_bytes")]
    pub max_response_bytes: usize,
    /// User agent string for outbound requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl HttpStoreConfig {
    /// Returns a config for `base_url` with default settings.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            auth_token: None,
            allow_http: false,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
            user_agent: default_user_agent(),
        }
    }

    /// Validates the store configuration.
    ///
    /// # Errors
    ///
    /// Returns [`HttpStoreError::Config`] when the base URL or limits are
    /// invalid.
    pub fn validate(&self) -> Result<(), HttpStoreError> {
        parse_base_url(self)?;
        if self.timeout_ms == 0 {
            return Err(HttpStoreError::Config("timeout_ms must be greater than zero".to_string()));
        }
        if self.max_response_bytes == 0 {
            return Err(HttpStoreError::Config(
                "max_response_bytes must be greater than zero".to_string(),
            ));
        }
        if self.auth_token.as_ref().is_some_and(|token| token.trim().is_empty()) {
            return Err(HttpStoreError::Config("auth_token must be non-empty".to_string()));
        }
        Ok(())
    }
}

/// Returns the default request timeout.
const fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

/// Returns the default response body limit.
const fn default_max_response_bytes() -> usize {
    DEFAULT_MAX_RESPONSE_BYTES
}

/// Returns the default user agent.
fn default_user_agent() -> String {
    "fieldscope/0.1".to_string()
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// HTTP store errors.
///
/// # Invariants
/// - Error messages avoid embedding auth tokens.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HttpStoreError {
    /// Invalid configuration or request.
    #[error("http store config error: {0}")]
    Config(String),
    /// Transport failure.
    #[error("http store transport error: {0}")]
    Transport(String),
    /// Non-success response status.
    #[error("http store status {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body preview.
        message: String,
    },
    /// Response body could not be decoded.
    #[error("http store decode error: {0}")]
    Decode(String),
    /// Response body exceeded the configured limit.
    #[error("http store response too large: {actual} bytes (max {limit})")]
    ResponseTooLarge {
        /// Bytes read before the limit tripped.
        actual: usize,
        /// Configured limit.
        limit: usize,
    },
}

impl From<HttpStoreError> for StoreError {
    fn from(error: HttpStoreError) -> Self {
        match error {
            HttpStoreError::Config(message) => Self::Invalid(message),
            HttpStoreError::Transport(message) => Self::Io(message),
            HttpStoreError::Status {
                status,
                message,
            } => Self::Status {
                status,
                message,
            },
            HttpStoreError::Decode(message) => Self::Decode(message),
            HttpStoreError::ResponseTooLarge {
                actual,
                limit,
            } => Self::Decode(format!("response exceeds size limit: {actual} bytes (max {limit})")),
        }
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// Remote store over a JSON-over-HTTP REST endpoint.
///
/// # Invariants
/// - Redirects are not followed.
/// - Responses exceeding configured limits fail closed.
#[derive(Clone)]
pub struct HttpRemoteStore {
    /// Store configuration.
    config: HttpStoreConfig,
    /// Parsed base URL.
    base_url: Url,
    /// HTTP client used for outbound requests.
    client: Client,
}

impl HttpRemoteStore {
    /// Creates an HTTP store with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`HttpStoreError`] when the configuration is invalid or the
    /// HTTP client cannot be created.
    pub fn new(config: HttpStoreConfig) -> Result<Self, HttpStoreError> {
        config.validate()?;
        let base_url = parse_base_url(&config)?;
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(config.user_agent.clone())
            .redirect(Policy::none())
            .build()
            .map_err(|err| HttpStoreError::Transport(format!("http client build failed: {err}")))?;
        Ok(Self {
            config,
            base_url,
            client,
        })
    }

    /// Returns the store configuration.
    #[must_use]
    pub const fn config(&self) -> &HttpStoreConfig {
        &self.config
    }

    /// Returns the request URL for `path`, with an optional equality filter.
    ///
    /// # Errors
    ///
    /// Returns [`HttpStoreError::Config`] when the base URL cannot carry
    /// path segments.
    pub fn url_for(
        &self,
        path: &StorePath,
        filter: Option<(&str, &str)>,
    ) -> Result<Url, HttpStoreError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|()| {
                HttpStoreError::Config("base_url cannot carry path segments".to_string())
            })?;
            segments.pop_if_empty();
            let parts: Vec<&str> = path.segments().collect();
            match parts.split_last() {
                Some((last, parents)) => {
                    segments.extend(parents);
                    segments.push(&format!("{last}.json"));
                }
                None => {
                    segments.push(".json");
                }
            }
        }
        {
            let mut query = url.query_pairs_mut();
            if let Some((field, value)) = filter {
                query.append_pair("orderBy", &quote(field));
                query.append_pair("equalTo", &quote(value));
            }
            if let Some(token) = &self.config.auth_token {
                query.append_pair("auth", token);
            }
        }
        if url.query() == Some("") {
            url.set_query(None);
        }
        Ok(url)
    }

    /// Sends a request and returns the decoded JSON body.
    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<Vec<u8>>,
    ) -> Result<Value, HttpStoreError> {
        let mut request = self.client.request(method, url);
        if let Some(body) = body {
            request = request.header(CONTENT_TYPE, "application/json").body(body);
        }
        let response =
            request.send().await.map_err(|err| HttpStoreError::Transport(err.to_string()))?;
        let status = response.status();
        let body = read_response_body_with_limit(response, self.config.max_response_bytes).await?;
        if !status.is_success() {
            let preview: String = String::from_utf8_lossy(&body)
                .trim()
                .chars()
                .take(MAX_ERROR_PREVIEW_CHARS)
                .collect();
            return Err(HttpStoreError::Status {
                status: status.as_u16(),
                message: preview,
            });
        }
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&body)
            .map_err(|err| HttpStoreError::Decode(format!("invalid json response: {err}")))
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn read(&self, path: &StorePath) -> Result<Value, StoreError> {
        let url = self.url_for(path, None)?;
        Ok(self.send(Method::GET, url, None).await?)
    }

    async fn read_where(
        &self,
        path: &StorePath,
        field: &str,
        value: &str,
    ) -> Result<Value, StoreError> {
        let url = self.url_for(path, Some((field, value)))?;
        let reply = self.send(Method::GET, url, None).await?;
        match reply {
            Value::Object(children) if children.is_empty() => Ok(Value::Null),
            other => Ok(other),
        }
    }

    async fn write(&self, path: &StorePath, op: WriteOp) -> Result<(), StoreError> {
        let url = self.url_for(path, None)?;
        let (method, body) = match op {
            WriteOp::Set(value) => (Method::PUT, Some(encode(&value)?)),
            WriteOp::Merge(children) => (Method::PATCH, Some(encode(&Value::Object(children))?)),
            WriteOp::Delete => (Method::DELETE, None),
        };
        self.send(method, url, body).await?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Parses and validates the configured base URL.
fn parse_base_url(config: &HttpStoreConfig) -> Result<Url, HttpStoreError> {
    let url = Url::parse(config.base_url.trim())
        .map_err(|_| HttpStoreError::Config("invalid base_url".to_string()))?;
    match url.scheme() {
        "https" => {}
        "http" if config.allow_http => {}
        _ => return Err(HttpStoreError::Config("unsupported base_url scheme".to_string())),
    }
    if !url.username().is_empty() || url.password().is_some() {
        return Err(HttpStoreError::Config("base_url credentials are not allowed".to_string()));
    }
    if url.host_str().is_none() {
        return Err(HttpStoreError::Config("base_url host required".to_string()));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(HttpStoreError::Config(
            "base_url must not carry a query or fragment".to_string(),
        ));
    }
    Ok(url)
}

/// Quotes a query value as a JSON string.
fn quote(value: &str) -> String {
    Value::String(value.to_string()).to_string()
}

/// Encodes a request body.
fn encode(value: &Value) -> Result<Vec<u8>, HttpStoreError> {
    serde_json::to_vec(value).map_err(|err| HttpStoreError::Decode(err.to_string()))
}

/// Reads a response body while enforcing a hard byte limit.
async fn read_response_body_with_limit(
    mut response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, HttpStoreError> {
    let mut body = Vec::new();
    let mut total: usize = 0;
    while let Some(chunk) =
        response.chunk().await.map_err(|err| HttpStoreError::Transport(err.to_string()))?
    {
        let next_total = total.checked_add(chunk.len()).ok_or(HttpStoreError::ResponseTooLarge {
            actual: usize::MAX,
            limit,
        })?;
        if next_total > limit {
            return Err(HttpStoreError::ResponseTooLarge {
                actual: next_total,
                limit,
            });
        }
        body.extend_from_slice(&chunk);
        total = next_total;
    }
    Ok(body)
}
