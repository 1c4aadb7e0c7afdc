//! HTTP client for the PassForge API.
//!
//! Synchronous `ureq` client behind the [`PassforgeApi`] trait, which is the
//! seam the workflow controller and history view are written against.
//!
//! Failures are classified the way the client reports them:
//!
//! - **Server**: a non-success status with a human-readable `detail`.
//! - **Unauthorized**: HTTP 401 (history access without a valid key).
//! - **Transport**: the request never completed.
//! - **Decode**: a success status with an unreadable body.

pub mod types;

use std::fmt;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;

pub use types::{
    AnalyzeResponse, BootstrapResponse, GenerateRequest, GenerateResponse, HistoryQuery, Strength,
};

use crate::config::schema::{AnalyzeTransport, ServerConfig};
use crate::generator::Presets;
use crate::state::HistoryEntry;

/// Header carrying the history API key.
pub const API_KEY_HEADER: &str = "X-API-Key";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Non-success status; `detail` is ready to show the user.
    Server { status: u16, detail: String },
    Unauthorized,
    Transport(String),
    Decode(String),
}

impl ApiError {
    /// Classify a non-success response from its status and raw body.
    pub fn from_status(status: u16, status_text: &str, body: &str) -> Self {
        if status == 401 {
            return Self::Unauthorized;
        }
        Self::Server {
            status,
            detail: extract_detail(body).unwrap_or_else(|| status_text.to_string()),
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Server { status, detail } => write!(f, "server returned {status}: {detail}"),
            Self::Unauthorized => write!(f, "unauthorized (missing or invalid API key)"),
            Self::Transport(msg) => write!(f, "connection failed: {msg}"),
            Self::Decode(msg) => write!(f, "unreadable response: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

/// Pull `detail` out of an error body.
///
/// Strings are used verbatim; structured details (validation error lists)
/// are shown as compact JSON. `None` when the body has no usable detail.
pub fn extract_detail(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// API seam
// ---------------------------------------------------------------------------

/// Operations of the PassForge backend used by the client.
pub trait PassforgeApi {
    fn presets(&self) -> Result<Presets, ApiError>;
    fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, ApiError>;
    fn analyze(&self, password: &str) -> Result<AnalyzeResponse, ApiError>;
    fn history(&self, query: &HistoryQuery, api_key: &str) -> Result<Vec<HistoryEntry>, ApiError>;
    fn clear_history(&self, api_key: &str) -> Result<(), ApiError>;
    fn bootstrap(&self) -> Result<BootstrapResponse, ApiError>;
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Synchronous PassForge client.
///
/// Built from the `[server]` section and reused for the lifetime of a
/// command or shell session.
#[derive(Debug, Clone)]
pub struct ApiClient {
    agent: ureq::Agent,
    base_url: String,
    analyze_transport: AnalyzeTransport,
}

impl ApiClient {
    pub fn from_config(config: &ServerConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build();
        Self {
            agent,
            base_url: normalize_base_url(&config.base_url),
            analyze_transport: config.analyze_transport,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn get(&self, path: &str) -> ureq::Request {
        self.agent.get(&self.url(path))
    }
}

/// Trim trailing slashes and avoid the IPv6 detour some resolvers take for
/// `localhost`.
fn normalize_base_url(raw: &str) -> String {
    raw.trim_end_matches('/')
        .replace("://localhost", "://127.0.0.1")
}

fn with_query(mut request: ureq::Request, pairs: &[(String, String)]) -> ureq::Request {
    for (key, value) in pairs {
        request = request.query(key, value);
    }
    request
}

/// Turn a finished call into a decoded body or a classified error.
fn decode<T: DeserializeOwned>(result: Result<ureq::Response, ureq::Error>) -> Result<T, ApiError> {
    let response = check(result)?;
    response
        .into_json::<T>()
        .map_err(|e| ApiError::Decode(e.to_string()))
}

fn check(result: Result<ureq::Response, ureq::Error>) -> Result<ureq::Response, ApiError> {
    match result {
        Ok(response) => Ok(response),
        Err(ureq::Error::Status(status, response)) => {
            let status_text = response.status_text().to_string();
            let body = response.into_string().unwrap_or_default();
            Err(ApiError::from_status(status, &status_text, &body))
        }
        Err(ureq::Error::Transport(transport)) => Err(ApiError::Transport(describe(&transport))),
    }
}

/// Transport failure text without the request URL, which can carry the
/// analyzed password in its query.
fn describe(transport: &ureq::Transport) -> String {
    match transport.message() {
        Some(message) => format!("{}: {message}", transport.kind()),
        None => transport.kind().to_string(),
    }
}

impl PassforgeApi for ApiClient {
    fn presets(&self) -> Result<Presets, ApiError> {
        decode(self.get("/api/presets").call())
    }

    fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, ApiError> {
        decode(with_query(self.get("/api/generate"), &request.query_pairs()).call())
    }

    fn analyze(&self, password: &str) -> Result<AnalyzeResponse, ApiError> {
        let result = match self.analyze_transport {
            AnalyzeTransport::Query => self.get("/api/analyze").query("password", password).call(),
            AnalyzeTransport::Json => self
                .agent
                .post(&self.url("/api/analyze"))
                .send_json(types::AnalyzeBody { password }),
        };
        decode(result)
    }

    fn history(&self, query: &HistoryQuery, api_key: &str) -> Result<Vec<HistoryEntry>, ApiError> {
        let request = with_query(self.get("/api/history"), &query.query_pairs())
            .set(API_KEY_HEADER, api_key);
        decode(request.call())
    }

    fn clear_history(&self, api_key: &str) -> Result<(), ApiError> {
        let result = self
            .agent
            .delete(&self.url("/api/history"))
            .set(API_KEY_HEADER, api_key)
            .call();
        check(result).map(|_| ())
    }

    fn bootstrap(&self) -> Result<BootstrapResponse, ApiError> {
        decode(self.get("/api/bootstrap").call())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
