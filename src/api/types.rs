//! Wire types of the PassForge HTTP API.

use serde::{Deserialize, Serialize};

use crate::generator::{FieldRecord, GeneratorType};

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Parameters of `GET /api/generate`.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateRequest {
    pub generator_type: GeneratorType,
    /// Ask the server to record the result in its history.
    pub log: bool,
    pub fields: FieldRecord,
}

impl GenerateRequest {
    pub fn new(generator_type: GeneratorType, fields: FieldRecord, log: bool) -> Self {
        Self {
            generator_type,
            log,
            fields,
        }
    }

    /// Query pairs in wire order: `type`, `log`, then every field.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::with_capacity(self.fields.len() + 2);
        pairs.push(("type".to_string(), self.generator_type.as_str().to_string()));
        pairs.push(("log".to_string(), self.log.to_string()));
        pairs.extend(
            self.fields
                .iter()
                .map(|(key, value)| (key.clone(), value.to_string())),
        );
        pairs
    }
}

/// Parameters of `GET /api/history`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryQuery {
    pub limit: usize,
    /// Search term; blank means no filter.
    pub search: String,
}

impl HistoryQuery {
    pub fn new(limit: usize, search: impl Into<String>) -> Self {
        Self {
            limit,
            search: search.into(),
        }
    }

    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![("limit".to_string(), self.limit.to_string())];
        let search = self.search.trim();
        if !search.is_empty() {
            pairs.push(("search".to_string(), search.to_string()));
        }
        pairs
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct AnalyzeBody<'a> {
    pub password: &'a str,
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Body of a successful `GET /api/generate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub password: String,
    pub entropy: f64,
    #[serde(rename = "type")]
    pub generator_type: String,
    /// Base64-encoded PNG, only for generators that produce one.
    #[serde(default)]
    pub qr: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Strength {
    #[serde(default)]
    pub score: Option<u8>,
    #[serde(default)]
    pub warning: Option<String>,
    #[serde(default)]
    pub suggestions: Option<Vec<String>>,
}

/// Body of a successful `/api/analyze`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    #[serde(default)]
    pub entropy: Option<f64>,
    #[serde(default)]
    pub strength: Option<Strength>,
}

/// Body of `GET /api/bootstrap`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BootstrapResponse {
    #[serde(rename = "apiKey", default)]
    pub api_key: Option<String>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
