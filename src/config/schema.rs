//! Configuration schema and defaults.
//!
//! Sections: `[server]`, `[generate]`, `[history]`, `[cache]`, `[logging]`.
//! Every field has a built-in default; users only set what they override.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::generator::GeneratorType;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level passforge configuration, as stored in
/// `~/.passforge/config.toml` and `.passforge.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PassforgeConfig {
    pub server: ServerConfig,
    pub generate: GenerateConfig,
    pub history: HistoryConfig,
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
}

// ---------------------------------------------------------------------------
// [server]
// ---------------------------------------------------------------------------

/// How the password to analyze is sent to `/api/analyze`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalyzeTransport {
    /// `GET /api/analyze?password=...`
    #[default]
    Query,
    /// `POST /api/analyze` with `{"password": ...}`
    Json,
}

impl fmt::Display for AnalyzeTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Query => write!(f, "query"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Backend connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Base URL of the PassForge API.
    pub base_url: String,
    /// Per-request timeout (milliseconds).
    pub timeout_ms: u64,
    pub analyze_transport: AnalyzeTransport,
    /// Key sent to the history endpoint when none is stored.
    pub default_api_key: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8093".to_string(),
            timeout_ms: 10_000,
            analyze_transport: AnalyzeTransport::default(),
            default_api_key: "default_secret_key".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// [generate]
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerateConfig {
    /// Generator used when none is given on the command line.
    pub default_type: GeneratorType,
    /// Ask the backend to log generated credentials to its history.
    pub log: bool,
    /// Copy every generated credential to the clipboard.
    pub copy: bool,
}

impl Default for GenerateConfig {
    fn default() -> Self {
        Self {
            default_type: GeneratorType::Random,
            log: true,
            copy: false,
        }
    }
}

// ---------------------------------------------------------------------------
// [history]
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// `limit` sent to `/api/history`.
    pub limit: usize,
    /// Cap of the local history mirror.
    pub max_entries: usize,
    /// Quiet period before a search is sent (milliseconds).
    pub debounce_ms: u64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            limit: 50,
            max_entries: 50,
            debounce_ms: 300,
        }
    }
}

// ---------------------------------------------------------------------------
// [cache]
// ---------------------------------------------------------------------------

/// Offline cache proxy settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Version tag; caches with any other name are deleted on activation.
    pub version: String,
    /// Cache storage directory. `~` expands to the home directory.
    pub dir: String,
    /// Listen address of `passforge serve`.
    pub listen: String,
    /// Same-origin paths that must be cached for installation to succeed.
    pub core_assets: Vec<String>,
    /// Absolute URLs cached best-effort during installation.
    pub external_assets: Vec<String>,
    /// Regex patterns of external URLs whose successful responses are
    /// cached at runtime.
    pub external_hosts: Vec<String>,
    /// Core asset served to navigations when the network is down.
    pub offline_page: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            version: "passforge-v2".to_string(),
            dir: "~/.passforge/cache".to_string(),
            listen: "127.0.0.1:8094".to_string(),
            core_assets: [
                "/",
                "/index.html",
                "/css/style.css",
                "/js/app.js",
                "/manifest.json",
                "/offline.html",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            external_assets: vec![
                "https://unpkg.com/lucide@latest".to_string(),
                "https://fonts.googleapis.com/css2?family=Inter:wght@300;400;500;600;700&display=swap"
                    .to_string(),
            ],
            external_hosts: vec![
                r"^https://fonts\.googleapis\.com/".to_string(),
                r"^https://fonts\.gstatic\.com/".to_string(),
                r"^https://unpkg\.com/".to_string(),
            ],
            offline_page: "/offline.html".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// [logging]
// ---------------------------------------------------------------------------

/// Event log settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Whether client events are appended to the JSONL log.
    pub enabled: bool,
    /// Path of the event log. `~` expands to the home directory.
    pub path: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "~/.passforge/events.jsonl".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Annotated default file
// ---------------------------------------------------------------------------

impl PassforgeConfig {
    /// The annotated default config written by `passforge config init`.
    pub fn default_toml() -> String {
        r#"# passforge configuration
#
# Configuration hierarchy (highest precedence wins):
#   1. Environment variables (PASSFORGE_*)
#   2. Project config (.passforge.toml in current directory)
#   3. User global config (~/.passforge/config.toml)
#   4. Built-in defaults

[server]
base_url = "http://127.0.0.1:8093"
timeout_ms = 10000
analyze_transport = "query"          # query | json
default_api_key = "default_secret_key"

[generate]
default_type = "random"
log = true                           # ask the server to record generations
copy = false                         # copy every result to the clipboard

[history]
limit = 50
max_entries = 50
debounce_ms = 300

[cache]
version = "passforge-v2"             # bump to drop every older cache
dir = "~/.passforge/cache"
listen = "127.0.0.1:8094"
core_assets = ["/", "/index.html", "/css/style.css", "/js/app.js", "/manifest.json", "/offline.html"]
external_assets = [
    "https://unpkg.com/lucide@latest",
    "https://fonts.googleapis.com/css2?family=Inter:wght@300;400;500;600;700&display=swap",
]
external_hosts = ['^https://fonts\.googleapis\.com/', '^https://fonts\.gstatic\.com/', '^https://unpkg\.com/']
offline_page = "/offline.html"

[logging]
enabled = true
path = "~/.passforge/events.jsonl"
"#
        .to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_toml_matches_built_in_defaults() {
        let parsed: PassforgeConfig = toml::from_str(&PassforgeConfig::default_toml()).unwrap();
        assert_eq!(parsed, PassforgeConfig::default());
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let parsed: PassforgeConfig = toml::from_str(
            r#"
[server]
base_url = "https://pf.example"
"#,
        )
        .unwrap();
        assert_eq!(parsed.server.base_url, "https://pf.example");
        assert_eq!(parsed.server.timeout_ms, 10_000);
        assert_eq!(parsed.history.debounce_ms, 300);
    }

    #[test]
    fn analyze_transport_serde() {
        let parsed: ServerConfig = toml::from_str(r#"analyze_transport = "json""#).unwrap();
        assert_eq!(parsed.analyze_transport, AnalyzeTransport::Json);
        assert_eq!(AnalyzeTransport::Query.to_string(), "query");
    }

    #[test]
    fn default_type_round_trips() {
        let parsed: GenerateConfig = toml::from_str(r#"default_type = "jwt""#).unwrap();
        assert_eq!(parsed.default_type, GeneratorType::Jwt);
    }
}
