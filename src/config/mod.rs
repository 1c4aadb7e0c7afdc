//! Configuration system for passforge.
//!
//! Provides a layered configuration hierarchy:
//!
//! 1. **Built-in defaults**: [`schema::PassforgeConfig::default()`]
//! 2. **User global config**: `~/.passforge/config.toml`
//! 3. **Project local config**: `.passforge.toml` in the current directory
//! 4. **Environment variables**: `PASSFORGE_*` overrides (highest precedence)
//!
//! File layers are merged key by key, so a project file that only sets
//! `server.base_url` keeps everything else from the global file.
//!
//! # Usage
//!
//! ```rust,ignore
//! let cfg = passforge::config::load();
//! let client = ApiClient::from_config(&cfg.server);
//! ```
pub mod schema;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub use schema::{AnalyzeTransport, PassforgeConfig};

/// Overrides the data directory (`~/.passforge`) when set.
pub const HOME_ENV: &str = "PASSFORGE_HOME";

const PROJECT_FILE: &str = ".passforge.toml";

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Load the fully resolved configuration.
///
/// Malformed files are skipped rather than reported, so a broken project
/// file never locks the user out of the client.
pub fn load() -> PassforgeConfig {
    let mut merged = toml::Value::Table(toml::map::Map::new());

    for path in [global_config_file(), project_config_file()]
        .into_iter()
        .flatten()
    {
        if let Some(layer) = load_toml_file(&path) {
            merge_values(&mut merged, layer);
        }
    }

    let mut config: PassforgeConfig = merged.try_into().unwrap_or_default();
    apply_env_overrides(&mut config);
    config
}

fn load_toml_file(path: &Path) -> Option<toml::Value> {
    let content = fs::read_to_string(path).ok()?;
    let value: toml::Value = toml::from_str(&content).ok()?;
    // Reject files that would not deserialize on their own.
    value.clone().try_into::<PassforgeConfig>().ok()?;
    Some(value)
}

/// Deep-merge `overlay` into `base`: tables merge recursively, everything
/// else is replaced.
fn merge_values(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, value) in overlay_table {
                match base_table.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base_table.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

// ---------------------------------------------------------------------------
// File paths
// ---------------------------------------------------------------------------

/// Data directory: `$PASSFORGE_HOME`, or `~/.passforge`.
pub fn data_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(HOME_ENV)
        && !dir.is_empty()
    {
        return Some(PathBuf::from(dir));
    }
    dirs::home_dir().map(|home| home.join(".passforge"))
}

/// `config.toml` in the data directory.
pub fn global_config_file() -> Option<PathBuf> {
    data_dir().map(|dir| dir.join("config.toml"))
}

/// `.passforge.toml` in the working directory.
pub fn project_config_file() -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    Some(cwd.join(PROJECT_FILE))
}

/// Expand a leading `~/` against the home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(path)
}

// ---------------------------------------------------------------------------
// Environment variable overrides
// ---------------------------------------------------------------------------

/// Apply environment variable overrides (highest precedence layer).
///
/// Supported variables:
/// - `PASSFORGE_SERVER_URL`: API base URL
/// - `PASSFORGE_TIMEOUT_MS`: request timeout
/// - `PASSFORGE_ANALYZE_TRANSPORT`: `query` or `json`
/// - `PASSFORGE_LOG`: event log on/off (`1`/`true`/`yes`/`on`)
/// - `PASSFORGE_HISTORY_LIMIT`: `limit` sent to the history endpoint
/// - `PASSFORGE_CACHE_VERSION`: cache version tag
fn apply_env_overrides(config: &mut PassforgeConfig) {
    if let Ok(val) = std::env::var("PASSFORGE_SERVER_URL")
        && !val.is_empty()
    {
        config.server.base_url = val;
    }
    if let Ok(val) = std::env::var("PASSFORGE_TIMEOUT_MS")
        && let Ok(ms) = val.parse::<u64>()
    {
        config.server.timeout_ms = ms;
    }
    if let Ok(val) = std::env::var("PASSFORGE_ANALYZE_TRANSPORT")
        && let Some(transport) = parse_transport(&val)
    {
        config.server.analyze_transport = transport;
    }
    if let Ok(val) = std::env::var("PASSFORGE_LOG") {
        config.logging.enabled = is_truthy(&val);
    }
    if let Ok(val) = std::env::var("PASSFORGE_HISTORY_LIMIT")
        && let Ok(limit) = val.parse::<usize>()
    {
        config.history.limit = limit;
    }
    if let Ok(val) = std::env::var("PASSFORGE_CACHE_VERSION")
        && !val.is_empty()
    {
        config.cache.version = val;
    }
}

fn is_truthy(val: &str) -> bool {
    ["1", "true", "yes", "on"]
        .iter()
        .any(|word| val.trim().eq_ignore_ascii_case(word))
}

fn parse_transport(val: &str) -> Option<AnalyzeTransport> {
    match val.to_ascii_lowercase().as_str() {
        "query" | "get" => Some(AnalyzeTransport::Query),
        "json" | "post" => Some(AnalyzeTransport::Json),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Config init / set / reset
// ---------------------------------------------------------------------------

fn require_global_file() -> Result<PathBuf> {
    global_config_file().context("no home directory to hold passforge config")
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    fs::write(path, content).with_context(|| format!("writing {}", path.display()))
}

/// Write the default annotated config to the global file.
///
/// An existing file is kept unless `force` is set.
pub fn init_config(force: bool) -> Result<PathBuf> {
    let path = require_global_file()?;
    if !force && path.exists() {
        anyhow::bail!("{} exists (pass --force to replace it)", path.display());
    }
    write_file(&path, &PassforgeConfig::default_toml())?;
    Ok(path)
}

/// Reset the global config to defaults.
pub fn reset_config() -> Result<PathBuf> {
    init_config(true)
}

/// Set a single dotted key (e.g. `history.debounce_ms`) in the global
/// config file, creating it from defaults when missing.
pub fn set_config_value(key: &str, value: &str) -> Result<()> {
    set_config_value_at(&require_global_file()?, key, value)
}

fn set_config_value_at(path: &Path, key: &str, value: &str) -> Result<()> {
    let mut root: toml::Value = if path.exists() {
        let text =
            fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("{} is not valid TOML", path.display()))?
    } else {
        toml::Value::try_from(PassforgeConfig::default()).context("encoding default config")?
    };
    set_toml_value(&mut root, key, value)?;

    // The file must still load as a whole after the edit.
    root.clone()
        .try_into::<PassforgeConfig>()
        .with_context(|| format!("invalid value for '{key}': {value}"))?;

    let text = toml::to_string_pretty(&root).context("encoding updated config")?;
    write_file(path, &text)
}

/// Replace the value at a dotted key, keeping the TOML type already there.
fn set_toml_value(root: &mut toml::Value, key: &str, raw: &str) -> Result<()> {
    let (section_path, leaf) = match key.rsplit_once('.') {
        Some((sections, leaf)) => (Some(sections), leaf),
        None => (None, key),
    };
    if leaf.is_empty() {
        anyhow::bail!("empty config key");
    }

    let mut node = root;
    for section in section_path.into_iter().flat_map(|p| p.split('.')) {
        node = node
            .get_mut(section)
            .with_context(|| format!("unknown config section '{section}' in '{key}'"))?;
    }
    let table = node
        .as_table_mut()
        .with_context(|| format!("'{}' is not a section", section_path.unwrap_or("")))?;

    let current = table
        .get(leaf)
        .with_context(|| format!("unknown config key '{key}'"))?;
    let updated = coerce_like(current, key, raw)?;
    table.insert(leaf.to_string(), updated);
    Ok(())
}

fn coerce_like(current: &toml::Value, key: &str, raw: &str) -> Result<toml::Value> {
    let bad = |kind: &str| format!("'{key}' takes {kind}, not '{raw}'");
    Ok(match current {
        toml::Value::Boolean(_) => toml::Value::Boolean(is_truthy(raw)),
        toml::Value::Integer(_) => {
            toml::Value::Integer(raw.trim().parse().with_context(|| bad("an integer"))?)
        }
        toml::Value::Float(_) => {
            toml::Value::Float(raw.trim().parse().with_context(|| bad("a number"))?)
        }
        toml::Value::Array(_) => raw
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(|item| toml::Value::String(item.to_string()))
            .collect::<Vec<_>>()
            .into(),
        _ => toml::Value::String(raw.to_string()),
    })
}

/// The effective (fully resolved) config as TOML.
pub fn show_effective_config() -> Result<String> {
    toml::to_string_pretty(&load()).context("encoding effective config")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthy_words() {
        for v in ["1", "true", "TRUE", "yes", "on"] {
            assert!(is_truthy(v), "{v}");
        }
        for v in ["0", "false", "no", "off", ""] {
            assert!(!is_truthy(v), "{v}");
        }
    }

    #[test]
    fn parse_transport_handles_aliases() {
        assert_eq!(parse_transport("POST"), Some(AnalyzeTransport::Json));
        assert_eq!(parse_transport("query"), Some(AnalyzeTransport::Query));
        assert_eq!(parse_transport("carrier-pigeon"), None);
    }

    #[test]
    fn merge_values_is_key_by_key() {
        let mut base: toml::Value = toml::from_str(
            r#"
[server]
base_url = "http://a"
timeout_ms = 5
"#,
        )
        .unwrap();
        let overlay: toml::Value = toml::from_str(
            r#"
[server]
base_url = "http://b"
"#,
        )
        .unwrap();
        merge_values(&mut base, overlay);
        let config: PassforgeConfig = base.try_into().unwrap();
        assert_eq!(config.server.base_url, "http://b");
        assert_eq!(config.server.timeout_ms, 5);
    }

    #[test]
    fn set_toml_value_types_by_existing_value() {
        let mut root: toml::Value = toml::from_str(
            r#"
[history]
debounce_ms = 300
[logging]
enabled = true
[cache]
core_assets = ["/"]
"#,
        )
        .unwrap();
        set_toml_value(&mut root, "history.debounce_ms", "150").unwrap();
        set_toml_value(&mut root, "logging.enabled", "off").unwrap();
        set_toml_value(&mut root, "cache.core_assets", "/, /index.html").unwrap();

        assert_eq!(root["history"]["debounce_ms"].as_integer(), Some(150));
        assert_eq!(root["logging"]["enabled"].as_bool(), Some(false));
        assert_eq!(root["cache"]["core_assets"].as_array().unwrap().len(), 2);
        assert!(set_toml_value(&mut root, "history.debounce_ms", "soon").is_err());
    }

    #[test]
    fn set_toml_value_rejects_unknown_keys() {
        let mut root: toml::Value = toml::from_str("[server]\nbase_url = \"x\"").unwrap();
        assert!(set_toml_value(&mut root, "nope.key", "v").is_err());
        assert!(set_toml_value(&mut root, "server.nope", "v").is_err());
    }

    #[test]
    fn set_config_value_creates_file_from_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        set_config_value_at(&path, "server.base_url", "http://pf.local:9000").unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let config: PassforgeConfig = toml::from_str(&content).unwrap();
        assert_eq!(config.server.base_url, "http://pf.local:9000");
        assert_eq!(config.history.limit, 50);
    }

    #[test]
    fn set_config_value_rejects_invalid_enum() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let err = set_config_value_at(&path, "server.analyze_transport", "smoke").unwrap_err();
        assert!(err.to_string().contains("invalid value"));
        assert!(!path.exists());
    }

    #[test]
    fn expand_tilde_leaves_absolute_paths() {
        assert_eq!(expand_tilde("/tmp/x"), PathBuf::from("/tmp/x"));
    }

    #[test]
    fn show_effective_config_parses_back() {
        let toml_str = show_effective_config().unwrap();
        let _: PassforgeConfig = toml::from_str(&toml_str).unwrap();
    }
}
