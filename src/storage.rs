//! Client-persisted key/value state (`~/.passforge/storage.json`).
//!
//! Holds the values the web client kept in local storage: the history API
//! key and the theme. Reads are forgiving: a missing or malformed file is
//! an empty store.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::state::Theme;

/// Storage key of the history API key.
pub const API_KEY: &str = "passforge_api_key";

/// Storage key of the theme.
pub const THEME_KEY: &str = "theme";

/// File-backed string map.
#[derive(Debug, Clone)]
pub struct LocalStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl LocalStore {
    /// Open the default store under the passforge data directory.
    pub fn open_default() -> Result<Self> {
        let path = crate::config::data_dir()
            .context("could not determine home directory")?
            .join("storage.json");
        Ok(Self::open(path))
    }

    /// Open a store at `path`. Never fails; unreadable files read as empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = fs::read_to_string(&path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default();
        Self { path, values }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        self.flush()
    }

    pub fn remove(&mut self, key: &str) -> Result<()> {
        if self.values.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }

    /// Stored API key, ignoring blank values.
    pub fn api_key(&self) -> Option<&str> {
        self.get(API_KEY).filter(|k| !k.trim().is_empty())
    }

    /// Persisted theme, dark when unset or unreadable.
    pub fn theme(&self) -> Theme {
        self.get(THEME_KEY)
            .and_then(|t| t.parse().ok())
            .unwrap_or_default()
    }

    pub fn set_theme(&mut self, theme: Theme) -> Result<()> {
        self.set(THEME_KEY, theme.as_str())
    }

    fn flush(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(&self.values)?;
        fs::write(&self.path, json)
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("storage.json");

        let mut store = LocalStore::open(&path);
        store.set(API_KEY, "k-123").unwrap();
        store.set_theme(Theme::Light).unwrap();

        let reopened = LocalStore::open(&path);
        assert_eq!(reopened.api_key(), Some("k-123"));
        assert_eq!(reopened.theme(), Theme::Light);
    }

    #[test]
    fn malformed_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        fs::write(&path, "{not json").unwrap();

        let store = LocalStore::open(&path);
        assert_eq!(store.api_key(), None);
        assert_eq!(store.theme(), Theme::Dark);
    }

    #[test]
    fn blank_key_counts_as_missing() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = LocalStore::open(dir.path().join("s.json"));
        store.set(API_KEY, "   ").unwrap();
        assert_eq!(store.api_key(), None);
    }

    #[test]
    fn remove_deletes_key() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = LocalStore::open(dir.path().join("s.json"));
        store.set(API_KEY, "k").unwrap();
        store.remove(API_KEY).unwrap();
        assert_eq!(LocalStore::open(store.path()).get(API_KEY), None);
    }
}
