//! On-disk named caches.
//!
//! Layout: one directory per cache name under the storage root. Each entry
//! is two files named by the hex SHA-256 of its URL: `<key>.json` with the
//! URL, status and headers, `<key>.body` with the raw body. Lookups compare
//! the stored URL, not just the file name.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::HttpResponse;

#[derive(Debug, Serialize, Deserialize)]
struct EntryMeta {
    url: String,
    status: u16,
    headers: Vec<(String, String)>,
    stored_at: String,
}

/// All caches under one root directory.
#[derive(Debug, Clone)]
pub struct CacheStorage {
    root: PathBuf,
}

impl CacheStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Names of every existing cache, sorted.
    pub fn keys(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("failed to list {}", self.root.display()));
            }
        };

        let mut names: Vec<String> = entries
            .filter_map(Result::ok)
            .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .filter_map(|e| e.file_name().into_string().ok())
            .collect();
        names.sort();
        Ok(names)
    }

    pub fn has(&self, name: &str) -> bool {
        check_name(name).is_ok() && self.root.join(name).is_dir()
    }

    /// Open (creating if needed) the cache called `name`.
    pub fn open(&self, name: &str) -> Result<Cache> {
        check_name(name)?;
        let dir = self.root.join(name);
        fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;
        Ok(Cache {
            name: name.to_string(),
            dir,
        })
    }

    /// Delete a cache. Returns whether it existed.
    pub fn delete(&self, name: &str) -> Result<bool> {
        check_name(name)?;
        let dir = self.root.join(name);
        if !dir.is_dir() {
            return Ok(false);
        }
        fs::remove_dir_all(&dir).with_context(|| format!("failed to delete {}", dir.display()))?;
        Ok(true)
    }

    /// Look `url` up in every cache, in name order.
    pub fn match_any(&self, url: &str) -> Result<Option<HttpResponse>> {
        for name in self.keys()? {
            if let Some(hit) = self.open(&name)?.match_url(url)? {
                return Ok(Some(hit));
            }
        }
        Ok(None)
    }
}

fn check_name(name: &str) -> Result<()> {
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\'])
    {
        bail!("invalid cache name '{name}'");
    }
    Ok(())
}

/// One named cache.
#[derive(Debug, Clone)]
pub struct Cache {
    name: String,
    dir: PathBuf,
}

impl Cache {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn match_url(&self, url: &str) -> Result<Option<HttpResponse>> {
        let (meta_path, body_path) = self.entry_paths(url);
        let Ok(raw) = fs::read_to_string(&meta_path) else {
            return Ok(None);
        };
        let meta: EntryMeta = serde_json::from_str(&raw)
            .with_context(|| format!("corrupt cache entry {}", meta_path.display()))?;
        if meta.url != url {
            return Ok(None);
        }
        let body = fs::read(&body_path)
            .with_context(|| format!("missing cache body {}", body_path.display()))?;
        Ok(Some(HttpResponse {
            status: meta.status,
            headers: meta.headers,
            body,
        }))
    }

    /// Store `response` under `url`, replacing any previous entry.
    pub fn put(&self, url: &str, response: &HttpResponse) -> Result<()> {
        let (meta_path, body_path) = self.entry_paths(url);
        let meta = EntryMeta {
            url: url.to_string(),
            status: response.status,
            headers: response.headers.clone(),
            stored_at: Utc::now().to_rfc3339(),
        };
        // Body first: a meta file always points at a complete body.
        fs::write(&body_path, &response.body)
            .with_context(|| format!("failed to write {}", body_path.display()))?;
        fs::write(&meta_path, serde_json::to_string(&meta)?)
            .with_context(|| format!("failed to write {}", meta_path.display()))?;
        Ok(())
    }

    /// URLs of every entry, sorted.
    pub fn urls(&self) -> Result<Vec<String>> {
        let mut urls = Vec::new();
        for entry in fs::read_dir(&self.dir)?.filter_map(Result::ok) {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Ok(raw) = fs::read_to_string(&path)
                && let Ok(meta) = serde_json::from_str::<EntryMeta>(&raw)
            {
                urls.push(meta.url);
            }
        }
        urls.sort();
        Ok(urls)
    }

    fn entry_paths(&self, url: &str) -> (PathBuf, PathBuf) {
        let key = entry_key(url);
        (
            self.dir.join(format!("{key}.json")),
            self.dir.join(format!("{key}.body")),
        )
    }
}

/// Fixed-length file stem for a URL of any length.
fn entry_key(url: &str) -> String {
    format!("{:x}", Sha256::digest(url.as_bytes()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_match() {
        let dir = tempfile::tempdir().unwrap();
        let storage = CacheStorage::new(dir.path());
        let cache = storage.open("v1").unwrap();
        let response = HttpResponse::text(200, "text/css", "body{}");

        cache.put("http://h/css/style.css", &response).unwrap();

        assert_eq!(cache.match_url("http://h/css/style.css").unwrap(), Some(response));
        assert_eq!(cache.match_url("http://h/other").unwrap(), None);
        assert_eq!(cache.urls().unwrap(), vec!["http://h/css/style.css".to_string()]);
    }

    #[test]
    fn long_urls_get_fixed_length_names() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheStorage::new(dir.path()).open("fonts").unwrap();
        let url = format!(
            "https://fonts.googleapis.com/css2?family={}&display=swap",
            "Inter:wght@300;400;500;600;700|".repeat(10)
        );
        assert!(url.len() > 300);
        let response = HttpResponse::text(200, "text/css", "@font-face{}");

        cache.put(&url, &response).unwrap();

        assert_eq!(cache.match_url(&url).unwrap(), Some(response));
        assert_eq!(cache.urls().unwrap(), vec![url]);
        assert_eq!(entry_key("a").len(), 64);
    }

    #[test]
    fn entry_for_other_url_is_not_a_hit() {
        let dir = tempfile::tempdir().unwrap();
        let cache = CacheStorage::new(dir.path()).open("v1").unwrap();
        cache
            .put("http://h/a", &HttpResponse::text(200, "text/plain", "a"))
            .unwrap();
        // Point b's meta file at a's entry.
        let (a_meta, _) = cache.entry_paths("http://h/a");
        let (b_meta, b_body) = cache.entry_paths("http://h/b");
        fs::copy(&a_meta, &b_meta).unwrap();
        fs::write(&b_body, "a").unwrap();

        assert_eq!(cache.match_url("http://h/b").unwrap(), None);
    }

    #[test]
    fn keys_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let storage = CacheStorage::new(dir.path().join("missing-yet"));
        assert!(storage.keys().unwrap().is_empty());

        storage.open("b").unwrap();
        storage.open("a").unwrap();
        assert_eq!(storage.keys().unwrap(), vec!["a".to_string(), "b".to_string()]);

        assert!(storage.delete("a").unwrap());
        assert!(!storage.delete("a").unwrap());
        assert_eq!(storage.keys().unwrap(), vec!["b".to_string()]);
    }

    #[test]
    fn match_any_searches_all_caches() {
        let dir = tempfile::tempdir().unwrap();
        let storage = CacheStorage::new(dir.path());
        storage.open("empty").unwrap();
        storage
            .open("fonts")
            .unwrap()
            .put("https://fonts.gstatic.com/x.woff2", &HttpResponse::text(200, "font/woff2", "w"))
            .unwrap();

        let hit = storage.match_any("https://fonts.gstatic.com/x.woff2").unwrap();
        assert_eq!(hit.unwrap().body, b"w");
    }

    #[test]
    fn path_like_names_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let storage = CacheStorage::new(dir.path());
        assert!(storage.open("../escape").is_err());
        assert!(storage.delete("..").is_err());
        assert!(!storage.has("a/b"));
    }
}
