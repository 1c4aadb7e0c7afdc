//! Offline cache worker.
//!
//! Runs the install / activate / fetch lifecycle of an offline-first web
//! client against a versioned on-disk cache:
//!
//! - **install** fetches the core assets (all required) and the external
//!   assets (best-effort) concurrently and stores them under the current
//!   version.
//! - **activate** deletes every cache whose name is not the current version.
//! - **handle** answers a request: GETs from cache first, then the network,
//!   with an offline page for navigations and a synthesized 408 for
//!   everything else when the network is gone.
//!
//! [`server`] exposes the worker as a local HTTP proxy.

pub mod fetch;
pub mod server;
pub mod storage;

use std::thread;

use anyhow::{Context, Result, bail};
use regex::Regex;

pub use fetch::{Fetcher, UreqFetcher};
pub use storage::{Cache, CacheStorage};

use crate::analytics::EventLog;
use crate::config::expand_tilde;
use crate::config::schema::PassforgeConfig;

/// Status of the response synthesized when the network is unreachable.
pub const NETWORK_ERROR_STATUS: u16 = 408;
pub const NETWORK_ERROR_BODY: &str = "Network error";

// ---------------------------------------------------------------------------
// Requests and responses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub method: String,
    /// Absolute URL.
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    /// Top-level page load, as opposed to a subresource.
    pub navigate: bool,
}

impl FetchRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: "GET".to_string(),
            url: url.into(),
            headers: Vec::new(),
            body: Vec::new(),
            navigate: false,
        }
    }

    pub fn navigation(url: impl Into<String>) -> Self {
        Self {
            navigate: true,
            ..Self::get(url)
        }
    }

    pub fn is_get(&self) -> bool {
        self.method.eq_ignore_ascii_case("GET")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn text(status: u16, content_type: &str, body: &str) -> Self {
        Self {
            status,
            headers: vec![("Content-Type".to_string(), content_type.to_string())],
            body: body.as_bytes().to_vec(),
        }
    }

    /// The 408 answer for requests that could not reach the network.
    pub fn network_error() -> Self {
        Self::text(
            NETWORK_ERROR_STATUS,
            "text/plain; charset=utf-8",
            NETWORK_ERROR_BODY,
        )
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Resolve a request target against the app origin.
///
/// Absolute-form targets (`http://...`, `https://...`) pass through;
/// anything else is a path on the origin.
pub fn resolve_url(origin: &str, target: &str) -> String {
    if target.starts_with("http://") || target.starts_with("https://") {
        return target.to_string();
    }
    let origin = origin.trim_end_matches('/');
    if target.starts_with('/') {
        format!("{origin}{target}")
    } else {
        format!("{origin}/{target}")
    }
}

/// The URL up to its query string, for log lines.
pub fn without_query(url: &str) -> &str {
    url.split_once('?').map_or(url, |(path, _)| path)
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

/// What an installation stored and what it had to skip.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    pub cached: Vec<String>,
    /// External assets that could not be fetched, with the reason.
    pub skipped: Vec<(String, String)>,
}

pub struct CacheWorker<F: Fetcher> {
    storage: CacheStorage,
    version: String,
    origin: String,
    core_assets: Vec<String>,
    external_assets: Vec<String>,
    external_hosts: Vec<Regex>,
    offline_page: String,
    fetcher: F,
    events: EventLog,
}

impl<F: Fetcher> CacheWorker<F> {
    pub fn from_config(config: &PassforgeConfig, fetcher: F, events: EventLog) -> Result<Self> {
        let external_hosts = config
            .cache
            .external_hosts
            .iter()
            .map(|pattern| {
                Regex::new(pattern).with_context(|| format!("invalid external_hosts pattern '{pattern}'"))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            storage: CacheStorage::new(expand_tilde(&config.cache.dir)),
            version: config.cache.version.clone(),
            origin: config.server.base_url.trim_end_matches('/').to_string(),
            core_assets: config.cache.core_assets.clone(),
            external_assets: config.cache.external_assets.clone(),
            external_hosts,
            offline_page: config.cache.offline_page.clone(),
            fetcher,
            events,
        })
    }

    pub fn storage(&self) -> &CacheStorage {
        &self.storage
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Populate the current cache.
    ///
    /// Every asset is fetched on its own thread and all are joined before
    /// anything is decided. A missing core asset fails the installation and
    /// stores nothing; external assets are stored independently.
    pub fn install(&self) -> Result<InstallReport> {
        let core_urls: Vec<String> = self
            .core_assets
            .iter()
            .map(|path| resolve_url(&self.origin, path))
            .collect();

        let (core, external) = thread::scope(|scope| {
            let core: Vec<_> = core_urls
                .iter()
                .map(|url| (url.clone(), scope.spawn(move || self.fetch_ok(url))))
                .collect();
            let external: Vec<_> = self
                .external_assets
                .iter()
                .map(|url| (url.clone(), scope.spawn(move || self.fetch_ok(url))))
                .collect();
            (join_all(core), join_all(external))
        });

        let failures: Vec<String> = core
            .iter()
            .filter_map(|(url, result)| result.as_ref().err().map(|e| format!("{url}: {e}")))
            .collect();
        if !failures.is_empty() {
            let message = failures.join("; ");
            self.events.error("cache_install", None, &message);
            bail!("cache install failed: {message}");
        }

        let cache = self.storage.open(&self.version)?;
        let mut report = InstallReport::default();

        for (url, result) in core {
            if let Ok(response) = result {
                cache.put(&url, &response)?;
                report.cached.push(url);
            }
        }
        for (url, result) in external {
            match result.and_then(|response| cache.put(&url, &response)) {
                Ok(()) => report.cached.push(url),
                Err(e) => report.skipped.push((url, format!("{e:#}"))),
            }
        }

        self.events.ok("cache_install", None);
        Ok(report)
    }

    fn fetch_ok(&self, url: &str) -> Result<HttpResponse> {
        let response = self.fetcher.fetch(&FetchRequest::get(url))?;
        if !response.is_success() {
            bail!("HTTP {}", response.status);
        }
        Ok(response)
    }

    /// Delete every cache except the current version. Returns the deleted
    /// names.
    pub fn activate(&self) -> Result<Vec<String>> {
        let mut deleted = Vec::new();
        for name in self.storage.keys()? {
            if name != self.version && self.storage.delete(&name)? {
                deleted.push(name);
            }
        }
        self.events.ok("cache_activate", None);
        Ok(deleted)
    }

    /// Answer one request.
    pub fn handle(&self, request: &FetchRequest) -> HttpResponse {
        if !request.is_get() {
            return match self.fetcher.fetch(request) {
                Ok(response) => response,
                Err(_) => self.offline_response(request),
            };
        }

        if let Ok(Some(hit)) = self.storage.match_any(&request.url) {
            return hit;
        }

        match self.fetcher.fetch(request) {
            Ok(response) => {
                if response.is_success() && self.is_cacheable_external(&request.url) {
                    let _ = self
                        .storage
                        .open(&self.version)
                        .and_then(|cache| cache.put(&request.url, &response));
                }
                response
            }
            Err(_) => self.offline_response(request),
        }
    }

    fn offline_response(&self, request: &FetchRequest) -> HttpResponse {
        if request.navigate {
            let offline_url = resolve_url(&self.origin, &self.offline_page);
            if let Ok(Some(page)) = self.storage.match_any(&offline_url) {
                return page;
            }
        }
        HttpResponse::network_error()
    }

    /// Fonts and scripts from the configured external hosts.
    pub fn is_cacheable_external(&self, url: &str) -> bool {
        self.external_hosts.iter().any(|re| re.is_match(url))
    }
}

/// Join every fetch; a thread that panicked counts as a failed fetch.
fn join_all(
    handles: Vec<(String, thread::ScopedJoinHandle<'_, Result<HttpResponse>>)>,
) -> Vec<(String, Result<HttpResponse>)> {
    handles
        .into_iter()
        .map(|(url, handle)| {
            let result = handle
                .join()
                .unwrap_or_else(|_| Err(anyhow::anyhow!("fetch thread panicked")));
            (url, result)
        })
        .collect()
}

/// Delete every cache, whatever its version.
pub fn clear_all(storage: &CacheStorage) -> Result<Vec<String>> {
    let mut deleted = Vec::new();
    for name in storage.keys()? {
        if storage.delete(&name)? {
            deleted.push(name);
        }
    }
    Ok(deleted)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;

    /// Serves canned responses; unknown URLs fail like a dead network.
    #[derive(Default)]
    struct FakeNetwork {
        routes: Mutex<HashMap<String, HttpResponse>>,
        offline: AtomicBool,
        requests: Mutex<Vec<String>>,
    }

    impl FakeNetwork {
        fn route(&self, url: &str, response: HttpResponse) {
            self.routes.lock().unwrap().insert(url.to_string(), response);
        }

        fn hits(&self, url: &str) -> usize {
            self.requests.lock().unwrap().iter().filter(|u| *u == url).count()
        }
    }

    impl Fetcher for &FakeNetwork {
        fn fetch(&self, request: &FetchRequest) -> Result<HttpResponse> {
            self.requests.lock().unwrap().push(request.url.clone());
            if self.offline.load(Ordering::SeqCst) {
                bail!("offline");
            }
            self.routes
                .lock()
                .unwrap()
                .get(&request.url)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("connection refused"))
        }
    }

    const ORIGIN: &str = "http://app.local";

    fn config(dir: &std::path::Path) -> PassforgeConfig {
        let mut config = PassforgeConfig::default();
        config.server.base_url = ORIGIN.to_string();
        config.cache.dir = dir.display().to_string();
        config.cache.version = "pf-v2".to_string();
        config.cache.core_assets = vec!["/".to_string(), "/offline.html".to_string()];
        config.cache.external_assets = vec![
            "https://unpkg.com/lucide@latest".to_string(),
            "https://fonts.googleapis.com/css2?family=Inter".to_string(),
        ];
        config
    }

    fn network_with_core() -> FakeNetwork {
        let net = FakeNetwork::default();
        net.route("http://app.local/", HttpResponse::text(200, "text/html", "<main>"));
        net.route(
            "http://app.local/offline.html",
            HttpResponse::text(200, "text/html", "<p>offline</p>"),
        );
        net
    }

    #[test]
    fn install_tolerates_external_failures() {
        let dir = tempfile::tempdir().unwrap();
        let net = network_with_core();
        net.route(
            "https://unpkg.com/lucide@latest",
            HttpResponse::text(200, "text/javascript", "lucide"),
        );
        let worker = CacheWorker::from_config(&config(dir.path()), &net, EventLog::disabled()).unwrap();

        let report = worker.install().unwrap();

        assert_eq!(report.cached.len(), 3);
        assert_eq!(report.skipped.len(), 1);
        assert!(report.skipped[0].0.contains("fonts.googleapis"));
        assert_eq!(worker.storage().keys().unwrap(), vec!["pf-v2".to_string()]);
    }

    #[test]
    fn install_fails_on_missing_core_asset() {
        let dir = tempfile::tempdir().unwrap();
        let net = FakeNetwork::default();
        net.route("http://app.local/", HttpResponse::text(200, "text/html", "<main>"));
        net.route(
            "http://app.local/offline.html",
            HttpResponse::text(404, "text/plain", "nope"),
        );
        let worker = CacheWorker::from_config(&config(dir.path()), &net, EventLog::disabled()).unwrap();

        let err = worker.install().unwrap_err();
        assert!(err.to_string().contains("offline.html"));
        assert!(worker.storage().keys().unwrap().is_empty());
    }

    /// Delegates to a [`FakeNetwork`] but panics while fetching one URL.
    struct PanicsOn<'a>(&'a FakeNetwork, &'static str);

    impl Fetcher for PanicsOn<'_> {
        fn fetch(&self, request: &FetchRequest) -> Result<HttpResponse> {
            if request.url == self.1 {
                panic!("fetch blew up");
            }
            (&self.0).fetch(request)
        }
    }

    #[test]
    fn panicked_core_fetch_fails_install() {
        let dir = tempfile::tempdir().unwrap();
        let net = network_with_core();
        let fetcher = PanicsOn(&net, "http://app.local/offline.html");
        let worker = CacheWorker::from_config(&config(dir.path()), fetcher, EventLog::disabled()).unwrap();

        let err = worker.install().unwrap_err();
        assert!(err.to_string().contains("fetch thread panicked"));
        assert!(!worker.storage().has("pf-v2"));
    }

    #[test]
    fn activate_keeps_only_current_version() {
        let dir = tempfile::tempdir().unwrap();
        let net = FakeNetwork::default();
        let worker = CacheWorker::from_config(&config(dir.path()), &net, EventLog::disabled()).unwrap();
        for name in ["passforge-v1", "pf-v2", "other"] {
            worker.storage().open(name).unwrap();
        }

        let deleted = worker.activate().unwrap();

        assert_eq!(deleted, vec!["other".to_string(), "passforge-v1".to_string()]);
        assert_eq!(worker.storage().keys().unwrap(), vec!["pf-v2".to_string()]);
    }

    #[test]
    fn cached_get_skips_network() {
        let dir = tempfile::tempdir().unwrap();
        let net = network_with_core();
        let worker = CacheWorker::from_config(&config(dir.path()), &net, EventLog::disabled()).unwrap();
        worker.install().unwrap();

        let response = worker.handle(&FetchRequest::get("http://app.local/"));

        assert_eq!(response.body, b"<main>");
        assert_eq!(net.hits("http://app.local/"), 1);
    }

    #[test]
    fn external_font_is_cached_opportunistically() {
        let dir = tempfile::tempdir().unwrap();
        let net = FakeNetwork::default();
        let font = "https://fonts.gstatic.com/s/inter/v1.woff2";
        let api = "http://app.local/api/presets";
        net.route(font, HttpResponse::text(200, "font/woff2", "font"));
        net.route(api, HttpResponse::text(200, "application/json", "{}"));
        let worker = CacheWorker::from_config(&config(dir.path()), &net, EventLog::disabled()).unwrap();

        worker.handle(&FetchRequest::get(font));
        worker.handle(&FetchRequest::get(api));
        net.offline.store(true, Ordering::SeqCst);

        assert_eq!(worker.handle(&FetchRequest::get(font)).body, b"font");
        assert_eq!(worker.handle(&FetchRequest::get(api)).status, NETWORK_ERROR_STATUS);
    }

    #[test]
    fn failed_external_response_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let net = FakeNetwork::default();
        let script = "https://unpkg.com/missing";
        net.route(script, HttpResponse::text(404, "text/plain", "missing"));
        let worker = CacheWorker::from_config(&config(dir.path()), &net, EventLog::disabled()).unwrap();

        assert_eq!(worker.handle(&FetchRequest::get(script)).status, 404);
        assert!(worker.storage().keys().unwrap().is_empty());
    }

    #[test]
    fn offline_navigation_gets_offline_page() {
        let dir = tempfile::tempdir().unwrap();
        let net = network_with_core();
        let worker = CacheWorker::from_config(&config(dir.path()), &net, EventLog::disabled()).unwrap();
        worker.install().unwrap();
        net.offline.store(true, Ordering::SeqCst);

        let page = worker.handle(&FetchRequest::navigation("http://app.local/settings"));
        assert_eq!(page.body, b"<p>offline</p>");

        let asset = worker.handle(&FetchRequest::get("http://app.local/img/logo.png"));
        assert_eq!(asset, HttpResponse::network_error());
    }

    #[test]
    fn non_get_bypasses_cache() {
        let dir = tempfile::tempdir().unwrap();
        let net = network_with_core();
        let worker = CacheWorker::from_config(&config(dir.path()), &net, EventLog::disabled()).unwrap();
        worker.install().unwrap();

        let request = FetchRequest {
            method: "DELETE".to_string(),
            ..FetchRequest::get("http://app.local/")
        };
        worker.handle(&request);
        assert_eq!(net.hits("http://app.local/"), 2);
    }

    #[test]
    fn clear_all_removes_every_cache() {
        let dir = tempfile::tempdir().unwrap();
        let storage = CacheStorage::new(dir.path());
        storage.open("pf-v2").unwrap();
        storage.open("passforge-v1").unwrap();
        assert_eq!(clear_all(&storage).unwrap().len(), 2);
        assert!(storage.keys().unwrap().is_empty());
    }

    #[test]
    fn resolve_url_forms() {
        assert_eq!(resolve_url("http://h/", "/a.css"), "http://h/a.css");
        assert_eq!(resolve_url("http://h", "js/app.js"), "http://h/js/app.js");
        assert_eq!(resolve_url("http://h", "https://unpkg.com/x"), "https://unpkg.com/x");
    }

    #[test]
    fn query_is_dropped_for_logging() {
        assert_eq!(
            without_query("http://h/api/analyze?password=hunter2"),
            "http://h/api/analyze"
        );
        assert_eq!(without_query("http://h/js/app.js"), "http://h/js/app.js");
    }

    #[test]
    fn invalid_host_pattern_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path());
        config.cache.external_hosts = vec!["(".to_string()];
        let net = FakeNetwork::default();
        assert!(CacheWorker::from_config(&config, &net, EventLog::disabled()).is_err());
    }
}
