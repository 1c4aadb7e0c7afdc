//! CLI command implementations for passforge.
//!
//! Provides subcommand handlers for:
//! - `passforge generate [TYPE]` / `passforge analyze PASSWORD`
//! - `passforge controls [TYPE]` / `passforge presets`
//! - `passforge history` / `passforge history-clear`
//! - `passforge key set|clear|status|bootstrap` / `passforge theme`
//! - `passforge serve` / `passforge cache install|activate|list|clear`
//! - `passforge status`: config, server, key and cache health
//! - `passforge config show|init|set|reset`: configuration management
//!
//! The interactive session lives in [`shell`].

pub mod shell;

use std::io::{self, BufRead, Write};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use colored::Colorize;

use crate::analytics::EventLog;
use crate::api::{ApiClient, PassforgeApi};
use crate::cache::{self, CacheStorage, CacheWorker, UreqFetcher};
use crate::clipboard::SystemClipboard;
use crate::config::{self, PassforgeConfig};
use crate::generator::{FieldValue, GeneratorType, preset_label};
use crate::history::{self, HistoryView};
use crate::state::{AppState, DetailPanel, Level, Theme};
use crate::storage::{API_KEY, LocalStore};
use crate::view::{
    HtmlSurface, JsonSurface, Surface, TerminalSurface, controls_view, history_rows,
    key_badge, password_view,
};
use crate::workflow::{self, GenerationController};

/// Output format for rendered views.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
    Html,
}

impl OutputFormat {
    pub fn from_str_opt(s: Option<&str>) -> Self {
        match s {
            Some("json") => Self::Json,
            Some("html") => Self::Html,
            _ => Self::Text,
        }
    }
}

fn make_surface(format: OutputFormat, theme: Theme) -> Box<dyn Surface> {
    match format {
        OutputFormat::Text => Box::new(TerminalSurface::new(io::stdout(), theme)),
        OutputFormat::Json => Box::new(JsonSurface::new(io::stdout())),
        OutputFormat::Html => Box::new(HtmlSurface::new(io::stdout())),
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Everything a command needs: resolved config, API client, persisted
/// client state and the event log.
pub struct Session {
    pub config: PassforgeConfig,
    pub api: ApiClient,
    pub store: LocalStore,
    pub events: EventLog,
}

impl Session {
    pub fn load() -> Result<Self> {
        let config = config::load();
        Ok(Self {
            api: ApiClient::from_config(&config.server),
            store: LocalStore::open_default()?,
            events: EventLog::from_config(&config.logging),
            config,
        })
    }

    /// Key for history requests: the stored one, else the shared default.
    pub fn api_key(&self) -> String {
        self.store
            .api_key()
            .unwrap_or(self.config.server.default_api_key.as_str())
            .to_string()
    }

    pub fn new_state(&self, ty: GeneratorType) -> AppState {
        let mut state = AppState::new(ty, self.config.history.max_entries);
        state.theme = self.store.theme();
        state
    }

    pub fn controller(&self, server_log: bool) -> GenerationController {
        GenerationController::new(self.events.clone(), server_log)
    }

    pub fn history_view(&self, limit: Option<usize>) -> HistoryView {
        HistoryView::new(
            limit.unwrap_or(self.config.history.limit),
            self.events.clone(),
        )
    }
}

/// Print pending notifications; on failure, turn the danger ones into the
/// command's error.
fn settle(state: &mut AppState, surface: &mut dyn Surface, ok: bool) -> Result<()> {
    let notes = state.drain_notifications();
    let mut errors = Vec::new();
    for note in &notes {
        if !ok && note.level == Level::Danger {
            errors.push(note.message.as_str());
        } else {
            surface.notification(note)?;
        }
    }
    if ok {
        return Ok(());
    }
    if errors.is_empty() {
        bail!("operation failed");
    }
    bail!("{}", errors.join("; "))
}

/// Parse `--set key=value` arguments.
fn parse_assignments(raw: &[String]) -> Result<Vec<(&str, &str)>> {
    raw.iter()
        .map(|s| {
            s.split_once('=')
                .map(|(k, v)| (k.trim(), v))
                .with_context(|| format!("expected key=value, got '{s}'"))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// passforge generate / analyze
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    pub generator: Option<GeneratorType>,
    pub sets: Vec<String>,
    pub preset: Option<String>,
    pub no_log: bool,
    pub copy: bool,
    pub qr_out: Option<std::path::PathBuf>,
}

/// Generate one credential.
pub fn run_generate(opts: GenerateOptions, format: OutputFormat) -> Result<()> {
    let session = Session::load()?;
    let ty = opts
        .generator
        .unwrap_or(session.config.generate.default_type);
    let mut state = session.new_state(ty);
    state.select_type(ty);
    let mut surface = make_surface(format, state.theme);

    if let Some(name) = opts.preset.as_deref().filter(|n| !n.is_empty()) {
        if !workflow::load_presets(&mut state, &session.api) {
            return settle(&mut state, surface.as_mut(), false);
        }
        state.apply_preset(name)?;
    }
    for (field, value) in parse_assignments(&opts.sets)? {
        state
            .set_field(field, value)
            .with_context(|| format!("cannot set {field}"))?;
    }

    let controller = session.controller(session.config.generate.log && !opts.no_log);
    let outcome = controller.trigger(&mut state, &session.api);
    if !outcome.is_success() {
        return settle(&mut state, surface.as_mut(), false);
    }

    surface.password(&password_view(&state))?;

    if let Some(path) = &opts.qr_out {
        write_qr(&state, path)?;
        state.notify(format!("QR code written to {}", path.display()), Level::Success);
    }
    if opts.copy || session.config.generate.copy {
        workflow::copy_last(&mut state, &SystemClipboard::default());
    }

    settle(&mut state, surface.as_mut(), true)
}

fn write_qr(state: &AppState, path: &Path) -> Result<()> {
    let DetailPanel::Qr(png) = &state.display.panel else {
        bail!("{} does not produce a QR code", state.current_type);
    };
    let bytes = BASE64
        .decode(png.trim())
        .context("server sent an invalid QR image")?;
    std::fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))
}

/// Analyze a password's strength.
pub fn run_analyze(password: &str, format: OutputFormat) -> Result<()> {
    let session = Session::load()?;
    let mut state = session.new_state(GeneratorType::Analyze);
    state.select_type(GeneratorType::Analyze);
    state.set_value("password", FieldValue::Text(password.to_string()))?;
    let mut surface = make_surface(format, state.theme);

    let outcome = session.controller(false).trigger(&mut state, &session.api);
    if outcome.is_success() {
        surface.password(&password_view(&state))?;
    }
    settle(&mut state, surface.as_mut(), outcome.is_success())
}

// ---------------------------------------------------------------------------
// passforge controls / presets
// ---------------------------------------------------------------------------

/// Render the control panel of a generator with its current values.
pub fn run_controls(generator: Option<GeneratorType>, format: OutputFormat) -> Result<()> {
    let session = Session::load()?;
    let ty = generator.unwrap_or(session.config.generate.default_type);
    let mut state = session.new_state(ty);
    state.select_type(ty);
    let mut surface = make_surface(format, state.theme);

    let needs_presets = crate::generator::control_schema(ty)
        .iter()
        .any(|spec| matches!(spec.kind, crate::generator::FieldKind::Preset));
    if needs_presets && !workflow::load_presets(&mut state, &session.api) {
        // Still render: the select then only offers the manual entry.
        for note in state.drain_notifications() {
            surface.notification(&crate::state::Notification {
                level: Level::Warning,
                ..note
            })?;
        }
    }

    surface.controls(&ty.page_title(), &controls_view(&state))?;
    settle(&mut state, surface.as_mut(), true)
}

/// List the presets offered by the server.
pub fn run_presets(format: OutputFormat) -> Result<()> {
    let session = Session::load()?;
    let mut state = session.new_state(GeneratorType::Random);
    if !workflow::load_presets(&mut state, &session.api) {
        let mut surface = make_surface(format, state.theme);
        return settle(&mut state, surface.as_mut(), false);
    }

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&state.presets)?);
        }
        _ => {
            println!("{}", "Security Presets".bold().cyan());
            println!("{}", "=".repeat(50));
            if state.presets.is_empty() {
                println!("{}", "The server offers no presets.".yellow());
            }
            for (name, preset) in &state.presets {
                let fields = preset
                    .iter()
                    .filter(|(k, _)| k.as_str() != "command")
                    .map(|(k, v)| format!("{k}={v}"))
                    .collect::<Vec<_>>()
                    .join(" ");
                println!("  {:<14} {}", preset_label(name).bold(), fields.dimmed());
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// passforge history / history-clear
// ---------------------------------------------------------------------------

/// Fetch and show the server history, optionally copying one entry.
pub fn run_history(
    search: Option<String>,
    limit: Option<usize>,
    copy: Option<usize>,
    format: OutputFormat,
) -> Result<()> {
    let session = Session::load()?;
    let mut state = session.new_state(GeneratorType::Random);
    state.search_query = search.unwrap_or_default();
    let mut surface = make_surface(format, state.theme);

    let view = session.history_view(limit);
    let ok = view.refresh(&mut state, &session.api, &session.api_key());
    surface.key_badge(&key_badge(state.key_status))?;
    if !ok {
        return settle(&mut state, surface.as_mut(), false);
    }

    surface.history(&history_rows(&state))?;

    let copied = match copy {
        Some(index) => history::copy_entry(&mut state, index, &SystemClipboard::default()),
        None => true,
    };
    settle(&mut state, surface.as_mut(), copied)
}

/// Clear the server history after confirmation.
pub fn run_history_clear(yes: bool) -> Result<()> {
    let session = Session::load()?;
    let mut state = session.new_state(GeneratorType::Random);
    let mut surface = make_surface(OutputFormat::Text, state.theme);

    let view = session.history_view(None);
    let confirmed = || yes || confirm("Clear ALL history on the server? This cannot be undone.");
    if !view.clear_all(&mut state, &session.api, &session.api_key(), confirmed) {
        if state.notifications().is_empty() {
            println!("{}", "Cancelled.".dimmed());
            return Ok(());
        }
        return settle(&mut state, surface.as_mut(), false);
    }
    settle(&mut state, surface.as_mut(), true)
}

/// Ask a yes/no question on stdin. Anything but `y`/`yes` is a no.
pub(crate) fn confirm(question: &str) -> bool {
    print!("{question} [y/N] ");
    let _ = io::stdout().flush();
    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

// ---------------------------------------------------------------------------
// passforge key / theme
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyAction {
    Set(String),
    Clear,
    Status,
    Bootstrap,
}

/// Manage the history API key.
pub fn run_key(action: KeyAction) -> Result<()> {
    let mut session = Session::load()?;
    let mut state = session.new_state(GeneratorType::Random);
    let mut surface = make_surface(OutputFormat::Text, state.theme);

    match action {
        KeyAction::Set(value) => {
            let value = value.trim();
            if value.is_empty() {
                session.store.remove(API_KEY)?;
            } else {
                session.store.set(API_KEY, value)?;
            }
            state.notify("Security key updated!", Level::Success);
        }
        KeyAction::Clear => {
            session.store.remove(API_KEY)?;
            state.notify("Security key removed", Level::Success);
        }
        KeyAction::Status => {}
        KeyAction::Bootstrap => {
            let default_key = session.config.server.default_api_key.clone();
            if !workflow::bootstrap_key(&mut state, &session.api, &mut session.store, &default_key)
                && session.store.api_key().is_none()
            {
                state.notify("Server offered no key for this client", Level::Warning);
            }
        }
    }

    session
        .history_view(None)
        .check_key_status(&mut state, &session.api, &session.api_key());
    surface.key_badge(&key_badge(state.key_status))?;
    settle(&mut state, surface.as_mut(), true)
}

/// Show, set or toggle the persisted theme.
pub fn run_theme(choice: Option<&str>) -> Result<()> {
    let mut store = LocalStore::open_default()?;
    let current = store.theme();
    let next = match choice {
        None => current,
        Some("toggle") => current.toggled(),
        Some(name) => name.parse::<Theme>()?,
    };
    if next != current || choice.is_some() {
        store.set_theme(next)?;
    }
    println!("{} {}", "Theme:".bold(), next.label());
    Ok(())
}

// ---------------------------------------------------------------------------
// passforge serve / cache
// ---------------------------------------------------------------------------

fn cache_worker(session: &Session) -> Result<CacheWorker<UreqFetcher>> {
    let fetcher = UreqFetcher::new(Duration::from_millis(session.config.server.timeout_ms));
    CacheWorker::from_config(&session.config, fetcher, session.events.clone())
}

/// Run the offline caching proxy.
pub fn run_serve(addr: Option<&str>) -> Result<()> {
    let session = Session::load()?;
    let worker = cache_worker(&session)?;
    let addr = addr.unwrap_or(session.config.cache.listen.as_str());
    cache::server::serve(&worker, addr)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheAction {
    Install,
    Activate,
    List,
    Clear,
}

/// Drive the cache lifecycle by hand.
pub fn run_cache(action: CacheAction) -> Result<()> {
    let session = Session::load()?;
    let worker = cache_worker(&session)?;

    match action {
        CacheAction::Install => {
            let report = worker.install()?;
            println!(
                "{} Installed {} ({} assets)",
                "✓".green().bold(),
                worker.version().bold(),
                report.cached.len()
            );
            for (url, reason) in &report.skipped {
                println!("  {} {} {}", "!".yellow(), url, reason.dimmed());
            }
        }
        CacheAction::Activate => {
            let deleted = worker.activate()?;
            if deleted.is_empty() {
                println!("{}", "No old caches to remove.".dimmed());
            }
            for name in deleted {
                println!("  {} removed {}", "✓".green(), name);
            }
        }
        CacheAction::List => print_cache_list(worker.storage(), worker.version())?,
        CacheAction::Clear => {
            println!("{}", "Force refreshing app...".yellow());
            let deleted = cache::clear_all(worker.storage())?;
            session.events.ok("cache_clear", None);
            println!(
                "{} Removed {} cache(s)",
                "✓".green().bold(),
                deleted.len()
            );
        }
    }
    Ok(())
}

fn print_cache_list(storage: &CacheStorage, current: &str) -> Result<()> {
    let names = storage.keys()?;
    if names.is_empty() {
        println!(
            "{}",
            "No caches yet. Run `passforge cache install`.".yellow()
        );
        return Ok(());
    }
    for name in names {
        let urls = storage.open(&name)?.urls()?;
        let marker = if name == current {
            "current".green().to_string()
        } else {
            "stale".red().to_string()
        };
        println!("{} ({marker}, {} entries)", name.bold(), urls.len());
        for url in urls {
            println!("    {}", url.dimmed());
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// passforge status
// ---------------------------------------------------------------------------

/// One line of `passforge status`.
struct Check {
    name: &'static str,
    ok: bool,
    detail: String,
}

impl Check {
    fn new(name: &'static str, ok: bool, detail: impl Into<String>) -> Self {
        Self {
            name,
            ok,
            detail: detail.into(),
        }
    }

    fn print(&self) {
        let mark = if self.ok { "ok".green() } else { "!!".red() };
        println!("  [{}] {:<16} {}", mark.bold(), self.name, self.detail.dimmed());
    }
}

/// Path and existence of an optional config file.
fn config_file_state(path: Option<std::path::PathBuf>) -> (bool, String) {
    match path {
        Some(path) => (path.exists(), path.display().to_string()),
        None => (false, "(no location)".to_string()),
    }
}

/// Check config files, server reachability, key and cache state.
pub fn run_status() -> Result<()> {
    let session = Session::load()?;
    let mut checks = Vec::new();

    let (global, global_path) = config_file_state(config::global_config_file());
    checks.push(Check::new(
        "Global config",
        global,
        if global {
            global_path
        } else {
            format!("{global_path} missing; `passforge config init` writes it")
        },
    ));
    let (project, project_path) = config_file_state(config::project_config_file());
    checks.push(Check::new(
        "Project config",
        true,
        if project { project_path } else { "none".to_string() },
    ));

    let base_url = session.api.base_url();
    let presets = session.api.presets();
    let reachable = presets.is_ok();
    checks.push(match presets {
        Ok(p) => Check::new("Server", true, format!("{base_url}, {} presets", p.len())),
        Err(e) => Check::new("Server", false, format!("{base_url}: {e}")),
    });

    let stored = session.store.api_key().is_some();
    checks.push(Check::new(
        "API key",
        stored,
        if stored {
            "stored"
        } else {
            "shared default; try `passforge key bootstrap`"
        },
    ));
    if reachable {
        let mut state = session.new_state(GeneratorType::Random);
        let badge = key_badge(session.history_view(None).check_key_status(
            &mut state,
            &session.api,
            &session.api_key(),
        ));
        checks.push(Check::new(
            "History",
            badge.unlocked == Some(true),
            badge.text,
        ));
    }

    checks.push(Check::new("Theme", true, session.store.theme().label()));

    let cache_cfg = &session.config.cache;
    let storage = CacheStorage::new(config::expand_tilde(&cache_cfg.dir));
    let installed = storage.has(&cache_cfg.version);
    checks.push(Check::new(
        "Offline cache",
        installed,
        if installed {
            format!("{} ready", cache_cfg.version)
        } else {
            format!("{} absent; `passforge cache install` fetches it", cache_cfg.version)
        },
    ));

    checks.push(match session.events.path() {
        None => Check::new("Event log", true, "off"),
        Some(path) if path.exists() => Check::new(
            "Event log",
            true,
            format!("{} events in {}", session.events.read_all().len(), path.display()),
        ),
        Some(path) => Check::new("Event log", true, format!("{} (empty)", path.display())),
    });

    println!("{}", "passforge status".bold().cyan());
    for check in &checks {
        check.print();
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// passforge config show | init | set | reset
// ---------------------------------------------------------------------------

/// Print the merged configuration followed by the layers it came from.
pub fn run_config_show() -> Result<()> {
    println!("{}", config::show_effective_config()?);

    println!("{}", "# layers, lowest first".dimmed());
    println!("{}", "#   built-in defaults".dimmed());
    for path in [config::global_config_file(), config::project_config_file()] {
        let (exists, shown) = config_file_state(path);
        let state = if exists { "loaded" } else { "absent" };
        println!("{}", format!("#   {shown} ({state})").dimmed());
    }
    println!("{}", "#   PASSFORGE_* environment".dimmed());
    Ok(())
}

pub fn run_config_init(force: bool) -> Result<()> {
    let path = config::init_config(force)?;
    println!("{} wrote {}", "config:".green().bold(), path.display());
    Ok(())
}

pub fn run_config_set(key: &str, value: &str) -> Result<()> {
    config::set_config_value(key, value)?;
    println!("{} {key} = {value}", "config:".green().bold());
    Ok(())
}

pub fn run_config_reset() -> Result<()> {
    let path = config::reset_config()?;
    println!("{} restored defaults in {}", "config:".green().bold(), path.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
