//! Interactive session.
//!
//! Input lines and settled history searches arrive on one channel and are
//! handled in order on the main thread, so the state has a single owner.
//! Search keystrokes go through a [`Debouncer`]; only the last query of a
//! burst reaches the server.

use std::io::{self, BufRead, Write};
use std::sync::mpsc::{self, Sender};
use std::thread;
use std::time::Duration;

use anyhow::Result;
use colored::Colorize;

use super::Session;
use crate::api::PassforgeApi;
use crate::clipboard::{Clipboard, SystemClipboard};
use crate::generator::{GeneratorType, preset_label};
use crate::history::{self, Debouncer, HistoryView};
use crate::state::{AppState, Level};
use crate::storage::{API_KEY, LocalStore};
use crate::view::{Surface, TerminalSurface, controls_view, history_rows, key_badge, password_view};
use crate::workflow::{self, GenerationController};

pub enum Event {
    Line(String),
    /// The search input has been quiet for the debounce period.
    SearchSettled(String),
    Eof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

const HELP: &str = "\
Commands:
  generate | g | <enter>   generate again (or analyze)
  type <name>              switch generator (types: list them)
  controls                 show the options of the current generator
  set <field> <value>      change an option
  preset [name]            apply a preset (no name: Custom (Manual))
  copy [n]                 copy the last result, or history entry n
  history                  sync and show the history
  search <text>            filter the history as you type
  clear-history            delete the server history (asks first)
  key <value>              store the history API key
  theme                    toggle dark/light
  quit                     leave";

pub struct Shell<'a> {
    state: AppState,
    api: &'a dyn PassforgeApi,
    store: &'a mut LocalStore,
    clipboard: &'a dyn Clipboard,
    controller: GenerationController,
    history: HistoryView,
    search: Debouncer<String>,
    surface: Box<dyn Surface + 'a>,
    default_key: String,
    awaiting_confirm: bool,
}

/// Run the shell on stdin/stdout until `quit` or end of input.
pub fn run() -> Result<()> {
    let mut session = Session::load()?;
    let (tx, rx) = mpsc::channel();

    spawn_input_reader(tx.clone());
    let search_tx = tx;
    let search = Debouncer::new(
        Duration::from_millis(session.config.history.debounce_ms),
        move |query| {
            let _ = search_tx.send(Event::SearchSettled(query));
        },
    );

    let state = session.new_state(session.config.generate.default_type);
    let theme = state.theme;
    let controller = session.controller(session.config.generate.log);
    let history = session.history_view(None);
    let default_key = session.config.server.default_api_key.clone();
    let Session { api, store, .. } = &mut session;
    let clipboard = SystemClipboard::default();

    let mut shell = Shell {
        state,
        api: &*api,
        store,
        clipboard: &clipboard,
        controller,
        history,
        search,
        surface: Box::new(TerminalSurface::new(io::stdout(), theme)),
        default_key,
        awaiting_confirm: false,
    };

    println!("{}", "PassForge interactive shell (type `help`)".bold().cyan());
    shell.start()?;
    shell.prompt();

    for event in rx {
        if shell.handle_event(event)? == Flow::Quit {
            break;
        }
        shell.prompt();
    }
    Ok(())
}

fn spawn_input_reader(tx: Sender<Event>) {
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(Event::Line(line)).is_err() {
                return;
            }
        }
        let _ = tx.send(Event::Eof);
    });
}

impl Shell<'_> {
    /// Startup sequence: presets, key bootstrap and badge, first result,
    /// history.
    pub fn start(&mut self) -> Result<()> {
        workflow::load_presets(&mut self.state, self.api);
        workflow::bootstrap_key(&mut self.state, self.api, self.store, &self.default_key);
        let key = self.api_key();
        self.history
            .check_key_status(&mut self.state, self.api, &key);
        self.surface.key_badge(&key_badge(self.state.key_status))?;

        self.show_controls()?;
        self.trigger()?;
        self.history.refresh(&mut self.state, self.api, &key);
        self.flush()
    }

    fn api_key(&self) -> String {
        self.store
            .api_key()
            .unwrap_or(self.default_key.as_str())
            .to_string()
    }

    fn prompt(&self) {
        let label = if self.awaiting_confirm {
            "Clear ALL history? [y/N]".to_string()
        } else {
            format!("passforge[{}]>", self.state.current_type)
        };
        print!("{} ", label.bold());
        let _ = io::stdout().flush();
    }

    pub fn handle_event(&mut self, event: Event) -> Result<Flow> {
        let flow = match event {
            Event::Line(line) => self.handle_line(&line)?,
            Event::SearchSettled(query) => {
                self.state.search_query = query;
                let key = self.api_key();
                if self.history.refresh(&mut self.state, self.api, &key) {
                    self.surface.history(&history_rows(&self.state))?;
                }
                Flow::Continue
            }
            Event::Eof => Flow::Quit,
        };
        self.flush()?;
        Ok(flow)
    }

    pub fn handle_line(&mut self, line: &str) -> Result<Flow> {
        if self.awaiting_confirm {
            self.awaiting_confirm = false;
            let yes = matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes");
            let key = self.api_key();
            if !self
                .history
                .clear_all(&mut self.state, self.api, &key, || yes)
                && !yes
            {
                self.state.notify("Cancelled", Level::Warning);
            }
            return Ok(Flow::Continue);
        }

        let line = line.trim();
        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
        let rest = rest.trim();

        match command {
            "" | "g" | "generate" => self.trigger()?,
            "help" | "?" => println!("{HELP}"),
            "quit" | "exit" | "q" => return Ok(Flow::Quit),
            "types" => {
                for ty in GeneratorType::ALL {
                    println!("  {:<10} {}", ty.as_str().bold(), ty.title().dimmed());
                }
            }
            "type" => match rest.parse::<GeneratorType>() {
                Ok(ty) => {
                    self.search.cancel();
                    self.state.select_type(ty);
                    self.show_controls()?;
                    if ty.is_analyze() {
                        self.surface.password(&password_view(&self.state))?;
                    } else {
                        self.trigger()?;
                    }
                }
                Err(e) => self.state.notify(e.to_string(), Level::Danger),
            },
            "controls" => self.show_controls()?,
            "set" => {
                let (field, value) = rest.split_once(' ').unwrap_or((rest, ""));
                match self.state.set_field(field, value) {
                    Ok(()) => self.show_controls()?,
                    Err(e) => self.state.notify(e.to_string(), Level::Danger),
                }
            }
            "preset" => {
                let outcome = self.controller.select_preset(&mut self.state, self.api, rest);
                if outcome.is_some_and(|o| o.is_success()) {
                    self.show_controls()?;
                    self.surface.password(&password_view(&self.state))?;
                } else if rest.is_empty() {
                    self.state.notify(
                        format!(
                            "Presets: {}",
                            self.state
                                .presets
                                .keys()
                                .map(|name| preset_label(name))
                                .collect::<Vec<_>>()
                                .join(", ")
                        ),
                        Level::Success,
                    );
                }
            }
            "copy" => {
                if rest.is_empty() {
                    workflow::copy_last(&mut self.state, self.clipboard);
                } else {
                    match rest.parse::<usize>() {
                        Ok(index) => {
                            history::copy_entry(&mut self.state, index, self.clipboard);
                        }
                        Err(_) => self
                            .state
                            .notify(format!("not a history index: '{rest}'"), Level::Danger),
                    }
                }
            }
            "history" => {
                self.search.cancel();
                let key = self.api_key();
                self.history.refresh(&mut self.state, self.api, &key);
                self.surface.key_badge(&key_badge(self.state.key_status))?;
                self.surface.history(&history_rows(&self.state))?;
            }
            "search" => self.search.push(rest.to_string()),
            "clear-history" => self.awaiting_confirm = true,
            "key" => {
                if rest.is_empty() {
                    self.store.remove(API_KEY)?;
                } else {
                    self.store.set(API_KEY, rest)?;
                }
                self.state.notify("Security key updated!", Level::Success);
                let key = self.api_key();
                self.history
                    .check_key_status(&mut self.state, self.api, &key);
                self.surface.key_badge(&key_badge(self.state.key_status))?;
            }
            "theme" => {
                let theme = self.state.toggle_theme();
                self.store.set_theme(theme)?;
                self.state
                    .notify(format!("Theme: {}", theme.label()), Level::Success);
            }
            other => self
                .state
                .notify(format!("unknown command '{other}' (try `help`)"), Level::Danger),
        }
        Ok(Flow::Continue)
    }

    fn trigger(&mut self) -> Result<()> {
        let outcome = self.controller.trigger(&mut self.state, self.api);
        if outcome.is_success() {
            self.surface.password(&password_view(&self.state))?;
        }
        Ok(())
    }

    fn show_controls(&mut self) -> Result<()> {
        let title = self.state.current_type.page_title();
        self.surface.controls(&title, &controls_view(&self.state))
    }

    fn flush(&mut self) -> Result<()> {
        for note in self.state.drain_notifications() {
            self.surface.notification(&note)?;
        }
        Ok(())
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::analytics::EventLog;
    use crate::api::{
        AnalyzeResponse, ApiError, BootstrapResponse, GenerateRequest, GenerateResponse,
        HistoryQuery,
    };
    use crate::generator::Presets;
    use crate::state::{HistoryEntry, KeyStatus, Notification};
    use crate::view::{ControlView, HistoryRow, KeyBadge, PasswordView};

    struct Backend {
        searches: RefCell<Vec<String>>,
    }

    impl PassforgeApi for Backend {
        fn presets(&self) -> Result<Presets, ApiError> {
            let mut presets = Presets::new();
            let preset = serde_json::json!({ "length": 32, "command": "gen" });
            presets.insert("paranoid".into(), preset.as_object().unwrap().clone());
            Ok(presets)
        }
        fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, ApiError> {
            Ok(GenerateResponse {
                password: format!("pw-{}", request.generator_type),
                entropy: 42.0,
                generator_type: request.generator_type.to_string(),
                qr: None,
            })
        }
        fn analyze(&self, _: &str) -> Result<AnalyzeResponse, ApiError> {
            Err(ApiError::Transport("down".into()))
        }
        fn history(&self, query: &HistoryQuery, _: &str) -> Result<Vec<HistoryEntry>, ApiError> {
            self.searches.borrow_mut().push(query.search.clone());
            Ok(Vec::new())
        }
        fn clear_history(&self, _: &str) -> Result<(), ApiError> {
            Ok(())
        }
        fn bootstrap(&self) -> Result<BootstrapResponse, ApiError> {
            Err(ApiError::Server {
                status: 403,
                detail: "remote".into(),
            })
        }
    }

    struct NullClipboard;

    impl Clipboard for NullClipboard {
        fn copy(&self, _: &str) -> Result<()> {
            Ok(())
        }
    }

    /// Records what reached the surface.
    #[derive(Clone, Default)]
    struct Log(Rc<RefCell<Vec<String>>>);

    impl Surface for Log {
        fn controls(&mut self, title: &str, _: &[ControlView]) -> Result<()> {
            self.0.borrow_mut().push(format!("controls:{title}"));
            Ok(())
        }
        fn password(&mut self, view: &PasswordView) -> Result<()> {
            self.0.borrow_mut().push(format!("password:{}", view.text));
            Ok(())
        }
        fn history(&mut self, rows: &[HistoryRow]) -> Result<()> {
            self.0.borrow_mut().push(format!("history:{}", rows.len()));
            Ok(())
        }
        fn notification(&mut self, n: &Notification) -> Result<()> {
            self.0.borrow_mut().push(format!("note:{}", n.message));
            Ok(())
        }
        fn key_badge(&mut self, badge: &KeyBadge) -> Result<()> {
            self.0.borrow_mut().push(format!("badge:{}", badge.text));
            Ok(())
        }
    }

    fn shell<'a>(
        api: &'a Backend,
        store: &'a mut LocalStore,
        log: &Log,
        tx: Sender<Event>,
    ) -> Shell<'a> {
        Shell {
            state: AppState::default(),
            api,
            store,
            clipboard: &NullClipboard,
            controller: GenerationController::new(EventLog::disabled(), true),
            history: HistoryView::new(50, EventLog::disabled()),
            search: Debouncer::new(Duration::from_millis(40), move |q| {
                let _ = tx.send(Event::SearchSettled(q));
            }),
            surface: Box::new(log.clone()),
            default_key: "default_secret_key".into(),
            awaiting_confirm: false,
        }
    }

    fn backend() -> Backend {
        Backend {
            searches: RefCell::new(Vec::new()),
        }
    }

    #[test]
    fn start_renders_first_result() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = LocalStore::open(dir.path().join("s.json"));
        let api = backend();
        let log = Log::default();
        let (tx, _rx) = mpsc::channel();
        let mut shell = shell(&api, &mut store, &log, tx);

        shell.start().unwrap();

        let lines = log.0.borrow();
        assert!(lines.contains(&"badge:Unlocked".to_string()));
        assert!(lines.contains(&"password:pw-random".to_string()));
        assert_eq!(shell.state().key_status, KeyStatus::Unlocked);
        assert_eq!(shell.state().history.len(), 0);
    }

    #[test]
    fn switching_to_analyze_does_not_generate() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = LocalStore::open(dir.path().join("s.json"));
        let api = backend();
        let log = Log::default();
        let (tx, _rx) = mpsc::channel();
        let mut shell = shell(&api, &mut store, &log, tx);

        shell.handle_line("type analyze").unwrap();

        assert_eq!(shell.state().current_type, GeneratorType::Analyze);
        assert!(log.0.borrow().contains(&"password:Enter password...".to_string()));
        assert!(shell.state().history.is_empty());
    }

    #[test]
    fn preset_applies_and_regenerates() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = LocalStore::open(dir.path().join("s.json"));
        let api = backend();
        let log = Log::default();
        let (tx, _rx) = mpsc::channel();
        let mut shell = shell(&api, &mut store, &log, tx);
        shell.start().unwrap();

        shell.handle_line("preset paranoid").unwrap();

        let length = shell
            .state()
            .config
            .get(GeneratorType::Random, "length")
            .and_then(|v| v.as_int());
        assert_eq!(length, Some(32));
        assert_eq!(shell.state().history.len(), 1);
    }

    #[test]
    fn search_burst_reaches_server_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = LocalStore::open(dir.path().join("s.json"));
        let api = backend();
        let log = Log::default();
        let (tx, rx) = mpsc::channel();
        let mut shell = shell(&api, &mut store, &log, tx);

        for text in ["search p", "search pi", "search pin"] {
            shell.handle_line(text).unwrap();
        }
        let event = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        shell.handle_event(event).unwrap();

        assert_eq!(api.searches.borrow().as_slice(), ["pin".to_string()]);
        assert_eq!(shell.state().search_query, "pin");
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
    }

    #[test]
    fn clear_history_waits_for_confirmation() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = LocalStore::open(dir.path().join("s.json"));
        let api = backend();
        let log = Log::default();
        let (tx, _rx) = mpsc::channel();
        let mut shell = shell(&api, &mut store, &log, tx);
        shell.handle_line("generate").unwrap();

        shell.handle_line("clear-history").unwrap();
        shell.handle_event(Event::Line("n".into())).unwrap();
        assert_eq!(shell.state().history.len(), 1);
        assert!(log.0.borrow().contains(&"note:Cancelled".to_string()));

        shell.handle_line("clear-history").unwrap();
        shell.handle_line("yes").unwrap();
        assert!(shell.state().history.is_empty());
    }

    #[test]
    fn key_and_theme_are_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.json");
        let mut store = LocalStore::open(&path);
        let api = backend();
        let log = Log::default();
        let (tx, _rx) = mpsc::channel();
        {
            let mut shell = shell(&api, &mut store, &log, tx);
            shell.handle_line("key my-key").unwrap();
            shell.handle_line("theme").unwrap();
        }
        let reopened = LocalStore::open(&path);
        assert_eq!(reopened.api_key(), Some("my-key"));
        assert_eq!(reopened.theme(), crate::state::Theme::Light);
    }

    #[test]
    fn eof_and_quit_end_the_session() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = LocalStore::open(dir.path().join("s.json"));
        let api = backend();
        let log = Log::default();
        let (tx, _rx) = mpsc::channel();
        let mut shell = shell(&api, &mut store, &log, tx);
        assert_eq!(shell.handle_line("quit").unwrap(), Flow::Quit);
        assert_eq!(shell.handle_event(Event::Eof).unwrap(), Flow::Quit);
    }
}
