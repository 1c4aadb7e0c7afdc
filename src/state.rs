//! Application view-state store.
//!
//! [`AppState`] is the sole owner of every mutable piece of client state:
//! the active generator, per-type configuration, fetched presets, the
//! history mirror, and what is currently on display. Everything a surface
//! shows is derived from it by the pure builders in [`crate::view`].

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::generator::{
    FieldError, FieldValue, GeneratorConfig, GeneratorType, Presets, apply_preset,
};

/// Default cap for the local history mirror.
pub const DEFAULT_HISTORY_CAP: usize = 50;

/// Display text before anything has been generated.
pub const INITIAL_DISPLAY: &str = "Initializing...";

/// Display text while the analyze generator waits for input.
pub const ANALYZE_PROMPT: &str = "Enter password...";

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

/// One generated credential as held by the server's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub password: String,
    pub generator_type: String,
    pub timestamp: String,
}

/// Capped, newest-first mirror of the server-held history.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryMirror {
    entries: VecDeque<HistoryEntry>,
    cap: usize,
}

impl HistoryMirror {
    pub fn new(cap: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            cap: cap.max(1),
        }
    }

    /// Insert at the front, dropping the oldest entry past the cap.
    pub fn prepend(&mut self, entry: HistoryEntry) {
        self.entries.push_front(entry);
        while self.entries.len() > self.cap {
            self.entries.pop_back();
        }
    }

    /// Replace the mirror with a server listing, keeping at most `cap`.
    pub fn replace(&mut self, entries: Vec<HistoryEntry>) {
        self.entries = entries.into_iter().take(self.cap).collect();
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn get(&self, index: usize) -> Option<&HistoryEntry> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cap(&self) -> usize {
        self.cap
    }
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

/// Strength details returned by the analysis endpoint, already reduced to
/// what is shown: the score, an optional warning and at most one tip.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisDetail {
    pub score: Option<u8>,
    pub warning: Option<String>,
    pub suggestion: Option<String>,
}

/// Right-hand panel next to the password.
#[derive(Debug, Clone, PartialEq)]
pub enum DetailPanel {
    /// Nothing to show (no QR from the server, or waiting for input).
    Placeholder,
    /// Base64-encoded PNG supplied by the server.
    Qr(String),
    Analysis(AnalysisDetail),
}

/// What is currently on display.
#[derive(Debug, Clone, PartialEq)]
pub struct Display {
    pub text: String,
    pub entropy: f64,
    pub panel: DetailPanel,
}

impl Default for Display {
    fn default() -> Self {
        Self {
            text: INITIAL_DISPLAY.to_string(),
            entropy: 0.0,
            panel: DetailPanel::Placeholder,
        }
    }
}

// ---------------------------------------------------------------------------
// Action control
// ---------------------------------------------------------------------------

/// The generate/analyze button: disabled with a busy label while a request
/// is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionControl {
    pub enabled: bool,
    pub label: &'static str,
}

impl ActionControl {
    pub const BUSY_LABEL: &'static str = "Generating...";

    pub fn idle_label(ty: GeneratorType) -> &'static str {
        if ty.is_analyze() {
            "Analyze"
        } else {
            "Generate New"
        }
    }

    pub fn idle(ty: GeneratorType) -> Self {
        Self {
            enabled: true,
            label: Self::idle_label(ty),
        }
    }

    pub fn busy() -> Self {
        Self {
            enabled: false,
            label: Self::BUSY_LABEL,
        }
    }
}

// ---------------------------------------------------------------------------
// Key status, theme, notifications
// ---------------------------------------------------------------------------

/// Whether the configured API key currently opens the history endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KeyStatus {
    #[default]
    Unknown,
    Locked,
    Unlocked,
}

/// Colour scheme, persisted between sessions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Self::Dark => Self::Light,
            Self::Light => Self::Dark,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dark => "dark",
            Self::Light => "light",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Dark => "Dark Mode",
            Self::Light => "Light Mode",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dark" => Ok(Self::Dark),
            "light" => Ok(Self::Light),
            other => anyhow::bail!("unknown theme '{other}' (expected dark or light)"),
        }
    }
}

/// Severity of a transient notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Success,
    Warning,
    Danger,
}

/// A transient message for the user (the toast of the web client).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub message: String,
    pub level: Level,
}

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// The complete client state.
#[derive(Debug, Clone)]
pub struct AppState {
    pub current_type: GeneratorType,
    pub config: GeneratorConfig,
    pub presets: Presets,
    pub history: HistoryMirror,
    pub search_query: String,
    /// Raw text of the last generated credential, used for copying.
    pub last_generated: Option<String>,
    pub display: Display,
    pub action: ActionControl,
    pub key_status: KeyStatus,
    pub theme: Theme,
    notifications: Vec<Notification>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(GeneratorType::default(), DEFAULT_HISTORY_CAP)
    }
}

impl AppState {
    pub fn new(current_type: GeneratorType, history_cap: usize) -> Self {
        Self {
            current_type,
            config: GeneratorConfig::default(),
            presets: Presets::new(),
            history: HistoryMirror::new(history_cap),
            search_query: String::new(),
            last_generated: None,
            display: Display::default(),
            action: ActionControl::idle(current_type),
            key_status: KeyStatus::Unknown,
            theme: Theme::default(),
            notifications: Vec::new(),
        }
    }

    /// Switch the active generator.
    ///
    /// Switching to `analyze` resets the display to an input prompt; the
    /// caller decides whether other types regenerate right away.
    pub fn select_type(&mut self, ty: GeneratorType) {
        self.current_type = ty;
        self.action = ActionControl::idle(ty);
        if ty.is_analyze() {
            self.display = Display {
                text: ANALYZE_PROMPT.to_string(),
                entropy: 0.0,
                panel: DetailPanel::Placeholder,
            };
            self.last_generated = None;
        }
    }

    /// Set a field of the active generator from raw input.
    pub fn set_field(&mut self, field: &str, raw: &str) -> Result<(), FieldError> {
        self.config.set_raw(self.current_type, field, raw)
    }

    /// Set a field of the active generator from a typed value.
    pub fn set_value(&mut self, field: &str, value: FieldValue) -> Result<(), FieldError> {
        self.config.set(self.current_type, field, value)
    }

    /// Apply a named preset to the active generator.
    ///
    /// An empty name is the "Custom (Manual)" entry and changes nothing.
    pub fn apply_preset(&mut self, name: &str) -> anyhow::Result<Vec<String>> {
        if name.is_empty() {
            return Ok(Vec::new());
        }
        let preset = self
            .presets
            .get(name)
            .ok_or_else(|| anyhow::anyhow!("unknown preset '{name}'"))?;
        let ty = self.current_type;
        let written = apply_preset(ty, self.config.record_mut(ty), preset)?;
        Ok(written)
    }

    /// Record a successful generation locally, newest first.
    pub fn record_generation(&mut self, entry: HistoryEntry) {
        self.history.prepend(entry);
    }

    pub fn replace_history(&mut self, entries: Vec<HistoryEntry>) {
        self.history.replace(entries);
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub fn toggle_theme(&mut self) -> Theme {
        self.theme = self.theme.toggled();
        self.theme
    }

    pub fn notify(&mut self, message: impl Into<String>, level: Level) {
        self.notifications.push(Notification {
            message: message.into(),
            level,
        });
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    /// Hand pending notifications to a surface, leaving none behind.
    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
