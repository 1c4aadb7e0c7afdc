//! Generation workflow controller.
//!
//! Turns the current state into an API call and the response back into
//! state. Every path ends with the action control re-enabled; every failure
//! ends as exactly one notification. Nothing here returns an error.

use chrono::{SecondsFormat, Utc};

use crate::analytics::EventLog;
use crate::api::{AnalyzeResponse, ApiError, GenerateRequest, GenerateResponse, PassforgeApi};
use crate::clipboard::Clipboard;
use crate::state::{
    ActionControl, AnalysisDetail, AppState, DetailPanel, Display, HistoryEntry, Level,
};
use crate::storage::LocalStore;
use crate::view::NO_INPUT;

/// Result of one trigger, for callers that need more than the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    Generated,
    Analyzed,
    Failed,
}

impl TriggerOutcome {
    pub fn is_success(self) -> bool {
        !matches!(self, Self::Failed)
    }
}

#[derive(Debug, Clone)]
pub struct GenerationController {
    events: EventLog,
    /// Value of the `log` query flag.
    server_log: bool,
}

impl GenerationController {
    pub fn new(events: EventLog, server_log: bool) -> Self {
        Self { events, server_log }
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Run the active generator (or the analysis) once.
    pub fn trigger(&self, state: &mut AppState, api: &dyn PassforgeApi) -> TriggerOutcome {
        self.trigger_with(state, api, |_| {})
    }

    /// Like [`trigger`](Self::trigger), calling `on_busy` once the action
    /// control is disabled and before the request goes out.
    pub fn trigger_with(
        &self,
        state: &mut AppState,
        api: &dyn PassforgeApi,
        on_busy: impl FnOnce(&AppState),
    ) -> TriggerOutcome {
        let ty = state.current_type;
        state.action = ActionControl::busy();
        on_busy(state);

        let outcome = if ty.is_analyze() {
            self.analyze(state, api)
        } else {
            self.generate(state, api)
        };

        state.action = ActionControl::idle(ty);
        outcome
    }

    fn analyze(&self, state: &mut AppState, api: &dyn PassforgeApi) -> TriggerOutcome {
        let ty = state.current_type;
        let password = state
            .config
            .get(ty, "password")
            .and_then(|v| v.as_text())
            .unwrap_or_default()
            .to_string();

        match api.analyze(&password) {
            Ok(response) => {
                apply_analysis(state, &password, response);
                self.events.ok("analyze", Some(ty));
                TriggerOutcome::Analyzed
            }
            Err(err) => {
                let message = match &err {
                    ApiError::Server { detail, .. } => detail.clone(),
                    ApiError::Unauthorized => "Unauthorized".to_string(),
                    ApiError::Transport(_) | ApiError::Decode(_) => {
                        "Failed to analyze password".to_string()
                    }
                };
                state.notify(message, Level::Danger);
                self.events.error("analyze", Some(ty), &err.to_string());
                TriggerOutcome::Failed
            }
        }
    }

    fn generate(&self, state: &mut AppState, api: &dyn PassforgeApi) -> TriggerOutcome {
        let ty = state.current_type;
        let request = GenerateRequest::new(ty, state.config.record(ty).clone(), self.server_log);

        match api.generate(&request) {
            Ok(response) => {
                apply_generation(state, response);
                self.events.ok("generate", Some(ty));
                TriggerOutcome::Generated
            }
            Err(err) => {
                let message = match &err {
                    ApiError::Server { detail, .. } => format!("Error: {detail}"),
                    ApiError::Unauthorized => "Error: Unauthorized".to_string(),
                    ApiError::Transport(_) | ApiError::Decode(_) => "Connection failed".to_string(),
                };
                state.notify(message, Level::Danger);
                self.events.error("generate", Some(ty), &err.to_string());
                TriggerOutcome::Failed
            }
        }
    }

    /// Apply a preset to the active generator and regenerate.
    ///
    /// The empty name is the manual entry: nothing changes and nothing is
    /// generated.
    pub fn select_preset(
        &self,
        state: &mut AppState,
        api: &dyn PassforgeApi,
        name: &str,
    ) -> Option<TriggerOutcome> {
        if name.is_empty() {
            return None;
        }
        if let Err(err) = state.apply_preset(name) {
            state.notify(format!("Preset not applied: {err}"), Level::Danger);
            return None;
        }
        Some(self.trigger(state, api))
    }
}

fn apply_analysis(state: &mut AppState, password: &str, response: AnalyzeResponse) {
    let strength = response.strength.unwrap_or_default();
    let text = if password.is_empty() {
        NO_INPUT.to_string()
    } else {
        password.to_string()
    };
    state.display = Display {
        text,
        entropy: response.entropy.unwrap_or(0.0),
        panel: DetailPanel::Analysis(AnalysisDetail {
            score: strength.score,
            warning: strength.warning.filter(|w| !w.is_empty()),
            suggestion: strength
                .suggestions
                .and_then(|s| s.into_iter().next()),
        }),
    };
}

fn apply_generation(state: &mut AppState, response: GenerateResponse) {
    let panel = match response.qr.filter(|qr| !qr.is_empty()) {
        Some(png) => DetailPanel::Qr(png),
        None => DetailPanel::Placeholder,
    };
    state.display = Display {
        text: response.password.clone(),
        entropy: response.entropy,
        panel,
    };
    state.last_generated = Some(response.password.clone());
    state.record_generation(HistoryEntry {
        password: response.password,
        generator_type: response.generator_type,
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    });
}

// ---------------------------------------------------------------------------
// Presets, copy, bootstrap
// ---------------------------------------------------------------------------

/// Fetch the server presets into the state. Returns whether it worked.
pub fn load_presets(state: &mut AppState, api: &dyn PassforgeApi) -> bool {
    match api.presets() {
        Ok(presets) => {
            state.presets = presets;
            true
        }
        Err(ApiError::Server { detail, .. }) => {
            state.notify(format!("Failed to load presets: {detail}"), Level::Danger);
            false
        }
        Err(ApiError::Unauthorized) => {
            state.notify("Failed to load presets: Unauthorized", Level::Danger);
            false
        }
        Err(_) => {
            state.notify("Network error loading security presets", Level::Danger);
            false
        }
    }
}

/// Copy the last generated credential.
pub fn copy_last(state: &mut AppState, clipboard: &dyn Clipboard) -> bool {
    let Some(text) = state.last_generated.clone() else {
        state.notify("Nothing to copy yet", Level::Danger);
        return false;
    };
    match clipboard.copy(&text) {
        Ok(()) => {
            state.notify("Copied to clipboard!", Level::Success);
            true
        }
        Err(_) => {
            state.notify("Failed to copy", Level::Danger);
            false
        }
    }
}

/// Provision an API key from the server's bootstrap endpoint.
///
/// Only runs when no key is stored, and only keeps a key that differs from
/// the shared default. Failures are silent: bootstrap is only offered to
/// local clients, so remote users routinely get an error here.
pub fn bootstrap_key(
    state: &mut AppState,
    api: &dyn PassforgeApi,
    store: &mut LocalStore,
    default_key: &str,
) -> bool {
    if store.api_key().is_some() {
        return false;
    }
    let Ok(response) = api.bootstrap() else {
        return false;
    };
    let Some(key) = response
        .api_key
        .filter(|k| !k.trim().is_empty() && k != default_key)
    else {
        return false;
    };
    if store.set(crate::storage::API_KEY, &key).is_err() {
        state.notify("Failed to save API key", Level::Danger);
        return false;
    }
    state.notify("Authenticated automatically via Local Trust", Level::Success);
    true
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
