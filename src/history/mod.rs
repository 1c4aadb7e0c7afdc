//! History view: the server-held generation history as seen by the client.
//!
//! Every request carries the API key; a 401 locks the key badge. Local
//! generations are prepended optimistically by the workflow controller, so
//! refreshes only happen on demand (search, startup, explicit sync).

pub mod debounce;

pub use debounce::Debouncer;

use crate::analytics::EventLog;
use crate::api::{ApiError, HistoryQuery, PassforgeApi};
use crate::clipboard::Clipboard;
use crate::state::{AppState, KeyStatus, Level};

pub const ACCESS_DENIED: &str = "History access denied. Please enter your API Key.";
pub const SYNC_FAILED: &str = "Failed to sync history";

#[derive(Debug, Clone)]
pub struct HistoryView {
    limit: usize,
    events: EventLog,
}

impl HistoryView {
    pub fn new(limit: usize, events: EventLog) -> Self {
        Self { limit, events }
    }

    /// Fetch the list matching `state.search_query` into the mirror.
    pub fn refresh(&self, state: &mut AppState, api: &dyn PassforgeApi, api_key: &str) -> bool {
        let query = HistoryQuery::new(self.limit, state.search_query.clone());
        match api.history(&query, api_key) {
            Ok(entries) => {
                state.replace_history(entries);
                state.key_status = KeyStatus::Unlocked;
                self.events.ok("history_sync", None);
                true
            }
            Err(err) => {
                match &err {
                    ApiError::Unauthorized => {
                        state.key_status = KeyStatus::Locked;
                        state.notify(ACCESS_DENIED, Level::Danger);
                    }
                    ApiError::Server { detail, .. } => {
                        state.notify(format!("{SYNC_FAILED}: {detail}"), Level::Danger);
                    }
                    ApiError::Transport(_) | ApiError::Decode(_) => {
                        state.notify(SYNC_FAILED, Level::Danger);
                    }
                }
                self.events.error("history_sync", None, &err.to_string());
                false
            }
        }
    }

    /// Probe whether the key opens the history endpoint.
    ///
    /// Any refusal locks the badge; an unreachable server leaves it as is.
    pub fn check_key_status(
        &self,
        state: &mut AppState,
        api: &dyn PassforgeApi,
        api_key: &str,
    ) -> KeyStatus {
        match api.history(&HistoryQuery::new(1, ""), api_key) {
            Ok(_) => state.key_status = KeyStatus::Unlocked,
            Err(ApiError::Transport(_)) => {}
            Err(_) => state.key_status = KeyStatus::Locked,
        }
        state.key_status
    }

    /// Delete the server history after `confirm` agrees.
    pub fn clear_all(
        &self,
        state: &mut AppState,
        api: &dyn PassforgeApi,
        api_key: &str,
        confirm: impl FnOnce() -> bool,
    ) -> bool {
        if !confirm() {
            return false;
        }
        match api.clear_history(api_key) {
            Ok(()) => {
                state.clear_history();
                state.notify("History cleared", Level::Success);
                self.events.ok("history_clear", None);
                true
            }
            Err(err) => {
                match &err {
                    ApiError::Unauthorized => {
                        state.key_status = KeyStatus::Locked;
                        state.notify(ACCESS_DENIED, Level::Danger);
                    }
                    ApiError::Server { detail, .. } => {
                        state.notify(format!("Error: {detail}"), Level::Danger);
                    }
                    ApiError::Transport(_) | ApiError::Decode(_) => {
                        state.notify("Connection failed", Level::Danger);
                    }
                }
                self.events.error("history_clear", None, &err.to_string());
                false
            }
        }
    }
}

/// Copy the password of the history row at `index`.
pub fn copy_entry(state: &mut AppState, index: usize, clipboard: &dyn Clipboard) -> bool {
    let Some(password) = state.history.get(index).map(|e| e.password.clone()) else {
        state.notify(format!("No history entry #{index}"), Level::Danger);
        return false;
    };
    match clipboard.copy(&password) {
        Ok(()) => {
            state.notify("Copied from history!", Level::Success);
            true
        }
        Err(_) => {
            state.notify("Failed to copy from history", Level::Danger);
            false
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::api::{AnalyzeResponse, BootstrapResponse, GenerateRequest, GenerateResponse};
    use crate::generator::Presets;
    use crate::state::HistoryEntry;

    struct HistoryApi {
        result: Result<Vec<HistoryEntry>, ApiError>,
        clear: Result<(), ApiError>,
        seen: RefCell<Vec<(HistoryQuery, String)>>,
    }

    impl HistoryApi {
        fn returning(result: Result<Vec<HistoryEntry>, ApiError>) -> Self {
            Self {
                result,
                clear: Ok(()),
                seen: RefCell::new(Vec::new()),
            }
        }
    }

    impl PassforgeApi for HistoryApi {
        fn presets(&self) -> Result<Presets, ApiError> {
            unreachable!()
        }
        fn generate(&self, _: &GenerateRequest) -> Result<GenerateResponse, ApiError> {
            unreachable!()
        }
        fn analyze(&self, _: &str) -> Result<AnalyzeResponse, ApiError> {
            unreachable!()
        }
        fn history(&self, query: &HistoryQuery, key: &str) -> Result<Vec<HistoryEntry>, ApiError> {
            self.seen.borrow_mut().push((query.clone(), key.to_string()));
            self.result.clone()
        }
        fn clear_history(&self, _: &str) -> Result<(), ApiError> {
            self.clear.clone()
        }
        fn bootstrap(&self) -> Result<BootstrapResponse, ApiError> {
            unreachable!()
        }
    }

    fn entry(password: &str) -> HistoryEntry {
        HistoryEntry {
            password: password.to_string(),
            generator_type: "pin".to_string(),
            timestamp: "2024-05-01T10:00:00".to_string(),
        }
    }

    fn view() -> HistoryView {
        HistoryView::new(50, EventLog::disabled())
    }

    #[test]
    fn refresh_replaces_mirror_and_unlocks() {
        let api = HistoryApi::returning(Ok(vec![entry("1111"), entry("2222")]));
        let mut state = AppState::default();
        state.history.prepend(entry("stale"));
        state.search_query = "22".to_string();

        assert!(view().refresh(&mut state, &api, "k"));

        assert_eq!(state.history.len(), 2);
        assert_eq!(state.key_status, KeyStatus::Unlocked);
        let seen = api.seen.borrow();
        assert_eq!(seen[0].0, HistoryQuery::new(50, "22"));
        assert_eq!(seen[0].1, "k");
    }

    #[test]
    fn unauthorized_locks_badge() {
        let api = HistoryApi::returning(Err(ApiError::Unauthorized));
        let mut state = AppState::default();
        state.history.prepend(entry("kept"));

        assert!(!view().refresh(&mut state, &api, "wrong"));

        assert_eq!(state.key_status, KeyStatus::Locked);
        assert_eq!(state.notifications()[0].message, ACCESS_DENIED);
        assert_eq!(state.history.len(), 1);
    }

    #[test]
    fn transport_failure_reports_sync_failure() {
        let api = HistoryApi::returning(Err(ApiError::Transport("refused".into())));
        let mut state = AppState::default();
        view().refresh(&mut state, &api, "k");
        assert_eq!(state.notifications()[0].message, SYNC_FAILED);
        assert_eq!(state.key_status, KeyStatus::Unknown);
    }

    #[test]
    fn key_probe_uses_limit_one() {
        let api = HistoryApi::returning(Ok(Vec::new()));
        let mut state = AppState::default();
        assert_eq!(
            view().check_key_status(&mut state, &api, "k"),
            KeyStatus::Unlocked
        );
        assert_eq!(api.seen.borrow()[0].0.limit, 1);

        let api = HistoryApi::returning(Err(ApiError::Server {
            status: 403,
            detail: "Forbidden".into(),
        }));
        assert_eq!(view().check_key_status(&mut state, &api, "k"), KeyStatus::Locked);
        assert!(state.notifications().is_empty());
    }

    #[test]
    fn clear_requires_confirmation() {
        let api = HistoryApi::returning(Ok(Vec::new()));
        let mut state = AppState::default();
        state.history.prepend(entry("a"));

        assert!(!view().clear_all(&mut state, &api, "k", || false));
        assert_eq!(state.history.len(), 1);

        assert!(view().clear_all(&mut state, &api, "k", || true));
        assert!(state.history.is_empty());
    }

    #[test]
    fn clear_unauthorized_keeps_mirror() {
        let mut api = HistoryApi::returning(Ok(Vec::new()));
        api.clear = Err(ApiError::Unauthorized);
        let mut state = AppState::default();
        state.history.prepend(entry("a"));

        assert!(!view().clear_all(&mut state, &api, "k", || true));
        assert_eq!(state.history.len(), 1);
        assert_eq!(state.key_status, KeyStatus::Locked);
    }

    struct OkClipboard(RefCell<Option<String>>);

    impl Clipboard for OkClipboard {
        fn copy(&self, text: &str) -> anyhow::Result<()> {
            *self.0.borrow_mut() = Some(text.to_string());
            Ok(())
        }
    }

    #[test]
    fn copy_entry_by_index() {
        let clipboard = OkClipboard(RefCell::new(None));
        let mut state = AppState::default();
        state.history.prepend(entry("older"));
        state.history.prepend(entry("newer"));

        assert!(copy_entry(&mut state, 1, &clipboard));
        assert_eq!(clipboard.0.borrow().as_deref(), Some("older"));
        assert!(!copy_entry(&mut state, 5, &clipboard));
    }
}
