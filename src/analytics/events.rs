//! Client event log: one JSON line per workflow outcome.
//!
//! Records what happened (generate, analyze, history sync, cache install,
//! ...) and whether it worked, never the credentials themselves.
//!
//! Log file: `~/.passforge/events.jsonl`

use std::fs::{self, OpenOptions, create_dir_all};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config::expand_tilde;
use crate::config::schema::LoggingConfig;
use crate::generator::GeneratorType;

// ---------------------------------------------------------------------------
// Event entry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Ok,
    Error,
}

/// One line of the event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientEvent {
    pub timestamp: String,
    /// What was attempted, e.g. `"generate"`, `"history_sync"`.
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub generator_type: Option<String>,
    pub outcome: Outcome,
    /// Error message for failures.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub detail: Option<String>,
}

// ---------------------------------------------------------------------------
// Log handle
// ---------------------------------------------------------------------------

/// Where events go. A disabled log swallows everything.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    path: Option<PathBuf>,
}

impl EventLog {
    pub fn from_config(config: &LoggingConfig) -> Self {
        if config.enabled {
            Self::at(expand_tilde(&config.path))
        } else {
            Self::disabled()
        }
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    pub fn disabled() -> Self {
        Self { path: None }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Record a success.
    pub fn ok(&self, event: &str, generator_type: Option<GeneratorType>) {
        self.record(event, generator_type, Outcome::Ok, None);
    }

    /// Record a failure with its message.
    pub fn error(&self, event: &str, generator_type: Option<GeneratorType>, detail: &str) {
        self.record(event, generator_type, Outcome::Error, Some(detail));
    }

    /// Append one event. Best-effort: failures are silently ignored.
    pub fn record(
        &self,
        event: &str,
        generator_type: Option<GeneratorType>,
        outcome: Outcome,
        detail: Option<&str>,
    ) {
        let Some(path) = &self.path else {
            return;
        };
        let entry = ClientEvent {
            timestamp: Utc::now().to_rfc3339(),
            event: event.to_string(),
            generator_type: generator_type.map(|t| t.as_str().to_string()),
            outcome,
            detail: detail.map(str::to_string),
        };
        let _ = append_event(path, &entry);
    }

    /// Read every event, skipping malformed lines.
    pub fn read_all(&self) -> Vec<ClientEvent> {
        let Some(path) = &self.path else {
            return Vec::new();
        };
        let Ok(file) = fs::File::open(path) else {
            return Vec::new();
        };
        BufReader::new(file)
            .lines()
            .map_while(Result::ok)
            .filter_map(|line| serde_json::from_str::<ClientEvent>(&line).ok())
            .collect()
    }
}

fn append_event(path: &Path, event: &ClientEvent) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        create_dir_all(parent)?;
    }

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let json = serde_json::to_string(event)?;
    writeln!(file, "{json}")?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
