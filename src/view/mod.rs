//! View models derived from [`AppState`], and the surfaces that draw them.
//!
//! Builders in this module are pure: they read state and return plain data.
//! Surfaces in [`surface`] only apply that data to an output stream, so
//! everything interesting here is testable without a terminal.

pub mod colorize;
pub mod surface;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use serde::Serialize;

use crate::generator::{FieldKind, FieldValue, control_schema, preset_label};
use crate::state::{AnalysisDetail, AppState, DetailPanel, KeyStatus};

pub use colorize::{CharClass, Glyph, colorize, escape_html};
pub use surface::{HtmlSurface, JsonSurface, Surface, TerminalSurface};

/// Label of the preset entry that leaves the configuration alone.
pub const MANUAL_PRESET_LABEL: &str = "Custom (Manual)";

/// Shown in place of an empty analyze input.
pub const NO_INPUT: &str = "No input";

// ---------------------------------------------------------------------------
// Controls
// ---------------------------------------------------------------------------

/// One choice of a select or preset control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionView {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

/// An interactive element, initialized from the stored value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Widget {
    Range {
        min: i64,
        max: i64,
        step: i64,
        value: i64,
    },
    Checkbox {
        checked: bool,
    },
    Select {
        options: Vec<OptionView>,
    },
    Text {
        value: String,
    },
    Preset {
        options: Vec<OptionView>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControlView {
    pub id: &'static str,
    pub label: &'static str,
    pub widget: Widget,
    /// Visible value next to a range slider.
    pub readout: Option<String>,
}

/// Build one control per schema field of the active generator.
pub fn controls_view(state: &AppState) -> Vec<ControlView> {
    let ty = state.current_type;
    let record = state.config.record(ty);

    control_schema(ty)
        .iter()
        .map(|spec| {
            let stored = record.get(spec.id);
            let widget = match spec.kind {
                FieldKind::Range { min, max, step } => Widget::Range {
                    min,
                    max,
                    step,
                    value: stored.and_then(FieldValue::as_int).unwrap_or(min),
                },
                FieldKind::Checkbox => Widget::Checkbox {
                    checked: stored.and_then(FieldValue::as_bool).unwrap_or(false),
                },
                FieldKind::Select(options) => Widget::Select {
                    options: options
                        .iter()
                        .map(|o| {
                            let value = o.value();
                            OptionView {
                                value: value.to_string(),
                                label: o.label(),
                                selected: stored == Some(&value),
                            }
                        })
                        .collect(),
                },
                FieldKind::Text => Widget::Text {
                    value: stored
                        .and_then(FieldValue::as_text)
                        .unwrap_or_default()
                        .to_string(),
                },
                FieldKind::Preset => Widget::Preset {
                    options: preset_options(state),
                },
            };
            let readout = match &widget {
                Widget::Range { value, .. } => Some(value.to_string()),
                _ => None,
            };
            ControlView {
                id: spec.id,
                label: spec.label,
                widget,
                readout,
            }
        })
        .collect()
}

fn preset_options(state: &AppState) -> Vec<OptionView> {
    std::iter::once(OptionView {
        value: String::new(),
        label: MANUAL_PRESET_LABEL.to_string(),
        selected: true,
    })
    .chain(state.presets.keys().map(|name| OptionView {
        value: name.clone(),
        label: preset_label(name),
        selected: false,
    }))
    .collect()
}

// ---------------------------------------------------------------------------
// Password display
// ---------------------------------------------------------------------------

/// Strength lines of an analysis, raw. Surfaces escape them as needed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisView {
    pub score: Option<String>,
    pub warning: Option<String>,
    pub tip: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PanelView {
    Placeholder,
    Qr { png_base64: String },
    Analysis(AnalysisView),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PasswordView {
    pub title: String,
    pub glyphs: Vec<Glyph>,
    pub text: String,
    /// Entropy exactly as the server reported it.
    pub entropy: String,
    pub panel: PanelView,
    pub action_label: &'static str,
    pub action_enabled: bool,
}

pub fn password_view(state: &AppState) -> PasswordView {
    let panel = match &state.display.panel {
        DetailPanel::Placeholder => PanelView::Placeholder,
        DetailPanel::Qr(png) => PanelView::Qr {
            png_base64: png.clone(),
        },
        DetailPanel::Analysis(detail) => PanelView::Analysis(analysis_view(detail)),
    };

    PasswordView {
        title: state.current_type.page_title(),
        glyphs: colorize(&state.display.text),
        text: state.display.text.clone(),
        entropy: format_entropy(state.display.entropy),
        panel,
        action_label: state.action.label,
        action_enabled: state.action.enabled,
    }
}

/// Score out of four, the first warning and the first suggestion.
pub fn analysis_view(detail: &AnalysisDetail) -> AnalysisView {
    AnalysisView {
        score: detail.score.map(|s| format!("Score: {s}/4")),
        warning: detail.warning.as_ref().map(|w| format!("Warning: {w}")),
        tip: detail.suggestion.as_ref().map(|t| format!("Tip: {t}")),
    }
}

/// Shortest representation that round-trips: `103.4`, `64`, `0`.
pub fn format_entropy(entropy: f64) -> String {
    entropy.to_string()
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryRow {
    /// Position in the mirror; the copy action refers to it.
    pub index: usize,
    pub glyphs: Vec<Glyph>,
    pub password: String,
    pub label: String,
    pub when: String,
}

pub fn history_rows(state: &AppState) -> Vec<HistoryRow> {
    state
        .history
        .iter()
        .enumerate()
        .map(|(index, entry)| HistoryRow {
            index,
            glyphs: colorize(&entry.password),
            password: entry.password.clone(),
            label: entry.generator_type.clone(),
            when: format_timestamp(&entry.timestamp),
        })
        .collect()
}

/// Render a server timestamp in local time.
///
/// Accepts RFC 3339 and the naive ISO form the backend writes; anything
/// else is shown verbatim.
pub fn format_timestamp(raw: &str) -> String {
    const DISPLAY: &str = "%Y-%m-%d %H:%M:%S";

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.with_timezone(&Local).format(DISPLAY).to_string();
    }
    for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, pattern)
            && let Some(local) = Local.from_local_datetime(&naive).earliest()
        {
            return local.format(DISPLAY).to_string();
        }
    }
    raw.to_string()
}

// ---------------------------------------------------------------------------
// Key badge
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KeyBadge {
    pub text: &'static str,
    pub unlocked: Option<bool>,
}

pub fn key_badge(status: KeyStatus) -> KeyBadge {
    match status {
        KeyStatus::Unknown => KeyBadge {
            text: "Unknown",
            unlocked: None,
        },
        KeyStatus::Locked => KeyBadge {
            text: "Locked",
            unlocked: Some(false),
        },
        KeyStatus::Unlocked => KeyBadge {
            text: "Unlocked",
            unlocked: Some(true),
        },
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::{FieldSpec, GeneratorType};
    use crate::state::{AnalysisDetail, HistoryEntry};

    #[test]
    fn controls_match_schema_for_every_type() {
        let mut state = AppState::default();
        for ty in GeneratorType::ALL {
            state.select_type(ty);
            let view = controls_view(&state);
            let ids: Vec<&str> = view.iter().map(|c| c.id).collect();
            let expected: Vec<&str> = control_schema(ty).iter().map(|s: &FieldSpec| s.id).collect();
            assert_eq!(ids, expected, "{ty}");
        }
    }

    #[test]
    fn controls_reflect_stored_values() {
        let mut state = AppState::default();
        state.select_type(GeneratorType::Phrase);
        state.set_field("words", "7").unwrap();
        state.set_field("separator", "_").unwrap();
        state.set_field("capitalize", "true").unwrap();

        let view = controls_view(&state);
        assert_eq!(
            view[0].widget,
            Widget::Range {
                min: 2,
                max: 12,
                step: 1,
                value: 7
            }
        );
        assert_eq!(view[0].readout.as_deref(), Some("7"));
        match &view[1].widget {
            Widget::Select { options } => {
                let selected: Vec<&str> = options
                    .iter()
                    .filter(|o| o.selected)
                    .map(|o| o.value.as_str())
                    .collect();
                assert_eq!(selected, vec!["_"]);
            }
            other => panic!("expected select, got {other:?}"),
        }
        assert_eq!(view[2].widget, Widget::Checkbox { checked: true });
    }

    #[test]
    fn text_control_keeps_markup_as_value() {
        let mut state = AppState::default();
        state.select_type(GeneratorType::Phonetic);
        state.set_field("text", "<b>hi</b>").unwrap();
        let view = controls_view(&state);
        assert_eq!(
            view[0].widget,
            Widget::Text {
                value: "<b>hi</b>".into()
            }
        );
    }

    #[test]
    fn preset_control_lists_manual_then_presets() {
        let mut state = AppState::default();
        state.presets.insert("strong".into(), Default::default());
        state.presets.insert("web".into(), Default::default());
        let view = controls_view(&state);
        match &view[0].widget {
            Widget::Preset { options } => {
                let labels: Vec<&str> = options.iter().map(|o| o.label.as_str()).collect();
                assert_eq!(labels, vec![MANUAL_PRESET_LABEL, "Strong", "Web"]);
                assert!(options[0].selected);
            }
            other => panic!("expected preset, got {other:?}"),
        }
    }

    #[test]
    fn analysis_panel_formats_lines() {
        let mut state = AppState::default();
        state.display.panel = DetailPanel::Analysis(AnalysisDetail {
            score: Some(3),
            warning: None,
            suggestion: Some("Add a word".into()),
        });
        let view = password_view(&state);
        assert_eq!(
            view.panel,
            PanelView::Analysis(AnalysisView {
                score: Some("Score: 3/4".into()),
                warning: None,
                tip: Some("Tip: Add a word".into()),
            })
        );
    }

    #[test]
    fn entropy_is_shown_as_reported() {
        assert_eq!(format_entropy(103.4), "103.4");
        assert_eq!(format_entropy(64.0), "64");
        assert_eq!(format_entropy(0.0), "0");
    }

    #[test]
    fn history_rows_keep_raw_label() {
        let mut state = AppState::default();
        state.record_generation(HistoryEntry {
            password: "Ab1".into(),
            generator_type: "<pin>".into(),
            timestamp: "not a date".into(),
        });
        let rows = history_rows(&state);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].label, "<pin>");
        assert_eq!(rows[0].when, "not a date");
        assert_eq!(rows[0].glyphs.len(), 3);
    }

    #[test]
    fn timestamps_parse_rfc3339_and_naive() {
        let rfc = format_timestamp("2026-03-01T12:30:00Z");
        assert_eq!(rfc.len(), "2026-03-01 12:30:00".len());
        assert_eq!(
            format_timestamp("2026-03-01T12:30:00.123456"),
            "2026-03-01 12:30:00"
        );
    }

    #[test]
    fn key_badge_texts() {
        assert_eq!(key_badge(KeyStatus::Locked).text, "Locked");
        assert_eq!(key_badge(KeyStatus::Unlocked).unlocked, Some(true));
        assert_eq!(key_badge(KeyStatus::Unknown).unlocked, None);
    }
}
