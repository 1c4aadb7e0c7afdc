//! Rendering surfaces: thin adapters that write view models to a stream.

use std::io::Write;

use anyhow::Result;
use colored::{ColoredString, Colorize};

use super::colorize::{CharClass, Glyph, escape_html, glyphs_to_html};
use super::{ControlView, HistoryRow, KeyBadge, PanelView, PasswordView, Widget};
use crate::state::{Level, Notification, Theme};

/// Something a view model can be applied to.
pub trait Surface {
    fn controls(&mut self, title: &str, controls: &[ControlView]) -> Result<()>;
    fn password(&mut self, view: &PasswordView) -> Result<()>;
    fn history(&mut self, rows: &[HistoryRow]) -> Result<()>;
    fn notification(&mut self, notification: &Notification) -> Result<()>;
    fn key_badge(&mut self, badge: &KeyBadge) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Terminal
// ---------------------------------------------------------------------------

/// Colour-coded terminal output. The palette follows the persisted theme.
pub struct TerminalSurface<W: Write> {
    out: W,
    theme: Theme,
}

impl<W: Write> TerminalSurface<W> {
    pub fn new(out: W, theme: Theme) -> Self {
        Self { out, theme }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn paint(&self, glyph: &Glyph) -> ColoredString {
        let s = printable(glyph.ch.encode_utf8(&mut [0; 4]));
        match (self.theme, glyph.class) {
            (Theme::Dark, CharClass::Upper) => s.bright_cyan(),
            (Theme::Dark, CharClass::Lower) => s.bright_white(),
            (Theme::Dark, CharClass::Digit) => s.bright_yellow(),
            (Theme::Dark, CharClass::Symbol) => s.bright_magenta(),
            (Theme::Light, CharClass::Upper) => s.blue(),
            (Theme::Light, CharClass::Lower) => s.black(),
            (Theme::Light, CharClass::Digit) => s.yellow(),
            (Theme::Light, CharClass::Symbol) => s.magenta(),
            (_, CharClass::Plain) => s.normal(),
        }
    }

    fn painted(&self, glyphs: &[Glyph]) -> String {
        glyphs.iter().map(|g| self.paint(g).to_string()).collect()
    }
}

/// Server text with control characters shown as escapes, so it cannot
/// drive the terminal.
fn printable(text: &str) -> String {
    text.chars()
        .map(|c| {
            if c.is_control() {
                c.escape_default().to_string()
            } else {
                c.to_string()
            }
        })
        .collect()
}

impl<W: Write> Surface for TerminalSurface<W> {
    fn controls(&mut self, title: &str, controls: &[ControlView]) -> Result<()> {
        writeln!(self.out, "{}", title.bold().cyan())?;
        writeln!(self.out, "{}", "=".repeat(50))?;
        if controls.is_empty() {
            writeln!(self.out, "  {}", "No options for this generator.".dimmed())?;
            return Ok(());
        }
        for control in controls {
            let value = match &control.widget {
                Widget::Range {
                    min, max, value, ..
                } => format!("{value}  {}", format!("[{min}..{max}]").dimmed()),
                Widget::Checkbox { checked } => {
                    if *checked {
                        "[x]".green().to_string()
                    } else {
                        "[ ]".to_string()
                    }
                }
                Widget::Select { options } | Widget::Preset { options } => options
                    .iter()
                    .map(|o| {
                        let label = printable(&o.label);
                        if o.selected {
                            format!("<{label}>").bold().to_string()
                        } else {
                            label.dimmed().to_string()
                        }
                    })
                    .collect::<Vec<_>>()
                    .join(" "),
                Widget::Text { value } => format!("\"{}\"", printable(value)),
            };
            writeln!(
                self.out,
                "  {:<18} {:<18} {}",
                control.label.bold(),
                control.id.dimmed(),
                value
            )?;
        }
        Ok(())
    }

    fn password(&mut self, view: &PasswordView) -> Result<()> {
        writeln!(self.out, "{}", view.title.bold().cyan())?;
        writeln!(self.out, "  {}", self.painted(&view.glyphs))?;
        writeln!(self.out, "  {} {} bits", "Entropy:".bold(), view.entropy)?;
        match &view.panel {
            PanelView::Placeholder => {}
            PanelView::Qr { .. } => {
                writeln!(
                    self.out,
                    "  {} {}",
                    "QR:".bold(),
                    "available (write it with --qr-out FILE)".dimmed()
                )?;
            }
            PanelView::Analysis(analysis) => {
                for line in [&analysis.score, &analysis.warning, &analysis.tip]
                    .into_iter()
                    .flatten()
                {
                    writeln!(self.out, "  {}", printable(line))?;
                }
            }
        }
        Ok(())
    }

    fn history(&mut self, rows: &[HistoryRow]) -> Result<()> {
        if rows.is_empty() {
            writeln!(self.out, "{}", "No history yet.".yellow())?;
            return Ok(());
        }
        for row in rows {
            writeln!(
                self.out,
                "  {:>3}  {}  {}",
                row.index,
                self.painted(&row.glyphs),
                format!("{} • {}", printable(&row.label), printable(&row.when)).dimmed()
            )?;
        }
        Ok(())
    }

    fn notification(&mut self, notification: &Notification) -> Result<()> {
        let message = printable(&notification.message);
        let line = match notification.level {
            Level::Success => format!("✓ {message}").green(),
            Level::Warning => format!("! {message}").yellow(),
            Level::Danger => format!("✗ {message}").red(),
        };
        writeln!(self.out, "{line}")?;
        Ok(())
    }

    fn key_badge(&mut self, badge: &KeyBadge) -> Result<()> {
        let text = match badge.unlocked {
            Some(true) => badge.text.green().bold(),
            Some(false) => badge.text.red().bold(),
            None => badge.text.dimmed(),
        };
        writeln!(self.out, "  {} {}", "History key:".bold(), text)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// HTML
// ---------------------------------------------------------------------------

/// Markup fragments. Every server- or user-supplied string is escaped.
pub struct HtmlSurface<W: Write> {
    out: W,
}

impl<W: Write> HtmlSurface<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Surface for HtmlSurface<W> {
    fn controls(&mut self, title: &str, controls: &[ControlView]) -> Result<()> {
        writeln!(self.out, "<h2>{}</h2>", escape_html(title))?;
        for control in controls {
            let label = escape_html(control.label);
            let input = match &control.widget {
                Widget::Range {
                    min,
                    max,
                    step,
                    value,
                } => format!(
                    "<input type=\"range\" id=\"input-{id}\" min=\"{min}\" max=\"{max}\" step=\"{step}\" value=\"{value}\">",
                    id = control.id
                ),
                Widget::Checkbox { checked } => format!(
                    "<input type=\"checkbox\" id=\"input-{}\"{}>",
                    control.id,
                    if *checked { " checked" } else { "" }
                ),
                Widget::Select { options } | Widget::Preset { options } => {
                    let opts: String = options
                        .iter()
                        .map(|o| {
                            format!(
                                "<option value=\"{}\"{}>{}</option>",
                                escape_html(&o.value),
                                if o.selected { " selected" } else { "" },
                                escape_html(&o.label)
                            )
                        })
                        .collect();
                    format!("<select id=\"input-{}\">{opts}</select>", control.id)
                }
                Widget::Text { value } => format!(
                    "<input type=\"text\" id=\"input-{}\" value=\"{}\">",
                    control.id,
                    escape_html(value)
                ),
            };
            let readout = control
                .readout
                .as_ref()
                .map(|r| format!("<span id=\"val-{}\">{}</span>", control.id, escape_html(r)))
                .unwrap_or_default();
            writeln!(
                self.out,
                "<div class=\"control-item\"><span>{label}</span>{readout}{input}</div>"
            )?;
        }
        Ok(())
    }

    fn password(&mut self, view: &PasswordView) -> Result<()> {
        writeln!(
            self.out,
            "<div id=\"password-display\">{}</div>",
            glyphs_to_html(&view.glyphs)
        )?;
        writeln!(
            self.out,
            "<span id=\"entropy-value\">{}</span>",
            escape_html(&view.entropy)
        )?;
        let panel = match &view.panel {
            PanelView::Placeholder => "<div class=\"qr-placeholder\"></div>".to_string(),
            PanelView::Qr { png_base64 } => format!(
                "<img src=\"data:image/png;base64,{}\" alt=\"QR Code\">",
                escape_html(png_base64)
            ),
            PanelView::Analysis(analysis) => {
                let lines: Vec<String> = [&analysis.score, &analysis.warning, &analysis.tip]
                    .into_iter()
                    .flatten()
                    .map(|l| escape_html(l))
                    .collect();
                format!("<div class=\"analysis\">{}</div>", lines.join("<br>"))
            }
        };
        writeln!(self.out, "<div id=\"qr-container\">{panel}</div>")?;
        Ok(())
    }

    fn history(&mut self, rows: &[HistoryRow]) -> Result<()> {
        for row in rows {
            writeln!(
                self.out,
                "<div class=\"history-item\"><div class=\"history-item-pwd\">{}</div><div class=\"history-item-meta\">{} • {}</div><button class=\"history-copy-btn\" data-index=\"{}\">Copy</button></div>",
                glyphs_to_html(&row.glyphs),
                escape_html(&row.label),
                escape_html(&row.when),
                row.index
            )?;
        }
        Ok(())
    }

    fn notification(&mut self, notification: &Notification) -> Result<()> {
        let class = match notification.level {
            Level::Success => "success",
            Level::Warning => "warning",
            Level::Danger => "danger",
        };
        writeln!(
            self.out,
            "<div class=\"toast {class}\">{}</div>",
            escape_html(&notification.message)
        )?;
        Ok(())
    }

    fn key_badge(&mut self, badge: &KeyBadge) -> Result<()> {
        writeln!(
            self.out,
            "<span id=\"key-status-badge\">{}</span>",
            escape_html(badge.text)
        )?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------------

/// One JSON document per call, for scripting.
pub struct JsonSurface<W: Write> {
    out: W,
}

impl<W: Write> JsonSurface<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, value: serde_json::Value) -> Result<()> {
        writeln!(self.out, "{}", serde_json::to_string_pretty(&value)?)?;
        Ok(())
    }
}

impl<W: Write> Surface for JsonSurface<W> {
    fn controls(&mut self, title: &str, controls: &[ControlView]) -> Result<()> {
        self.emit(serde_json::json!({ "title": title, "controls": controls }))
    }

    fn password(&mut self, view: &PasswordView) -> Result<()> {
        self.emit(serde_json::json!({
            "title": view.title,
            "password": view.text,
            "entropy": view.entropy,
            "panel": view.panel,
        }))
    }

    fn history(&mut self, rows: &[HistoryRow]) -> Result<()> {
        let rows: Vec<_> = rows
            .iter()
            .map(|r| {
                serde_json::json!({
                    "index": r.index,
                    "password": r.password,
                    "generator_type": r.label,
                    "when": r.when,
                })
            })
            .collect();
        self.emit(serde_json::Value::Array(rows))
    }

    fn notification(&mut self, notification: &Notification) -> Result<()> {
        let level = match notification.level {
            Level::Success => "success",
            Level::Warning => "warning",
            Level::Danger => "danger",
        };
        self.emit(serde_json::json!({ "notification": notification.message, "level": level }))
    }

    fn key_badge(&mut self, badge: &KeyBadge) -> Result<()> {
        self.emit(serde_json::json!({ "key_status": badge.text }))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{AppState, HistoryEntry};
    use crate::view::{controls_view, history_rows, password_view};

    fn state_with_history() -> AppState {
        let mut state = AppState::default();
        state.display.text = "Ab<1".into();
        state.display.entropy = 26.2;
        state.record_generation(HistoryEntry {
            password: "x&y".into(),
            generator_type: "<script>".into(),
            timestamp: "2026-01-01T00:00:00Z".into(),
        });
        state
    }

    #[test]
    fn terminal_surface_prints_plain_text_without_colour() {
        colored::control::set_override(false);
        let state = state_with_history();
        let mut surface = TerminalSurface::new(Vec::new(), Theme::Dark);
        surface.password(&password_view(&state)).unwrap();
        let out = String::from_utf8(surface.into_inner()).unwrap();
        assert!(out.contains("Ab<1"));
        assert!(out.contains("26.2 bits"));
    }

    #[test]
    fn terminal_surface_shows_control_characters_as_escapes() {
        colored::control::set_override(false);
        let mut state = state_with_history();
        state.display.text = "a\x1b[2Jb".into();
        let mut surface = TerminalSurface::new(Vec::new(), Theme::Dark);
        surface.password(&password_view(&state)).unwrap();
        surface
            .notification(&Notification {
                message: "Error: \x1b]52;c;aGk=\x07".into(),
                level: Level::Danger,
            })
            .unwrap();
        let out = String::from_utf8(surface.into_inner()).unwrap();

        assert!(!out.contains('\x1b'), "{out:?}");
        assert!(!out.contains('\x07'), "{out:?}");
        assert!(out.contains("a\\u{1b}[2Jb"), "{out:?}");
        assert!(out.contains("Error: \\u{1b}]52;c;aGk=\\u{7}"), "{out:?}");
    }

    #[test]
    fn html_surface_escapes_history_labels() {
        let state = state_with_history();
        let mut surface = HtmlSurface::new(Vec::new());
        surface.history(&history_rows(&state)).unwrap();
        let out = String::from_utf8(surface.into_inner()).unwrap();
        assert!(out.contains("&lt;script&gt;"));
        assert!(!out.contains("<script>"));
        assert!(out.contains("<span class=\"symbol\">&amp;</span>"));
    }

    #[test]
    fn html_surface_assigns_text_value_escaped() {
        let mut state = AppState::default();
        state.select_type(crate::generator::GeneratorType::Analyze);
        state.set_field("password", "\"><img>").unwrap();
        let mut surface = HtmlSurface::new(Vec::new());
        surface.controls("Analyze", &controls_view(&state)).unwrap();
        let out = String::from_utf8(surface.into_inner()).unwrap();
        assert!(out.contains("value=\"&quot;&gt;&lt;img&gt;\""));
    }

    #[test]
    fn json_surface_emits_password_document() {
        let state = state_with_history();
        let mut surface = JsonSurface::new(Vec::new());
        surface.password(&password_view(&state)).unwrap();
        let out = String::from_utf8(surface.into_inner()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["password"], "Ab<1");
        assert_eq!(value["entropy"], "26.2");
        assert_eq!(value["panel"]["kind"], "placeholder");
    }
}
