//! Character classification for colour-coded passwords, and HTML escaping.

use serde::Serialize;

/// Colour class of one password character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CharClass {
    Upper,
    Lower,
    Digit,
    Symbol,
    /// Whitespace, `-` and `_`: shown as-is, without a colour span.
    Plain,
}

impl CharClass {
    pub fn classify(ch: char) -> Self {
        if ch.is_ascii_uppercase() {
            Self::Upper
        } else if ch.is_ascii_lowercase() {
            Self::Lower
        } else if ch.is_ascii_digit() {
            Self::Digit
        } else if ch.is_whitespace() || ch == '-' || ch == '_' {
            Self::Plain
        } else {
            Self::Symbol
        }
    }

    /// CSS class name used by the HTML surface.
    pub fn css_class(self) -> Option<&'static str> {
        match self {
            Self::Upper => Some("upper"),
            Self::Lower => Some("lower"),
            Self::Digit => Some("digit"),
            Self::Symbol => Some("symbol"),
            Self::Plain => None,
        }
    }
}

/// One classified character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Glyph {
    pub ch: char,
    pub class: CharClass,
}

/// Classify every character of `password`.
pub fn colorize(password: &str) -> Vec<Glyph> {
    password
        .chars()
        .map(|ch| Glyph {
            ch,
            class: CharClass::classify(ch),
        })
        .collect()
}

/// Replace the five HTML-reserved characters with entities.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            other => out.push(other),
        }
    }
    out
}

/// Render glyphs as HTML: classed characters in spans, plain ones bare.
pub fn glyphs_to_html(glyphs: &[Glyph]) -> String {
    let mut out = String::new();
    for glyph in glyphs {
        let escaped = escape_html(glyph.ch.encode_utf8(&mut [0u8; 4]));
        match glyph.class.css_class() {
            Some(class) => {
                out.push_str(&format!("<span class=\"{class}\">{escaped}</span>"));
            }
            None => out.push_str(&escaped),
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colorize_classifies_each_character() {
        let classes: Vec<CharClass> = colorize("Ab1 -_").iter().map(|g| g.class).collect();
        assert_eq!(
            classes,
            vec![
                CharClass::Upper,
                CharClass::Lower,
                CharClass::Digit,
                CharClass::Plain,
                CharClass::Plain,
                CharClass::Plain,
            ]
        );
    }

    #[test]
    fn everything_else_is_a_symbol() {
        for ch in ['!', '@', '.', '~', 'é', 'Ω', '<'] {
            assert_eq!(CharClass::classify(ch), CharClass::Symbol, "{ch}");
        }
    }

    #[test]
    fn tabs_and_newlines_are_plain() {
        assert_eq!(CharClass::classify('\t'), CharClass::Plain);
        assert_eq!(CharClass::classify('\n'), CharClass::Plain);
    }

    #[test]
    fn escape_html_replaces_reserved_characters() {
        assert_eq!(
            escape_html(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#039;Jerry&#039;&lt;/a&gt;"
        );
    }

    #[test]
    fn escape_html_leaves_other_characters() {
        let text = "plain text, ünïcödé 123 -_/\\";
        assert_eq!(escape_html(text), text);
    }

    #[test]
    fn html_wraps_classed_characters_only() {
        assert_eq!(
            glyphs_to_html(&colorize("a-<")),
            "<span class=\"lower\">a</span>-<span class=\"symbol\">&lt;</span>"
        );
    }
}
