//! Declarative per-type control schema.
//!
//! Each generator type declares an ordered list of controls. The schema is
//! the single source of truth for which fields are rendered and for the
//! domain a configured value must stay inside.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::GeneratorType;

// ---------------------------------------------------------------------------
// Field values
// ---------------------------------------------------------------------------

/// A configured field value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl FieldValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Whether two values carry the same variant.
    pub fn same_kind(&self, other: &FieldValue) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    /// Convert a JSON value (as delivered in a preset) into a field value.
    pub fn from_json(value: &serde_json::Value) -> Option<FieldValue> {
        match value {
            serde_json::Value::Bool(b) => Some(Self::Bool(*b)),
            serde_json::Value::Number(n) => n.as_i64().map(Self::Int),
            serde_json::Value::String(s) => Some(Self::Text(s.clone())),
            _ => None,
        }
    }
}

/// Query-string rendering: `true`/`false`, decimal integers, raw text.
impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

// ---------------------------------------------------------------------------
// Control kinds
// ---------------------------------------------------------------------------

/// One entry of a select control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectOption {
    Text(&'static str),
    Int(i64),
}

impl SelectOption {
    pub fn value(&self) -> FieldValue {
        match self {
            Self::Text(s) => FieldValue::Text((*s).to_string()),
            Self::Int(n) => FieldValue::Int(*n),
        }
    }

    /// Display label. A lone space is unreadable in a list, so it is named.
    pub fn label(&self) -> String {
        match self {
            Self::Text(" ") => "Space".to_string(),
            Self::Text(s) => (*s).to_string(),
            Self::Int(n) => n.to_string(),
        }
    }

    fn matches_raw(&self, raw: &str) -> bool {
        match self {
            Self::Text(" ") => raw == " " || raw.eq_ignore_ascii_case("space"),
            Self::Text(s) => *s == raw,
            Self::Int(n) => raw.trim().parse::<i64>().is_ok_and(|v| v == *n),
        }
    }
}

/// The kind of control a field is rendered as, with its domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Numeric slider with a live readout.
    Range { min: i64, max: i64, step: i64 },
    Checkbox,
    Select(&'static [SelectOption]),
    /// Free text, assigned as a value and never interpreted as markup.
    Text,
    /// Select populated from the fetched preset names.
    Preset,
}

impl FieldKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Range { .. } => "range",
            Self::Checkbox => "checkbox",
            Self::Select(_) => "select",
            Self::Text => "text",
            Self::Preset => "preset",
        }
    }
}

/// One declared control: `{id, label, type, constraints}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub id: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
}

impl FieldSpec {
    const fn new(id: &'static str, label: &'static str, kind: FieldKind) -> Self {
        Self { id, label, kind }
    }

    /// Check that `value` lies inside this control's domain.
    pub fn validate(&self, value: &FieldValue) -> Result<(), FieldError> {
        match (self.kind, value) {
            (FieldKind::Range { min, max, step }, FieldValue::Int(n)) => {
                if *n < min || *n > max {
                    return Err(FieldError::OutOfRange {
                        field: self.id.to_string(),
                        value: *n,
                        min,
                        max,
                    });
                }
                if step > 1 && (*n - min) % step != 0 {
                    return Err(FieldError::OffStep {
                        field: self.id.to_string(),
                        value: *n,
                        step,
                    });
                }
                Ok(())
            }
            (FieldKind::Checkbox, FieldValue::Bool(_)) => Ok(()),
            (FieldKind::Select(options), v) => {
                if options.iter().any(|o| o.value() == *v) {
                    Ok(())
                } else {
                    Err(FieldError::NotAnOption {
                        field: self.id.to_string(),
                        value: v.to_string(),
                    })
                }
            }
            (FieldKind::Text, FieldValue::Text(_)) => Ok(()),
            (kind, _) => Err(FieldError::WrongKind {
                field: self.id.to_string(),
                expected: kind.name(),
            }),
        }
    }

    /// Parse raw user input (a CLI `--set` value or a shell `set` line)
    /// into a value for this control, then validate it.
    pub fn parse(&self, raw: &str) -> Result<FieldValue, FieldError> {
        let value = match self.kind {
            FieldKind::Range { .. } => {
                let n = raw.trim().parse::<i64>().map_err(|_| FieldError::WrongKind {
                    field: self.id.to_string(),
                    expected: "range",
                })?;
                FieldValue::Int(n)
            }
            FieldKind::Checkbox => {
                let b = parse_bool(raw).ok_or_else(|| FieldError::WrongKind {
                    field: self.id.to_string(),
                    expected: "checkbox",
                })?;
                FieldValue::Bool(b)
            }
            FieldKind::Select(options) => options
                .iter()
                .find(|o| o.matches_raw(raw))
                .map(SelectOption::value)
                .ok_or_else(|| FieldError::NotAnOption {
                    field: self.id.to_string(),
                    value: raw.to_string(),
                })?,
            FieldKind::Text => FieldValue::Text(raw.to_string()),
            FieldKind::Preset => {
                return Err(FieldError::WrongKind {
                    field: self.id.to_string(),
                    expected: "preset name (use the preset command)",
                });
            }
        };
        self.validate(&value)?;
        Ok(value)
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A field value that falls outside its control's domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    UnknownField {
        generator: GeneratorType,
        field: String,
    },
    OutOfRange {
        field: String,
        value: i64,
        min: i64,
        max: i64,
    },
    OffStep {
        field: String,
        value: i64,
        step: i64,
    },
    NotAnOption {
        field: String,
        value: String,
    },
    WrongKind {
        field: String,
        expected: &'static str,
    },
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownField { generator, field } => {
                write!(f, "'{field}' is not a field of the {generator} generator")
            }
            Self::OutOfRange {
                field,
                value,
                min,
                max,
            } => write!(f, "{field} = {value} is outside {min}..={max}"),
            Self::OffStep { field, value, step } => {
                write!(f, "{field} = {value} is not a multiple of the step {step}")
            }
            Self::NotAnOption { field, value } => {
                write!(f, "'{value}' is not an option for {field}")
            }
            Self::WrongKind { field, expected } => write!(f, "{field} expects a {expected} value"),
        }
    }
}

impl std::error::Error for FieldError {}

// ---------------------------------------------------------------------------
// Schemas
// ---------------------------------------------------------------------------

const fn range(min: i64, max: i64, step: i64) -> FieldKind {
    FieldKind::Range { min, max, step }
}

const PHRASE_SEPARATORS: &[SelectOption] = &[
    SelectOption::Text("-"),
    SelectOption::Text("_"),
    SelectOption::Text("."),
    SelectOption::Text(" "),
    SelectOption::Text(","),
];

const LEET_SEPARATORS: &[SelectOption] = &[
    SelectOption::Text("-"),
    SelectOption::Text("_"),
    SelectOption::Text("."),
    SelectOption::Text(","),
];

const GRID_SIZES: &[SelectOption] = &[
    SelectOption::Int(3),
    SelectOption::Int(4),
    SelectOption::Int(5),
];

const OTP_DIGITS: &[SelectOption] = &[SelectOption::Int(6), SelectOption::Int(8)];

const RANDOM: &[FieldSpec] = &[
    FieldSpec::new("preset", "Security Preset", FieldKind::Preset),
    FieldSpec::new("length", "Length", range(4, 128, 1)),
    FieldSpec::new("uppercase", "Uppercase", FieldKind::Checkbox),
    FieldSpec::new("lowercase", "Lowercase", FieldKind::Checkbox),
    FieldSpec::new("digits", "Digits", FieldKind::Checkbox),
    FieldSpec::new("symbols", "Symbols", FieldKind::Checkbox),
    FieldSpec::new("easy_read", "Easy to Read", FieldKind::Checkbox),
    FieldSpec::new("easy_say", "Easy to Say", FieldKind::Checkbox),
    FieldSpec::new("no_repeats", "No Repeats", FieldKind::Checkbox),
    FieldSpec::new("balanced", "Balanced Ratio", FieldKind::Checkbox),
    FieldSpec::new("include", "Include Chars", FieldKind::Text),
    FieldSpec::new("exclude", "Exclude Chars", FieldKind::Text),
];

const PHRASE: &[FieldSpec] = &[
    FieldSpec::new("words", "Words", range(2, 12, 1)),
    FieldSpec::new("separator", "Separator", FieldKind::Select(PHRASE_SEPARATORS)),
    FieldSpec::new("capitalize", "Capitalize", FieldKind::Checkbox),
];

const PIN: &[FieldSpec] = &[FieldSpec::new("length", "Length", range(4, 16, 1))];

const WIFI: &[FieldSpec] = &[
    FieldSpec::new("length", "Length", range(8, 63, 1)),
    FieldSpec::new("simple", "Alpha-only", FieldKind::Checkbox),
];

const LEET: &[FieldSpec] = &[
    FieldSpec::new("words", "Words", range(2, 8, 1)),
    FieldSpec::new("separator", "Separator", FieldKind::Select(LEET_SEPARATORS)),
];

const LICENSE: &[FieldSpec] = &[
    FieldSpec::new("segments", "Segments", range(2, 10, 1)),
    FieldSpec::new("segment_length", "Length", range(2, 10, 1)),
];

const PATTERN: &[FieldSpec] = &[FieldSpec::new(
    "grid",
    "Grid Size",
    FieldKind::Select(GRID_SIZES),
)];

const PHONETIC: &[FieldSpec] = &[
    FieldSpec::new("text", "Text to Phonetic", FieldKind::Text),
    FieldSpec::new("length", "Random Length", range(4, 32, 1)),
];

const ANALYZE: &[FieldSpec] = &[FieldSpec::new(
    "password",
    "Password to Check",
    FieldKind::Text,
)];

const BASE64: &[FieldSpec] = &[
    FieldSpec::new("length", "Byte Length", range(8, 128, 1)),
    FieldSpec::new("url_safe", "URL Safe", FieldKind::Checkbox),
];

const JWT: &[FieldSpec] = &[
    FieldSpec::new("bits", "Bit Length", range(128, 1024, 64)),
    FieldSpec::new("hex", "Output as Hex", FieldKind::Checkbox),
];

const PRONOUNCE: &[FieldSpec] = &[FieldSpec::new("length", "Length", range(6, 32, 1))];

const OTP: &[FieldSpec] = &[
    FieldSpec::new("otp_digits", "Digits", FieldKind::Select(OTP_DIGITS)),
    FieldSpec::new("period", "Period (s)", range(15, 120, 15)),
];

const UUID: &[FieldSpec] = &[FieldSpec::new("uppercase", "Uppercase", FieldKind::Checkbox)];

/// Ordered control schema for a generator type.
pub fn control_schema(ty: GeneratorType) -> &'static [FieldSpec] {
    match ty {
        GeneratorType::Random => RANDOM,
        GeneratorType::Phrase => PHRASE,
        GeneratorType::Pin => PIN,
        GeneratorType::Wifi => WIFI,
        GeneratorType::Otp => OTP,
        GeneratorType::Uuid => UUID,
        GeneratorType::Leet => LEET,
        GeneratorType::Pronounce => PRONOUNCE,
        GeneratorType::License => LICENSE,
        GeneratorType::Pattern => PATTERN,
        GeneratorType::Phonetic => PHONETIC,
        GeneratorType::Recovery => &[],
        GeneratorType::Analyze => ANALYZE,
        GeneratorType::Base64 => BASE64,
        GeneratorType::Jwt => JWT,
    }
}

/// Look up the control declared for `field` on `ty`, if any.
pub fn find_control(ty: GeneratorType, field: &str) -> Option<&'static FieldSpec> {
    control_schema(ty).iter().find(|spec| spec.id == field)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
