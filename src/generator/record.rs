//! Per-type field records and their defaults.

use std::collections::BTreeMap;

use super::GeneratorType;
use super::schema::{FieldError, FieldValue, find_control};

/// Field name -> value for one generator type.
pub type FieldRecord = BTreeMap<String, FieldValue>;

/// The configured values of every generator type.
///
/// Records hold more than the rendered controls: `random` carries the
/// minimum-count fields that only presets set, `phrase` carries `easy_read`.
/// All of them are sent with a generate request.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorConfig {
    records: BTreeMap<GeneratorType, FieldRecord>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        let records = GeneratorType::ALL
            .iter()
            .map(|&ty| (ty, default_record(ty)))
            .collect();
        Self { records }
    }
}

impl GeneratorConfig {
    pub fn record(&self, ty: GeneratorType) -> &FieldRecord {
        // Every type is seeded in `default()` and records are never removed.
        &self.records[&ty]
    }

    pub fn record_mut(&mut self, ty: GeneratorType) -> &mut FieldRecord {
        self.records.entry(ty).or_default()
    }

    pub fn get(&self, ty: GeneratorType, field: &str) -> Option<&FieldValue> {
        self.record(ty).get(field)
    }

    /// Set one field, enforcing the control's domain.
    ///
    /// Fields without a control (e.g. `min_upper`) must already exist in the
    /// record and keep their variant.
    pub fn set(
        &mut self,
        ty: GeneratorType,
        field: &str,
        value: FieldValue,
    ) -> Result<(), FieldError> {
        check_field(ty, self.record(ty), field, &value)?;
        self.record_mut(ty).insert(field.to_string(), value);
        Ok(())
    }

    /// Parse a raw string for `field` and store it.
    pub fn set_raw(&mut self, ty: GeneratorType, field: &str, raw: &str) -> Result<(), FieldError> {
        let value = match find_control(ty, field) {
            Some(spec) => spec.parse(raw)?,
            None => {
                let existing = self.get(ty, field).ok_or_else(|| FieldError::UnknownField {
                    generator: ty,
                    field: field.to_string(),
                })?;
                parse_like(existing, field, raw)?
            }
        };
        self.set(ty, field, value)
    }
}

/// Validate a value for `field` of `ty` against its control, or against the
/// existing record entry when the field has no control.
pub(crate) fn check_field(
    ty: GeneratorType,
    record: &FieldRecord,
    field: &str,
    value: &FieldValue,
) -> Result<(), FieldError> {
    if let Some(spec) = find_control(ty, field) {
        return spec.validate(value);
    }
    match record.get(field) {
        Some(existing) if existing.same_kind(value) => Ok(()),
        Some(_) => Err(FieldError::WrongKind {
            field: field.to_string(),
            expected: kind_name(record.get(field)),
        }),
        None => Err(FieldError::UnknownField {
            generator: ty,
            field: field.to_string(),
        }),
    }
}

fn kind_name(value: Option<&FieldValue>) -> &'static str {
    match value {
        Some(FieldValue::Bool(_)) => "boolean",
        Some(FieldValue::Int(_)) => "integer",
        _ => "text",
    }
}

fn parse_like(existing: &FieldValue, field: &str, raw: &str) -> Result<FieldValue, FieldError> {
    let wrong = || FieldError::WrongKind {
        field: field.to_string(),
        expected: kind_name(Some(existing)),
    };
    match existing {
        FieldValue::Int(_) => raw.trim().parse().map(FieldValue::Int).map_err(|_| wrong()),
        FieldValue::Bool(_) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(FieldValue::Bool(true)),
            "0" | "false" | "no" | "off" => Ok(FieldValue::Bool(false)),
            _ => Err(wrong()),
        },
        FieldValue::Text(_) => Ok(FieldValue::Text(raw.to_string())),
    }
}

fn int(n: i64) -> FieldValue {
    FieldValue::Int(n)
}

fn flag(b: bool) -> FieldValue {
    FieldValue::Bool(b)
}

fn text(s: &str) -> FieldValue {
    FieldValue::Text(s.to_string())
}

/// Built-in starting values for a generator type.
pub fn default_record(ty: GeneratorType) -> FieldRecord {
    let pairs: Vec<(&str, FieldValue)> = match ty {
        GeneratorType::Random => vec![
            ("length", int(16)),
            ("uppercase", flag(true)),
            ("lowercase", flag(true)),
            ("digits", flag(true)),
            ("symbols", flag(true)),
            ("easy_read", flag(false)),
            ("easy_say", flag(false)),
            ("balanced", flag(false)),
            ("no_repeats", flag(false)),
            ("min_upper", int(0)),
            ("min_lower", int(0)),
            ("min_digits", int(0)),
            ("min_symbols", int(0)),
            ("include", text("")),
            ("exclude", text("")),
        ],
        GeneratorType::Phrase => vec![
            ("words", int(4)),
            ("separator", text("-")),
            ("capitalize", flag(false)),
            ("easy_read", flag(false)),
        ],
        GeneratorType::Pin => vec![("length", int(6))],
        GeneratorType::Wifi => vec![("length", int(16)), ("simple", flag(false))],
        GeneratorType::Otp => vec![("otp_digits", int(6)), ("period", int(30))],
        GeneratorType::Uuid => vec![("uppercase", flag(false))],
        GeneratorType::Leet => vec![("words", int(3)), ("separator", text("-"))],
        GeneratorType::Pronounce => vec![("length", int(12))],
        GeneratorType::License => vec![("segments", int(4)), ("segment_length", int(4))],
        GeneratorType::Pattern => vec![("grid", int(3))],
        GeneratorType::Phonetic => vec![("text", text("")), ("length", int(8))],
        GeneratorType::Recovery => Vec::new(),
        GeneratorType::Analyze => vec![("password", text(""))],
        GeneratorType::Base64 => vec![("length", int(32)), ("url_safe", flag(true))],
        GeneratorType::Jwt => vec![("bits", int(256)), ("hex", flag(false))],
    };
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
