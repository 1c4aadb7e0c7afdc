//! Security presets: named bundles of field overrides served by the backend.

use std::collections::BTreeMap;

use super::GeneratorType;
use super::record::{FieldRecord, check_field};
use super::schema::{FieldError, FieldValue};

/// One preset as served by `GET /api/presets`.
pub type Preset = serde_json::Map<String, serde_json::Value>;

/// Preset name -> overrides.
pub type Presets = BTreeMap<String, Preset>;

/// Key naming the CLI subcommand a preset was written for. Never applied.
const COMMAND_KEY: &str = "command";

/// Translate the backend's legacy minimum-count names to record names.
fn record_key(preset_key: &str) -> String {
    if preset_key.starts_with("min_") {
        preset_key
            .replace("min_uppercase", "min_upper")
            .replace("min_lowercase", "min_lower")
    } else {
        preset_key.to_string()
    }
}

/// Apply `preset` onto the record of `ty`.
///
/// Only keys present in the preset are written; everything else is left as
/// it was. Values are checked against the target control before anything
/// is written, so a rejected preset leaves the record untouched. Keys the
/// record does not know yet are added as-is. Returns the record keys that
/// were written.
pub fn apply_preset(
    ty: GeneratorType,
    record: &mut FieldRecord,
    preset: &Preset,
) -> Result<Vec<String>, FieldError> {
    let mut updates = Vec::with_capacity(preset.len());

    for (key, raw) in preset {
        if key == COMMAND_KEY {
            continue;
        }
        let field = record_key(key);
        let value = FieldValue::from_json(raw).ok_or_else(|| FieldError::WrongKind {
            field: field.clone(),
            expected: "boolean, integer or string",
        })?;
        match check_field(ty, record, &field, &value) {
            Ok(()) | Err(FieldError::UnknownField { .. }) => updates.push((field, value)),
            Err(e) => return Err(e),
        }
    }

    let written = updates.iter().map(|(k, _)| k.clone()).collect();
    record.extend(updates);
    Ok(written)
}

/// Display label for a preset name: first letter capitalized.
pub fn preset_label(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
