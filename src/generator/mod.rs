//! Generator types, their control schemas, per-type field records and presets.
//!
//! The backend owns every generation algorithm. This module only describes
//! what each generator accepts so the client can render controls, keep the
//! configured values inside each control's domain, and serialize them into
//! a `/api/generate` query string.

pub mod presets;
pub mod record;
pub mod schema;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use presets::{Preset, Presets, apply_preset, preset_label};
pub use record::{FieldRecord, GeneratorConfig};
pub use schema::{FieldError, FieldKind, FieldSpec, FieldValue, SelectOption, control_schema};

// ---------------------------------------------------------------------------
// Generator type
// ---------------------------------------------------------------------------

/// The credential kinds the backend can produce, plus `analyze`, which
/// scores a user-supplied password instead of generating one.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorType {
    #[default]
    Random,
    Phrase,
    Pin,
    Wifi,
    Otp,
    Uuid,
    Leet,
    Pronounce,
    License,
    Pattern,
    Phonetic,
    Recovery,
    Analyze,
    Base64,
    Jwt,
}

impl GeneratorType {
    /// Every generator type, in navigation order.
    pub const ALL: [GeneratorType; 15] = [
        Self::Random,
        Self::Phrase,
        Self::Pin,
        Self::Wifi,
        Self::Otp,
        Self::Uuid,
        Self::Leet,
        Self::Pronounce,
        Self::License,
        Self::Pattern,
        Self::Phonetic,
        Self::Recovery,
        Self::Analyze,
        Self::Base64,
        Self::Jwt,
    ];

    /// Wire name used in the `type` query parameter and in history entries.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Random => "random",
            Self::Phrase => "phrase",
            Self::Pin => "pin",
            Self::Wifi => "wifi",
            Self::Otp => "otp",
            Self::Uuid => "uuid",
            Self::Leet => "leet",
            Self::Pronounce => "pronounce",
            Self::License => "license",
            Self::Pattern => "pattern",
            Self::Phonetic => "phonetic",
            Self::Recovery => "recovery",
            Self::Analyze => "analyze",
            Self::Base64 => "base64",
            Self::Jwt => "jwt",
        }
    }

    /// Human-readable navigation label.
    pub fn title(self) -> &'static str {
        match self {
            Self::Random => "Random",
            Self::Phrase => "Passphrase",
            Self::Pin => "PIN",
            Self::Wifi => "WiFi Key",
            Self::Otp => "OTP",
            Self::Uuid => "UUID",
            Self::Leet => "Leetspeak",
            Self::Pronounce => "Pronounceable",
            Self::License => "License Key",
            Self::Pattern => "Pattern",
            Self::Phonetic => "Phonetic",
            Self::Recovery => "Recovery Codes",
            Self::Analyze => "Analyze",
            Self::Base64 => "Base64 Secret",
            Self::Jwt => "JWT Secret",
        }
    }

    /// Page heading shown above the controls.
    pub fn page_title(self) -> String {
        format!("{} Generator", self.title())
    }

    pub fn is_analyze(self) -> bool {
        self == Self::Analyze
    }
}

impl fmt::Display for GeneratorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GeneratorType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == needle)
            .ok_or_else(|| {
                let names: Vec<&str> = Self::ALL.iter().map(|t| t.as_str()).collect();
                anyhow::anyhow!(
                    "unknown generator type '{s}' (expected one of: {})",
                    names.join(", ")
                )
            })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_round_trip_through_from_str() {
        for ty in GeneratorType::ALL {
            assert_eq!(ty.as_str().parse::<GeneratorType>().unwrap(), ty);
        }
    }

    #[test]
    fn from_str_is_case_insensitive() {
        assert_eq!("JWT".parse::<GeneratorType>().unwrap(), GeneratorType::Jwt);
        assert_eq!(" Pin ".parse::<GeneratorType>().unwrap(), GeneratorType::Pin);
    }

    #[test]
    fn from_str_rejects_unknown() {
        let err = "history".parse::<GeneratorType>().unwrap_err();
        assert!(err.to_string().contains("unknown generator type"));
    }

    #[test]
    fn serde_uses_wire_names() {
        let json = serde_json::to_string(&GeneratorType::Base64).unwrap();
        assert_eq!(json, "\"base64\"");
        let ty: GeneratorType = serde_json::from_str("\"pronounce\"").unwrap();
        assert_eq!(ty, GeneratorType::Pronounce);
    }

    #[test]
    fn page_title_appends_generator() {
        assert_eq!(GeneratorType::Wifi.page_title(), "WiFi Key Generator");
    }
}
