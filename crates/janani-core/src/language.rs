//! Reply language for a caller, and how it is picked from flags, JSON and
//! keypad digits.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Language a caller is spoken to in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    #[default]
    English,
    Hindi,
}

impl Language {
    /// BCP-47 locale passed to the telephony provider for speech
    /// recognition and synthesis.
    pub fn voice_locale(self) -> &'static str {
        match self {
            Self::English => "en-IN",
            Self::Hindi => "hi-IN",
        }
    }

    /// Map a keypad digit from the language menu: `1` is English, `2` is
    /// Hindi. Anything else keeps the default.
    pub fn from_digit(digits: &str) -> Self {
        match digits.trim() {
            "2" => Self::Hindi,
            _ => Self::English,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::English => "english",
            Self::Hindi => "hindi",
        };
        f.write_str(s)
    }
}

impl FromStr for Language {
    type Err = LanguageParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "english" | "en" | "en-in" => Ok(Self::English),
            "hindi" | "hi" | "hi-in" => Ok(Self::Hindi),
            _ => Err(LanguageParseError(s.to_owned())),
        }
    }
}

/// Error returned when parsing an unsupported [`Language`] string.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unsupported language: {0:?} (expected english or hindi)")]
pub struct LanguageParseError(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_names_and_locales() {
        assert_eq!("english".parse::<Language>().unwrap(), Language::English);
        assert_eq!("Hindi".parse::<Language>().unwrap(), Language::Hindi);
        assert_eq!("hi-IN".parse::<Language>().unwrap(), Language::Hindi);
        assert!("tamil".parse::<Language>().is_err());
    }

    #[test]
    fn display_round_trips_through_from_str() {
        for lang in [Language::English, Language::Hindi] {
            assert_eq!(lang.to_string().parse::<Language>().unwrap(), lang);
        }
    }

    #[test]
    fn keypad_digits() {
        assert_eq!(Language::from_digit("1"), Language::English);
        assert_eq!(Language::from_digit("2"), Language::Hindi);
        assert_eq!(Language::from_digit("9"), Language::English);
        assert_eq!(Language::from_digit(""), Language::English);
    }

    #[test]
    fn serde_uses_snake_case_names() {
        let json = serde_json::to_string(&Language::Hindi).unwrap();
        assert_eq!(json, "\"hindi\"");
    }
}
