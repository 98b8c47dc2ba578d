//! Grounded response generation and conversation handling.
//!
//! - [`prompt`]: context assembly and localized prompt templates
//! - [`ResponseGenerator`]: one completion call per answer
//! - [`ChatManager`]: retrieval, generation and best-effort turn recording
//! - [`TurnRecorder`]: optional persistence of chat turns

mod generator;
mod history;
mod manager;
pub mod prompt;

pub use generator::{GenerationError, ResponseGenerator};
pub use history::{ChatTurn, InMemoryTurnRecorder, RecordError, Session, TurnRecorder};
pub use manager::{Answer, AskRequest, ChatManager};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Language of the prompt templates and the apology text.
///
/// Arabic is the primary locale; English is the fallback.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Locale {
    #[default]
    #[serde(rename = "ar")]
    Arabic,
    #[serde(rename = "en")]
    English,
}

impl Locale {
    pub fn code(&self) -> &'static str {
        match self {
            Locale::Arabic => "ar",
            Locale::English => "en",
        }
    }

    /// Picks the locale for a detected document language. Anything that is
    /// not Arabic gets the fallback.
    pub fn for_language(language: &str) -> Self {
        if language.eq_ignore_ascii_case("ar") {
            Locale::Arabic
        } else {
            Locale::English
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Locale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ar" | "arabic" => Ok(Locale::Arabic),
            "en" | "english" => Ok(Locale::English),
            other => Err(format!("unknown locale '{}', expected 'ar' or 'en'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locale_serde_codes() {
        assert_eq!(serde_json::to_string(&Locale::Arabic).unwrap(), "\"ar\"");
        let parsed: Locale = serde_json::from_str("\"en\"").unwrap();
        assert_eq!(parsed, Locale::English);
    }

    #[test]
    fn test_locale_from_str() {
        assert_eq!("AR".parse::<Locale>().unwrap(), Locale::Arabic);
        assert_eq!("english".parse::<Locale>().unwrap(), Locale::English);
        assert!("fr".parse::<Locale>().is_err());
    }

    #[test]
    fn test_locale_for_language() {
        assert_eq!(Locale::for_language("ar"), Locale::Arabic);
        assert_eq!(Locale::for_language("en"), Locale::English);
        assert_eq!(Locale::for_language("unknown"), Locale::English);
    }
}
