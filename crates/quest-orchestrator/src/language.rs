//! Practice languages and the per-language voice policy.
//!
//! Three languages are fully supported: German, English and French. Clients
//! may still send other codes; such a request resolves to "unknown" and the
//! fallback policy applies (German question prompt, English feedback prompt,
//! English voices, automatic language detection for transcription).

use serde::{Deserialize, Serialize};

/// Question voice used when the language is unknown.
pub const FALLBACK_QUESTION_VOICE: &str = "en-US-JennyNeural";

/// Feedback voice used when the language is unknown.
pub const FALLBACK_FEEDBACK_VOICE: &str = "en-US-AriaNeural";

/// A supported practice language.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Language {
    /// German (default).
    #[default]
    German,
    /// English.
    English,
    /// French.
    French,
}

impl Language {
    /// Every supported language.
    pub const ALL: [Self; 3] = [Self::German, Self::English, Self::French];

    /// Parses a language code case-insensitively.
    ///
    /// Region suffixes are ignored, so `de-DE` and `en_GB` are accepted.
    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        let primary = code
            .trim()
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_lowercase();
        match primary.as_str() {
            "de" => Some(Self::German),
            "en" => Some(Self::English),
            "fr" => Some(Self::French),
            _ => None,
        }
    }

    /// The two-letter code, also used as the transcription hint.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::German => "de",
            Self::English => "en",
            Self::French => "fr",
        }
    }

    /// Voice that reads questions aloud.
    #[must_use]
    pub const fn question_voice(self) -> &'static str {
        match self {
            Self::German => "de-DE-KatjaNeural",
            Self::English => "en-US-JennyNeural",
            Self::French => "fr-FR-DeniseNeural",
        }
    }

    /// Voice that reads feedback aloud.
    #[must_use]
    pub const fn feedback_voice(self) -> &'static str {
        match self {
            Self::German => "de-DE-KatjaNeural",
            Self::English => "en-US-AriaNeural",
            Self::French => "fr-FR-DeniseNeural",
        }
    }

    /// Message returned when a recording contained no recognizable speech.
    #[must_use]
    pub const fn no_speech_message(self) -> &'static str {
        match self {
            Self::German => "Keine Erkennung möglich.",
            Self::English => "No speech recognized.",
            Self::French => "Aucune parole reconnue.",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl<'de> Deserialize<'de> for Language {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_code(&s).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "invalid language '{s}': expected one of 'de', 'en', 'fr'"
            ))
        })
    }
}

impl Serialize for Language {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.code())
    }
}

/// Question voice for a resolved language, English when unknown.
#[must_use]
pub fn question_voice(language: Option<Language>) -> &'static str {
    language.map_or(FALLBACK_QUESTION_VOICE, Language::question_voice)
}

/// Feedback voice for a resolved language, English when unknown.
#[must_use]
pub fn feedback_voice(language: Option<Language>) -> &'static str {
    language.map_or(FALLBACK_FEEDBACK_VOICE, Language::feedback_voice)
}

/// The language a client asked for on a single request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RequestedLanguage {
    /// The request carried no language.
    #[default]
    Unspecified,
    /// A supported language.
    Known(Language),
    /// A code outside the supported set.
    Unknown(String),
}

impl RequestedLanguage {
    /// Interprets an optional code from a request body or form field.
    ///
    /// Blank codes count as unspecified.
    #[must_use]
    pub fn parse(code: Option<&str>) -> Self {
        match code.map(str::trim) {
            None | Some("") => Self::Unspecified,
            Some(code) => Language::from_code(code)
                .map_or_else(|| Self::Unknown(code.to_string()), Self::Known),
        }
    }

    /// Resolves against `default`; `None` means unknown.
    #[must_use]
    pub const fn resolve(&self, default: Language) -> Option<Language> {
        match self {
            Self::Unspecified => Some(default),
            Self::Known(language) => Some(*language),
            Self::Unknown(_) => None,
        }
    }

    /// The supported language, if one was named.
    #[must_use]
    pub const fn known(&self) -> Option<Language> {
        match self {
            Self::Known(language) => Some(*language),
            Self::Unspecified | Self::Unknown(_) => None,
        }
    }
}
