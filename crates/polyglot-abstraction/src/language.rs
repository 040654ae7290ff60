//! The closed set of languages the service translates between.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A supported language code.
///
/// The set is closed: parsing any other code fails with [`LanguageError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageCode {
    /// English.
    En,
    /// Japanese.
    Ja,
    /// Mandarin Chinese (simplified script).
    Zh,
    /// Hindi.
    Hi,
    /// Sinhala.
    Si,
}

impl LanguageCode {
    /// Every supported language, in display order.
    pub const ALL: [Self; 5] = [Self::En, Self::Ja, Self::Zh, Self::Hi, Self::Si];

    /// The short wire code (`"en"`, `"ja"`, ...).
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Ja => "ja",
            Self::Zh => "zh",
            Self::Hi => "hi",
            Self::Si => "si",
        }
    }

    /// Human-readable language name.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::En => "English",
            Self::Ja => "Japanese",
            Self::Zh => "Mandarin",
            Self::Hi => "Hindi",
            Self::Si => "Sinhala",
        }
    }

    /// Flag emoji shown next to the language in user interfaces.
    #[must_use]
    pub const fn flag(self) -> &'static str {
        match self {
            Self::En => "🇬🇧",
            Self::Ja => "🇯🇵",
            Self::Zh => "🇨🇳",
            Self::Hi => "🇮🇳",
            Self::Si => "🇱🇰",
        }
    }

    /// FLORES-200 code, as expected by multilingual NLLB models.
    #[must_use]
    pub const fn flores_code(self) -> &'static str {
        match self {
            Self::En => "eng_Latn",
            Self::Ja => "jpn_Jpan",
            Self::Zh => "zho_Hans",
            Self::Hi => "hin_Deva",
            Self::Si => "sin_Sinh",
        }
    }
}

impl fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Errors produced when parsing language codes or pairs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LanguageError {
    /// The code is not one of the supported languages.
    #[error("unsupported language code '{0}' (supported: en, ja, zh, hi, si)")]
    Unsupported(String),

    /// A pair string was not of the form `src-tgt`.
    #[error("malformed language pair '{0}', expected '<source>-<target>'")]
    MalformedPair(String),
}

impl FromStr for LanguageCode {
    type Err = LanguageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|lang| lang.code() == trimmed)
            .ok_or_else(|| LanguageError::Unsupported(s.to_string()))
    }
}

/// An ordered (source, target) language pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LanguagePair {
    /// Language of the input text.
    pub source: LanguageCode,
    /// Language the text is translated into.
    pub target: LanguageCode,
}

impl LanguagePair {
    /// Creates a new pair.
    #[must_use]
    pub const fn new(source: LanguageCode, target: LanguageCode) -> Self {
        Self { source, target }
    }

    /// True when source and target are the same language.
    #[must_use]
    pub fn is_identity(self) -> bool {
        self.source == self.target
    }

    /// Every ordered pair of distinct supported languages.
    pub fn all_distinct() -> impl Iterator<Item = Self> {
        LanguageCode::ALL.into_iter().flat_map(|source| {
            LanguageCode::ALL
                .into_iter()
                .filter(move |target| *target != source)
                .map(move |target| Self::new(source, target))
        })
    }
}

impl fmt::Display for LanguagePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.source, self.target)
    }
}

impl FromStr for LanguagePair {
    type Err = LanguageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (source, target) =
            s.trim().split_once('-').ok_or_else(|| LanguageError::MalformedPair(s.to_string()))?;
        Ok(Self::new(source.parse()?, target.parse()?))
    }
}
