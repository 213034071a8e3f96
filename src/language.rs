//! Language resolution: user-supplied names or codes → backend language codes.
//!
//! The translation backend identifies languages by short codes (`"nl"`,
//! `"zh-cn"`). Users type names (`"Dutch"`), codes (`"NL"`) or a couple of
//! legacy aliases (`"iw"`). Every spelling is matched case-insensitively after
//! trimming whitespace, and every code maps to exactly one display name so
//! that `resolve(display_name(resolve(x))) == resolve(x)` holds.

use crate::error::{LanguageRole, UnknownLanguageError};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// `(code, lowercase name)` for every language the backend accepts.
const LANGUAGES: &[(&str, &str)] = &[
    ("af", "afrikaans"),
    ("sq", "albanian"),
    ("am", "amharic"),
    ("ar", "arabic"),
    ("hy", "armenian"),
    ("az", "azerbaijani"),
    ("eu", "basque"),
    ("be", "belarusian"),
    ("bn", "bengali"),
    ("bs", "bosnian"),
    ("bg", "bulgarian"),
    ("ca", "catalan"),
    ("ceb", "cebuano"),
    ("ny", "chichewa"),
    ("zh-cn", "chinese (simplified)"),
    ("zh-tw", "chinese (traditional)"),
    ("co", "corsican"),
    ("hr", "croatian"),
    ("cs", "czech"),
    ("da", "danish"),
    ("nl", "dutch"),
    ("en", "english"),
    ("eo", "esperanto"),
    ("et", "estonian"),
    ("ee", "ewe"),
    ("tl", "filipino"),
    ("fi", "finnish"),
    ("fr", "french"),
    ("fy", "frisian"),
    ("gl", "galician"),
    ("ka", "georgian"),
    ("de", "german"),
    ("el", "greek"),
    ("gu", "gujarati"),
    ("ht", "haitian creole"),
    ("ha", "hausa"),
    ("haw", "hawaiian"),
    ("he", "hebrew"),
    ("hi", "hindi"),
    ("hmn", "hmong"),
    ("hu", "hungarian"),
    ("is", "icelandic"),
    ("ig", "igbo"),
    ("id", "indonesian"),
    ("ga", "irish"),
    ("it", "italian"),
    ("ja", "japanese"),
    ("jw", "javanese"),
    ("kn", "kannada"),
    ("kk", "kazakh"),
    ("km", "khmer"),
    ("ko", "korean"),
    ("ku", "kurdish (kurmanji)"),
    ("ky", "kyrgyz"),
    ("lo", "lao"),
    ("la", "latin"),
    ("lv", "latvian"),
    ("lt", "lithuanian"),
    ("lb", "luxembourgish"),
    ("mk", "macedonian"),
    ("mg", "malagasy"),
    ("ms", "malay"),
    ("ml", "malayalam"),
    ("mt", "maltese"),
    ("mi", "maori"),
    ("mr", "marathi"),
    ("mn", "mongolian"),
    ("my", "myanmar (burmese)"),
    ("ne", "nepali"),
    ("no", "norwegian"),
    ("or", "odia"),
    ("ps", "pashto"),
    ("fa", "persian"),
    ("pl", "polish"),
    ("pt", "portuguese"),
    ("pa", "punjabi"),
    ("ro", "romanian"),
    ("ru", "russian"),
    ("sm", "samoan"),
    ("gd", "scots gaelic"),
    ("sr", "serbian"),
    ("st", "sesotho"),
    ("sn", "shona"),
    ("sd", "sindhi"),
    ("si", "sinhala"),
    ("sk", "slovak"),
    ("sl", "slovenian"),
    ("so", "somali"),
    ("es", "spanish"),
    ("su", "sundanese"),
    ("sw", "swahili"),
    ("sv", "swedish"),
    ("tg", "tajik"),
    ("ta", "tamil"),
    ("te", "telugu"),
    ("th", "thai"),
    ("tr", "turkish"),
    ("uk", "ukrainian"),
    ("ur", "urdu"),
    ("ug", "uyghur"),
    ("uz", "uzbek"),
    ("vi", "vietnamese"),
    ("cy", "welsh"),
    ("xh", "xhosa"),
    ("yi", "yiddish"),
    ("yo", "yoruba"),
    ("zu", "zulu"),
];

/// Extra spellings that resolve to a canonical code.
const ALIASES: &[(&str, &str)] = &[
    ("iw", "he"),
    ("zh", "zh-cn"),
    ("zh-hans", "zh-cn"),
    ("zh-hant", "zh-tw"),
    ("jv", "jw"),
    ("chinese", "zh-cn"),
    ("burmese", "my"),
    ("kurdish", "ku"),
];

/// Every accepted spelling (code, name, alias) → canonical code.
static LOOKUP: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let mut map = HashMap::with_capacity(LANGUAGES.len() * 2 + ALIASES.len());
    for &(code, name) in LANGUAGES {
        map.insert(code, code);
        map.insert(name, code);
    }
    for &(alias, code) in ALIASES {
        map.insert(alias, code);
    }
    map
});

static NAMES: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| LANGUAGES.iter().copied().collect());

/// Canonical backend identifier for a language.
///
/// Opaque: codes reported by the backend that are missing from the table are
/// kept as-is (lower-cased) rather than rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LanguageCode(String);

impl LanguageCode {
    /// English, the default destination.
    pub fn english() -> Self {
        Self("en".to_string())
    }

    /// Wrap a code reported by the backend.
    ///
    /// Aliases are folded onto their canonical code so `"iw"` and `"he"`
    /// compare equal.
    pub fn from_backend(code: &str) -> Self {
        let lowered = code.trim().to_lowercase();
        match LOOKUP.get(lowered.as_str()) {
            Some(canonical) => Self((*canonical).to_string()),
            None => Self(lowered),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolve a user token to its canonical code.
///
/// Matching is case-insensitive and ignores surrounding whitespace.
///
/// # Errors
/// [`UnknownLanguageError`] tagged with `role` when the token is not a known
/// name, code or alias.
pub fn resolve(token: &str, role: LanguageRole) -> Result<LanguageCode, UnknownLanguageError> {
    let key = token.trim().to_lowercase();
    LOOKUP
        .get(key.as_str())
        .map(|code| LanguageCode((*code).to_string()))
        .ok_or_else(|| UnknownLanguageError::new(token.trim(), role))
}

/// Capitalised human-readable name for a code, e.g. `"Chinese (simplified)"`.
///
/// Unknown codes are shown upper-cased.
pub fn display_name(code: &LanguageCode) -> String {
    match NAMES.get(code.as_str()) {
        Some(name) => capitalize(name),
        None => code.as_str().to_uppercase(),
    }
}

/// Upper-case the first character and lower-case the rest.
fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Fixed choice set offered by the structured `translate` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SupportedLanguage {
    English,
    Dutch,
    German,
    Arabic,
    French,
    Spanish,
    Esperanto,
}

impl SupportedLanguage {
    pub const ALL: [SupportedLanguage; 7] = [
        SupportedLanguage::English,
        SupportedLanguage::Dutch,
        SupportedLanguage::German,
        SupportedLanguage::Arabic,
        SupportedLanguage::French,
        SupportedLanguage::Spanish,
        SupportedLanguage::Esperanto,
    ];

    /// Value passed to the resolver.
    pub fn value(self) -> &'static str {
        match self {
            SupportedLanguage::English => "english",
            SupportedLanguage::Dutch => "dutch",
            SupportedLanguage::German => "german",
            SupportedLanguage::Arabic => "arabic",
            SupportedLanguage::French => "french",
            SupportedLanguage::Spanish => "spanish",
            SupportedLanguage::Esperanto => "esperanto",
        }
    }

    /// Label shown to users.
    pub fn name(self) -> &'static str {
        match self {
            SupportedLanguage::English => "English",
            SupportedLanguage::Dutch => "Dutch",
            SupportedLanguage::German => "German",
            SupportedLanguage::Arabic => "Arabic",
            SupportedLanguage::French => "French",
            SupportedLanguage::Spanish => "Spanish",
            SupportedLanguage::Esperanto => "Esperanto",
        }
    }

    pub fn code(self) -> LanguageCode {
        // Every variant's value is a table name.
        LanguageCode(LOOKUP[self.value()].to_string())
    }
}

impl fmt::Display for SupportedLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SupportedLanguage {
    type Err = UnknownLanguageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase();
        SupportedLanguage::ALL
            .into_iter()
            .find(|lang| lang.value() == key || lang.code().as_str() == key)
            .ok_or_else(|| UnknownLanguageError::new(s.trim(), LanguageRole::Destination))
    }
}
