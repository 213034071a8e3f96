//! Inline trigger phrase recognition: `tr <text> to <language>`.
//!
//! Grammar (case-insensitive, anchored at the start of the message, first
//! line only):
//!
//! ```text
//! trigger  := keyword ' ' text ' to ' language
//! keyword  := "tr" | "translate"
//! text     := one or more characters
//! language := one or more characters up to the end of the line
//! ```
//!
//! The split point is the **last** `" to "` that still leaves a non-empty
//! language, so `translate go to sleep to dutch` yields the text
//! `"go to sleep"`.

use serde::Serialize;

const KEYWORDS: [&str; 2] = ["tr", "translate"];
const SEPARATOR: &str = " to ";

/// Result of parsing a chat message for an inline trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TriggerMatch {
    /// The message is a trigger phrase.
    Matched { text: String, language: String },
    /// Not a trigger; callers ignore the message silently.
    NoMatch,
}

impl TriggerMatch {
    pub fn is_match(&self) -> bool {
        matches!(self, TriggerMatch::Matched { .. })
    }

    /// `(text, language)` when matched.
    pub fn into_parts(self) -> Option<(String, String)> {
        match self {
            TriggerMatch::Matched { text, language } => Some((text, language)),
            TriggerMatch::NoMatch => None,
        }
    }
}

/// Parse `message` as an inline trigger.
///
/// The keyword and the separator are matched case-insensitively; the captured
/// text keeps the author's casing.
pub fn parse(message: &str) -> TriggerMatch {
    let line = message.split('\n').next().unwrap_or_default();
    // ASCII lowering keeps byte offsets aligned with `line`.
    let lowered = line.to_ascii_lowercase();

    for keyword in KEYWORDS {
        let Some(rest) = lowered.strip_prefix(keyword) else {
            continue;
        };
        if !rest.starts_with(' ') {
            continue;
        }
        let body_start = keyword.len() + 1;
        if let Some(found) = split_body(&line[body_start..], &lowered[body_start..]) {
            return found;
        }
    }

    TriggerMatch::NoMatch
}

/// Split `body` at the last separator leaving non-empty text and language.
fn split_body(body: &str, lowered: &str) -> Option<TriggerMatch> {
    let mut search_end = lowered.len();
    while let Some(pos) = lowered[..search_end].rfind(SEPARATOR) {
        let language_start = pos + SEPARATOR.len();
        if pos > 0 && language_start < body.len() {
            return Some(TriggerMatch::Matched {
                text: body[..pos].to_string(),
                language: body[language_start..].to_string(),
            });
        }
        if pos == 0 {
            break;
        }
        // Separator touches the end of the line; try an earlier one.
        search_end = pos + SEPARATOR.len() - 1;
    }
    None
}
