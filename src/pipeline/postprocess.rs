//! Post-processing: deterministic cleanup of vision-model OCR output.
//!
//! Even a well-prompted model occasionally wraps its answer in code fences,
//! emits Windows line endings, numbers the lines, or answers "NO_TEXT" with
//! trailing punctuation. These rules turn the raw reply into the ordered list
//! of recognised lines without touching the text itself.
//!
//! ## Rule Order
//!
//! Line endings are normalised first so fence detection sees plain `\n`;
//! fences are stripped before line splitting so the fence lines never become
//! text; invisible characters are removed before blank-line filtering so a
//! line holding only a zero-width space is dropped.

use crate::prompts::NO_TEXT_MARKER;
use once_cell::sync::Lazy;
use regex::Regex;

/// Turn a raw engine reply into recognised lines, top-to-bottom.
///
/// Rules (applied in order):
/// 1. Normalise line endings (CRLF → LF)
/// 2. Strip outer code fences
/// 3. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 4. Trim each line and drop blank lines
/// 5. Remove numbering the model added to the whole reply (`1.`, `2.`, …)
/// 6. Map the "no text" marker to an empty result
pub fn clean_ocr_output(input: &str) -> Vec<String> {
    let s = normalise_line_endings(input);
    let s = strip_code_fences(&s);
    let s = remove_invisible_chars(&s);

    let lines: Vec<String> = s
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    let lines = strip_enumeration(lines);

    if is_no_text(&lines) {
        return Vec::new();
    }
    lines
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Strip outer code fences ──────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[a-zA-Z]*\n(.*)\n```\s*$").unwrap());

fn strip_code_fences(input: &str) -> String {
    if let Some(caps) = RE_OUTER_FENCES.captures(input.trim()) {
        caps[1].to_string()
    } else {
        input.to_string()
    }
}

// ── Rule 3: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 5: Remove self-added enumeration ────────────────────────────────────
//
// Only a reply of two or more lines numbered 1, 2, 3 without gaps and with one
// shared delimiter (`1.` or `1)`) is treated as model numbering. Anything else
// is image text and stays as it is, e.g. a lone "1. Pizza" or "* Sale".

static RE_ENUMERATED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,3})([.)])\s+(\S.*)$").unwrap());

fn strip_enumeration(lines: Vec<String>) -> Vec<String> {
    enumerated_bodies(&lines).unwrap_or(lines)
}

fn enumerated_bodies(lines: &[String]) -> Option<Vec<String>> {
    if lines.len() < 2 {
        return None;
    }
    let mut delimiter: Option<String> = None;
    lines
        .iter()
        .enumerate()
        .map(|(idx, line)| {
            let caps = RE_ENUMERATED.captures(line)?;
            if caps[1].parse::<usize>().ok()? != idx + 1 {
                return None;
            }
            let delim = delimiter.get_or_insert_with(|| caps[2].to_string());
            (delim.as_str() == &caps[2]).then(|| caps[3].trim().to_string())
        })
        .collect()
}

// ── Rule 6: "No text" marker ─────────────────────────────────────────────────

fn is_no_text(lines: &[String]) -> bool {
    match lines {
        [only] => {
            let bare = only.trim_matches(|c: char| c.is_ascii_punctuation() && c != '_');
            bare.eq_ignore_ascii_case(NO_TEXT_MARKER)
        }
        _ => false,
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
