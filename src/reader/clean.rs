//! Text cleanup applied to every piece of text the reader extracts.
//!
//! TEI produced from PDFs carries PDF artefacts: soft hyphens, zero-width
//! spaces, words split across line breaks and runs of layout whitespace. A
//! chemical name split as `ethyl-\nene` or `di\u{00AD}oxane` would never match
//! the database, so text is cleaned before it reaches the mention recognizer.
//!
//! Rules (applied in order):
//! 1. Normalise line endings (CRLF → LF)
//! 2. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens, …)
//! 3. Rejoin words hyphenated across a line break
//! 4. Collapse whitespace runs to one space and trim

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all cleanup rules.
pub fn clean_text(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = remove_invisible_chars(&s);
    let s = join_hyphenated_breaks(&s);
    collapse_whitespace(&s)
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 3: Rejoin hyphenated line breaks ────────────────────────────────────
//
// Only a lowercase letter on both sides counts; `2-\nmethyl` keeps its hyphen
// because locant hyphens are part of the name.

static RE_HYPHEN_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\p{Ll})-\n[ \t]*(\p{Ll})").unwrap());

fn join_hyphenated_breaks(input: &str) -> String {
    RE_HYPHEN_BREAK.replace_all(input, "$1$2").to_string()
}

// ── Rule 4: Collapse whitespace ─────────────────────────────────────────────

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

fn collapse_whitespace(input: &str) -> String {
    RE_WHITESPACE.replace_all(input, " ").trim().to_string()
}
