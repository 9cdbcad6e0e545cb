//! Optional line-at-a-time filter that drops pure terminal-UI chrome and
//! strips stray symbol noise from otherwise natural-language lines.
//!
//! Not part of the default pipeline (the narration system prompt is relied
//! on to ignore chrome); available for modes that favor more aggressive
//! cleaning before text ever reaches the LLM.

use regex::Regex;
use std::sync::LazyLock;

static SEPARATOR_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\s\-=_─━]+$").expect("valid regex"));
static SPINNER_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\s⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏|/\\-]+$").expect("valid regex"));
static EMPTY_PROMPT_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*[>›$#]\s*$").expect("valid regex"));

/// `true` if `line` is pure UI chrome with no narratable content.
#[must_use]
pub fn is_chrome_line(line: &str) -> bool {
    if line.trim().is_empty() {
        return true;
    }
    if SEPARATOR_LINE.is_match(line) || SPINNER_LINE.is_match(line) || EMPTY_PROMPT_LINE.is_match(line) {
        return true;
    }
    // A line with no Unicode letters or digits at all carries no speakable
    // content (pure punctuation/symbol decoration). `char::is_alphabetic`
    // and `char::is_numeric` consult the full Unicode general-category
    // tables, not an ASCII range, so this holds for any source script.
    !line.chars().any(|c| c.is_alphabetic() || c.is_numeric())
}

/// Strips characters from `line` that are neither letters, digits,
/// whitespace, nor a small set of narration-relevant punctuation.
#[must_use]
pub fn strip_symbol_noise(line: &str) -> String {
    line.chars()
        .filter(|c| {
            c.is_alphabetic()
                || c.is_numeric()
                || c.is_whitespace()
                || matches!(c, '.' | ',' | '!' | '?' | '\'' | '"' | '-' | ':' | ';')
        })
        .collect()
}

/// Applies [`is_chrome_line`] + [`strip_symbol_noise`] to every line of
/// `text`, dropping chrome lines entirely and cleaning the rest.
#[must_use]
pub fn filter_ui_elements(text: &str) -> String {
    text.lines()
        .filter(|line| !is_chrome_line(line))
        .map(strip_symbol_noise)
        .collect::<Vec<_>>()
        .join("\n")
}
