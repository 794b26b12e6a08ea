//! Text processing utilities.

use std::sync::LazyLock;

use regex::Regex;

static RE_CONTROL_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\x00-\x08\x0B-\x1F\x7F-\x9F]").unwrap());
static RE_MULTI_SPACES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r" {2,}").unwrap());
static RE_MULTI_BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n\s*\n+").unwrap());

/// Normalize raw extracted text before chunking.
///
/// Line endings become `\n`, tabs become spaces, remaining control characters
/// are dropped, runs of spaces collapse to one and three or more line breaks
/// collapse to a single blank line.
pub fn clean_text(text: &str) -> String {
    let text = text.replace("\r\n", "\n").replace('\r', "\n").replace('\t', " ");
    let text = RE_CONTROL_CHARS.replace_all(&text, "");
    let text = RE_MULTI_SPACES.replace_all(&text, " ");
    let text = RE_MULTI_BLANK_LINES.replace_all(&text, "\n\n");
    text.trim().to_string()
}

/// Truncate to `max_chars` characters, appending "..." when something was cut.
pub fn truncate_with_ellipsis(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(max_chars).collect();
    truncated.push_str("...");
    truncated
}
