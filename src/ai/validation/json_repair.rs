//! JSON Repair Mechanism
//!
//! Recovers a parseable JSON document from LLM output.
//!
//! Handles common LLM JSON output issues:
//! - Markdown code fence wrapping (```json ... ```)
//! - JSON embedded in explanatory text
//! - Literal newlines/tabs inside string values
//! - Invalid escape sequences (`\q`)
//! - Trailing commas, doubled commas, empty array elements
//! - Control characters
//!
//! The passes run in a fixed order: fence strip → balanced extraction →
//! string-aware escaping → textual cleanup. The control-character strip must
//! come after escaping, otherwise it would eat the newlines inside strings.
//!
//! Invalid escapes are doubled (`\q` becomes `\\q`). This keeps the document
//! parseable but can silently change the content of malformed strings.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

// =============================================================================
// Scan State
// =============================================================================

/// State of a left-to-right scan over JSON text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    /// Outside any string literal
    Normal,
    /// Inside a string literal
    InString,
    /// Directly after a backslash inside a string literal
    Escaped,
}

impl ScanState {
    fn advance(self, ch: char) -> Self {
        match (self, ch) {
            (Self::Normal, '"') => Self::InString,
            (Self::Normal, _) => Self::Normal,
            (Self::InString, '\\') => Self::Escaped,
            (Self::InString, '"') => Self::Normal,
            (Self::InString, _) => Self::InString,
            (Self::Escaped, _) => Self::InString,
        }
    }
}

/// Characters allowed after a backslash in strict JSON
const VALID_ESCAPES: [char; 9] = ['"', '\\', '/', 'b', 'f', 'n', 'r', 't', 'u'];

static CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```(?:json)?\s*").expect("valid fence pattern"));
static TRAILING_COMMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",(\s*[}\]])").expect("valid trailing comma pattern"));
static CONTROL_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F\x7F]").expect("valid control char pattern")
});
static DOUBLE_COMMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",\s*,").expect("valid double comma pattern"));
static LEADING_EMPTY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\s*,").expect("valid leading element pattern"));
static TRAILING_EMPTY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",\s*\]").expect("valid trailing element pattern"));

// =============================================================================
// Convenience Functions
// =============================================================================

/// Turn raw model output into a best-effort syntactically valid JSON string.
///
/// The result is valid JSON whenever the input contains one well-formed
/// object or array surrounded by arbitrary noise.
pub fn repair(raw: &str) -> String {
    let unfenced = strip_code_fences(raw);

    let candidate = extract_balanced(&unfenced, '{', '}')
        .or_else(|| extract_balanced(&unfenced, '[', ']'))
        .unwrap_or_else(|| {
            debug!("No balanced JSON value found, repairing full text");
            unfenced.as_str()
        });

    let escaped = escape_string_literals(candidate);
    cleanup(&escaped)
}

/// Strict parse failure of the repaired text
#[derive(Debug)]
pub struct RepairFailure {
    pub error: serde_json::Error,
    /// Output of `repair`; callers should excerpt it for diagnostics
    pub repaired: String,
}

/// Parse model output, repairing it only when a strict parse fails.
///
/// Returns `(value, was_repaired)`.
pub fn parse_or_repair(raw: &str) -> std::result::Result<(Value, bool), RepairFailure> {
    let trimmed = raw.trim();
    if (trimmed.starts_with('{') || trimmed.starts_with('['))
        && let Ok(value) = serde_json::from_str::<Value>(trimmed)
    {
        return Ok((value, false));
    }

    let repaired = repair(raw);
    match serde_json::from_str::<Value>(&repaired) {
        Ok(value) => {
            debug!("JSON parsed after repair");
            Ok((value, true))
        }
        Err(error) => {
            warn!(%error, "JSON still invalid after repair");
            Err(RepairFailure { error, repaired })
        }
    }
}

// =============================================================================
// Passes
// =============================================================================

/// Pass 1: remove ```json and ``` markers
fn strip_code_fences(raw: &str) -> String {
    CODE_FENCE.replace_all(raw, "").trim().to_string()
}

/// Pass 2: substring from the first `open` to its matching `close`,
/// ignoring delimiters inside string literals
fn extract_balanced(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let mut depth = 0usize;
    let mut state = ScanState::Normal;

    for (offset, ch) in text[start..].char_indices() {
        if state == ScanState::Normal {
            if ch == open {
                depth += 1;
            } else if ch == close {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + ch.len_utf8()]);
                }
            }
        }
        state = state.advance(ch);
    }

    None
}

/// Pass 3: escape literal whitespace inside strings and neutralize invalid escapes
fn escape_string_literals(text: &str) -> String {
    let mut result = String::with_capacity(text.len() + 16);
    let mut state = ScanState::Normal;

    for ch in text.chars() {
        match state {
            ScanState::Normal => result.push(ch),
            ScanState::InString => push_string_char(&mut result, ch),
            ScanState::Escaped => {
                if !VALID_ESCAPES.contains(&ch) {
                    // The preceding backslash is already in `result`; doubling it
                    // turns the pair into a literal backslash.
                    result.push('\\');
                }
                push_string_char(&mut result, ch);
            }
        }
        state = state.advance(ch);
    }

    result
}

fn push_string_char(out: &mut String, ch: char) {
    match ch {
        '\n' => out.push_str("\\n"),
        '\r' => out.push_str("\\r"),
        '\t' => out.push_str("\\t"),
        _ => out.push(ch),
    }
}

/// Pass 4: textual cleanup
fn cleanup(text: &str) -> String {
    let mut cleaned = TRAILING_COMMA.replace_all(text, "$1").into_owned();
    cleaned = CONTROL_CHARS.replace_all(&cleaned, "").into_owned();
    while DOUBLE_COMMA.is_match(&cleaned) {
        cleaned = DOUBLE_COMMA.replace_all(&cleaned, ",").into_owned();
    }
    cleaned = LEADING_EMPTY.replace_all(&cleaned, "[").into_owned();
    TRAILING_EMPTY.replace_all(&cleaned, "]").into_owned()
}
