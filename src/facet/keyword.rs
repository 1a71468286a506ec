//! Keyword normalization shared by the write path and the query path.
//!
//! Mesh rows carry stored `title_norm`/`description_norm` columns produced by
//! [`normalize`], and query keywords go through the same function before
//! matching. Index side and query side therefore agree byte for byte.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Canonical comparison form: diacritics stripped (NFD, combining marks
/// dropped), lowercased, every non-alphanumeric run collapsed to a single
/// space, no leading or trailing space.
///
/// The output alphabet is letters, digits, and single spaces, so normalized
/// tokens can be embedded in `LIKE` patterns without escaping.
pub fn normalize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_space = false;
    for c in raw.nfd().filter(|c| !is_combining_mark(*c)) {
        if c.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            for lower in c.to_lowercase() {
                out.push(lower);
            }
        } else {
            pending_space = true;
        }
    }
    out
}

/// Splits a normalized keyword into search tokens, deduplicated in
/// first-seen order.
pub fn tokenize(normalized: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    for token in normalized.split(' ').filter(|t| !t.is_empty()) {
        if !tokens.iter().any(|t| t == token) {
            tokens.push(token.to_string());
        }
    }
    tokens
}

// ============================================================================
// Tests
// ============================================================================
