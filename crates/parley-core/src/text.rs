//! Text helpers for diagnostics.

/// Longest diagnostic excerpt carried in errors and HTTP responses.
pub const MAX_DIAGNOSTIC_CHARS: usize = 500;

/// Return at most `max_chars` characters of `s`, cutting on a char boundary.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Truncate to [`MAX_DIAGNOSTIC_CHARS`] and return an owned string.
pub fn diagnostic_excerpt(s: &str) -> String {
    truncate_chars(s, MAX_DIAGNOSTIC_CHARS).to_owned()
}
