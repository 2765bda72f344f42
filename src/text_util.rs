/// Maximum number of characters in a search result snippet.
pub const SNIPPET_MAX_CHARS: usize = 500;

/// Return the first `max_chars` characters of `text`.
///
/// Counts Unicode scalar values, so the cut never lands inside a multi-byte
/// character. Word boundaries are not respected.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Snippet shown for a stored document.
pub fn snippet(document: &str) -> String {
    truncate_chars(document, SNIPPET_MAX_CHARS).to_string()
}
