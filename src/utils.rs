//! String helpers shared across the pipeline.
//!
//! Post text comes from arbitrary third-party markup, so every truncation
//! here has to respect UTF-8 character boundaries. Slicing by byte offset
//! would panic the first time a post leads with an emoji.

/// Return the prefix of `s` holding at most `max_chars` characters.
///
/// Cuts on a character boundary, never mid-codepoint.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut to `max` characters with an ellipsis and a count of
/// the bytes dropped, so log lines stay readable while still hinting at the
/// full payload size.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    let prefix = truncate_chars(s, max);
    if prefix.len() == s.len() {
        s.to_string()
    } else {
        format!("{}…(+{} bytes)", prefix, s.len() - prefix.len())
    }
}
