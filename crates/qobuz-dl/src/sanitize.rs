//! Helpers for cleaning data before it reaches span attributes or file names.
//!
//! Stream locations are signed and time-limited, so their query strings must
//! never end up in logs. File names come from catalog titles and may contain
//! characters that break paths or archive entries.

const BANNED_FILENAME_CHARS: [char; 9] = ['/', '\\', '?', ':', '*', '"', '<', '>', '|'];

/// Strips the query string and fragment from a URL.
///
/// - `https://cdn.example/file.flac?sig=abc` → `https://cdn.example/file.flac`
/// - `https://cdn.example/file.flac` → `https://cdn.example/file.flac` (no change)
pub fn redact_url(url: &str) -> String {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    url[..end].to_string()
}

/// Replaces every path-breaking character with `_`.
pub fn clean_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if BANNED_FILENAME_CHARS.contains(&c) {
                '_'
            } else {
                c
            }
        })
        .collect()
}
