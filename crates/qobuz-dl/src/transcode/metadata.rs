//! FFmetadata document rendering for track tags.

use std::fmt::Write;

use crate::catalog::TrackMetadata;

const HEADER: &str = ";FFMETADATA1";

/// Backslash-escapes the characters the FFmetadata format treats as syntax.
pub fn escape_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '=' | ';' | '#' | '\\' | '\n') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Renders the tag document handed to the codec engine as a second input.
pub fn ffmetadata(tags: &TrackMetadata) -> String {
    let mut doc = String::new();
    doc.push_str(HEADER);
    doc.push('\n');

    // Writing to a String cannot fail.
    let mut field = |key: &str, value: &str| {
        let _ = writeln!(doc, "{}={}", key, escape_value(value));
    };

    field("title", &tags.display_title());
    field("artist", &tags.display_artists());
    field("album_artist", tags.primary_artist());
    field("album", &tags.display_album());
    if let Some(genre) = tags.genre.as_deref() {
        field("genre", genre);
    }
    if let Some(date) = tags.release_date.as_deref() {
        field("date", date);
    }
    if let Some(year) = tags.release_year() {
        field("year", year);
    }
    if let Some(track) = tags.track_number {
        field("track", &track.to_string());
    }
    if let Some(isrc) = tags.isrc.as_deref() {
        field("isrc", isrc);
    }

    doc
}
