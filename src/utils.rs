//! Utility helpers shared across the WASM frontend.

use chrono::{DateTime, Utc};
use unicode_segmentation::UnicodeSegmentation;

/// Format a duration given in **milliseconds** into a short human-readable
/// string such as `"1 m 23 s"` or `"12 s"`.
pub fn format_duration_ms(ms: u64) -> String {
    let secs_total = ms / 1000;
    let minutes = secs_total / 60;
    let seconds = secs_total % 60;

    if minutes > 0 {
        format!("{} m {:02} s", minutes, seconds)
    } else {
        format!("{} s", seconds)
    }
}

/// Time since `then`, e.g. `"just now"` or `"1 m 05 s ago"`.
pub fn format_since(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let ms = (now - then).num_milliseconds();
    if ms < 1000 {
        "just now".to_string()
    } else {
        format!("{} ago", format_duration_ms(ms as u64))
    }
}

/// Last `max_graphemes` user-perceived characters of `text`, prefixed with an
/// ellipsis when anything was cut. Never splits a grapheme cluster.
pub fn preview_tail(text: &str, max_graphemes: usize) -> String {
    let text = text.trim();
    let count = text.graphemes(true).count();
    if count <= max_graphemes {
        return text.to_string();
    }
    let tail: String = text.graphemes(true).skip(count - max_graphemes).collect();
    format!("…{}", tail.trim_start())
}
