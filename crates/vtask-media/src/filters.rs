//! FFmpeg filter-graph helpers.

use std::path::Path;

fn escape_with(value: &str, special: &[char]) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if special.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Escape a path for use as a filter option value inside `-vf`.
///
/// Two levels apply: the option value (`\ ' :`) and then the filtergraph
/// description (`\ ' [ ] , ;`).
pub fn escape_filter_path(path: &Path) -> String {
    let raw = path.to_string_lossy();
    let option_level = escape_with(&raw, &['\\', '\'', ':']);
    escape_with(&option_level, &['\\', '\'', '[', ']', ',', ';'])
}

/// `ass=` filter that renders a script onto the video.
pub fn ass_filter(script_path: &Path) -> String {
    format!("ass=filename={}", escape_filter_path(script_path))
}
