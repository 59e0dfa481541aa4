const MAX_FILENAME_CHARS: usize = 200;
const DEFAULT_FILENAME: &str = "image";

/// Turns a descriptive label into a basename that is safe to join onto a directory.
pub fn sanitize_filename(raw: &str) -> String {
    let replaced: String = raw
        .chars()
        .filter_map(|c| match c {
            '/' | '\\' => Some('-'),
            '<' | '>' | ':' | '"' | '|' | '?' | '*' => None,
            c if c.is_control() => None,
            c => Some(c),
        })
        .collect();
    let collapsed = collapse_dot_runs(&replaced);
    let trimmed = trim_dots_and_space(&collapsed);
    let truncated: String = trimmed.chars().take(MAX_FILENAME_CHARS).collect();
    let cleaned = trim_dots_and_space(&truncated);
    if cleaned.is_empty() {
        DEFAULT_FILENAME.to_string()
    } else {
        cleaned.to_string()
    }
}

/// Squeezes every run of dots down to one, so no `..` segment survives.
fn collapse_dot_runs(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if c == '.' && out.ends_with('.') {
            continue;
        }
        out.push(c);
    }
    out
}

fn trim_dots_and_space(value: &str) -> &str {
    value.trim_matches(|c: char| c == '.' || c.is_whitespace())
}
