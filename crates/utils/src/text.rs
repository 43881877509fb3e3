//! Small string helpers for object keys and user supplied text.

/// Replace everything outside `[A-Za-z0-9._-]` with `_`.
///
/// Leading dots are stripped so a sanitized name can never address a parent
/// directory or a hidden file. An empty result becomes `"file"`.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Lowercased extension of `name`, or `fallback` when it has none.
pub fn file_extension(name: &str, fallback: &str) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => {
            sanitize_file_name(ext).to_ascii_lowercase()
        }
        _ => fallback.to_string(),
    }
}

/// Number of characters after trimming surrounding whitespace.
pub fn trimmed_len(value: &str) -> usize {
    value.trim().chars().count()
}
