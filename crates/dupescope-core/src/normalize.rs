/// Canonicalize a field value before comparison.
///
/// Trims the value, collapses internal whitespace runs to a single space and,
/// unless `case_sensitive`, lower-cases it. Digits and punctuation are kept as-is.
pub fn normalize(value: &str, case_sensitive: bool) -> String {
    let collapsed = value.split_whitespace().collect::<Vec<_>>().join(" ");
    if case_sensitive {
        collapsed
    } else {
        collapsed.to_lowercase()
    }
}

/// Same as [`normalize`], with absent values mapping to an empty string.
pub fn normalize_opt(value: Option<&str>, case_sensitive: bool) -> String {
    value
        .map(|v| normalize(v, case_sensitive))
        .unwrap_or_default()
}
