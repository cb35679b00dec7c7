/// Keep only printable ASCII (letters, digits, punctuation, space, newline), then collapse every
/// run of whitespace into a single space and trim the ends.
pub fn clean_text(s: &str) -> String {
    let kept: String = s
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_ascii_punctuation() || *c == ' ' || *c == '\n')
        .collect();
    collapse_whitespace(&kept)
}

/// Lowercase `s` and turn everything that is not an ASCII lowercase letter or digit into a
/// space. Whitespace runs are collapsed, so the result splits cleanly into query tokens.
pub fn clean_string_for_query(s: &str) -> String {
    let spaced: String = s
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() {
                c
            } else {
                ' '
            }
        })
        .collect();
    collapse_whitespace(&spaced)
}

/// Lowercase `s`, replace spaces with underscores and drop anything that is not an ASCII
/// lowercase letter, digit or underscore. Used for generated citation keys.
pub fn clean_string_for_key(s: &str) -> String {
    s.to_lowercase()
        .replace(' ', "_")
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_')
        .collect()
}

pub(crate) fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
