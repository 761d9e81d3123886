// Comparison keys and edition normalization.

/// Trim, collapse internal whitespace runs to one space, optionally
/// case-fold. Blank input yields `None`.
pub fn normalize_edition(raw: Option<&str>, case_fold: bool) -> Option<String> {
    let collapsed = raw?.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return None;
    }
    Some(if case_fold {
        collapsed.to_lowercase()
    } else {
        collapsed
    })
}

/// Identifier match key: trimmed, lowercased unless matching is case-sensitive.
pub fn match_key(raw: &str, case_sensitive: bool) -> String {
    let trimmed = raw.trim();
    if case_sensitive {
        trimmed.to_string()
    } else {
        trimmed.to_lowercase()
    }
}
