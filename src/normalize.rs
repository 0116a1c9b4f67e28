//! Text normalization applied to every document before indexing.

/// Keep ASCII letters and whitespace, lowercase, and trim.
///
/// ```rust
/// use agora::normalize::normalize_text;
///
/// assert_eq!(normalize_text("Athens, Greece! 123"), "athens greece");
/// ```
pub fn normalize_text(text: &str) -> String {
    let kept: String = text
        .chars()
        .filter(|&c| c.is_ascii_alphabetic() || is_space(c))
        .map(|c| c.to_ascii_lowercase())
        .collect();
    kept.trim_matches(is_space).to_string()
}

/// Unicode whitespace plus the ASCII information separators `\x1c`..=`\x1f`.
fn is_space(c: char) -> bool {
    c.is_whitespace() || ('\x1c'..='\x1f').contains(&c)
}
