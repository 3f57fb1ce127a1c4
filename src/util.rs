//! Shared utility functions

use unicode_normalization::UnicodeNormalization;

/// Maximum length of a catalog slug
pub const MAX_NAME_LEN: usize = 100;

/// Truncate a string to a maximum length, appending "..." if truncated.
/// Handles multi-byte characters by finding a valid char boundary.
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let suffix = "...";
    let target = max_len.saturating_sub(suffix.len());
    // Find a valid char boundary at or before target
    let mut end = target;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}{}", &s[..end], suffix)
}

/// Convert a title into a URL-safe catalog name.
///
/// Folds to ASCII (NFKD, combining marks dropped), maps `[ .:/_]` to `-`,
/// drops every other character outside `[a-z0-9-]`, collapses repeated
/// dashes and trims them from both ends. The result may be empty.
pub fn munge_name(title: &str) -> String {
    let mut name = String::with_capacity(title.len());
    let mut last_was_dash = true;

    for c in title.nfkd() {
        let c = match c {
            ' ' | '.' | ':' | '/' | '_' | '-' => '-',
            c if c.is_ascii_alphanumeric() => c.to_ascii_lowercase(),
            _ => continue,
        };
        if c == '-' {
            if last_was_dash {
                continue;
            }
            last_was_dash = true;
        } else {
            last_was_dash = false;
        }
        name.push(c);
    }

    name.truncate(MAX_NAME_LEN);
    while name.ends_with('-') {
        name.pop();
    }
    name
}
