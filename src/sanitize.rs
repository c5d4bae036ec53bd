//! Recognized text filtering.

use std::fmt;

/// Punctuation kept besides letters, digits and whitespace.
pub const ALLOWED_PUNCTUATION: [char; 22] = [
    '.', ',', '!', '?', '@', '#', '$', '%', '&', '*', '(', ')', '-', '+', '=', '[', ']', '{', '}',
    '/', '<', '>',
];

/// Text restricted to the allowed character set, trimmed and never empty.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SanitizedText(String);

impl SanitizedText {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for SanitizedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SanitizedText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Letters and digits are ASCII only; accented and non-Latin characters are
/// dropped along with symbols outside `ALLOWED_PUNCTUATION`.
pub fn is_allowed(c: char) -> bool {
    c.is_ascii_alphanumeric() || c.is_whitespace() || ALLOWED_PUNCTUATION.contains(&c)
}

/// Filter `raw` to the allowed characters, keeping their order, then trim.
///
/// Returns `None` when nothing is left, in which case the pass ends here.
pub fn sanitize(raw: &str) -> Option<SanitizedText> {
    let filtered: String = raw.chars().filter(|c| is_allowed(*c)).collect();
    let trimmed = filtered.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(SanitizedText(trimmed.to_string()))
    }
}
