//! Transcript normalization
//!
//! Speech engines return text with arbitrary casing and spacing. Matching
//! runs against a canonical form: lower-cased, trimmed, with runs of
//! whitespace collapsed to a single space.

use std::fmt;

/// Transcript text in canonical matching form
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct NormalizedText(String);

impl NormalizedText {
    /// Borrow the canonical text
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether nothing remains after normalization
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Substring test against the canonical text
    #[must_use]
    pub fn contains(&self, needle: &str) -> bool {
        self.0.contains(needle)
    }

    /// Whitespace-separated tokens
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.0.split(' ').filter(|t| !t.is_empty())
    }
}

impl fmt::Display for NormalizedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NormalizedText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Normalize a raw transcript for matching
///
/// Total: every input, including the empty string, yields a value.
#[must_use]
pub fn normalize(raw: &str) -> NormalizedText {
    let lowered = raw.to_lowercase();
    NormalizedText(lowered.split_whitespace().collect::<Vec<_>>().join(" "))
}
