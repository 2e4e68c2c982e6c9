//! Pattern matching implementation.

use std::fmt;

/// Number of symbols in the Base58 alphabet.
pub const BASE58_ALPHABET_SIZE: u64 = 58;

/// An immutable prefix/suffix pattern.
///
/// The prefix is compared starting at offset 1, skipping the version
/// character every address starts with. Characters are not checked against
/// the Base58 alphabet; a pattern containing `0`, `O`, `I` or `l` simply
/// never matches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pattern {
    prefix: String,
    suffix: String,
}

impl Pattern {
    /// Creates a new pattern. Either part may be empty.
    pub fn new(prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            suffix: suffix.into(),
        }
    }

    /// Returns the prefix (without the leading `T`).
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns the suffix.
    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Combined number of constrained characters.
    pub fn constrained_len(&self) -> usize {
        self.prefix.len() + self.suffix.len()
    }

    /// Matches an address against this pattern.
    ///
    /// Works on the bytes of the caller's string and never allocates.
    #[inline]
    pub fn matches(&self, address: &str) -> bool {
        let bytes = address.as_bytes();

        if !self.prefix.is_empty() {
            match bytes.get(1..1 + self.prefix.len()) {
                Some(head) if head == self.prefix.as_bytes() => {}
                _ => return false,
            }
        }

        self.suffix.is_empty() || bytes.ends_with(self.suffix.as_bytes())
    }

    /// Returns the estimated difficulty (number of attempts to find a match).
    ///
    /// Each constrained character has 58 possible values, so the expected
    /// number of attempts is 58^n. Saturates at `u64::MAX`.
    pub fn estimated_difficulty(&self) -> u64 {
        BASE58_ALPHABET_SIZE.saturating_pow(self.constrained_len() as u32)
    }

    /// Returns a human-readable difficulty estimate.
    pub fn difficulty_description(&self) -> String {
        let diff = self.estimated_difficulty();
        match diff {
            0..=1_000 => "Very Easy (< 1 second)".into(),
            1_001..=100_000 => "Easy (seconds)".into(),
            100_001..=10_000_000 => "Medium (minutes)".into(),
            10_000_001..=1_000_000_000 => "Hard (hours)".into(),
            _ => "Very Hard (days or more)".into(),
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.suffix.is_empty() {
            write!(f, "T{}...", self.prefix)
        } else {
            write!(f, "T{}...{}", self.prefix, self.suffix)
        }
    }
}

/// Free-function form of [`Pattern::matches`].
#[inline]
pub fn matches(address: &str, pattern: &Pattern) -> bool {
    pattern.matches(address)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDR: &str = "TMVQGm1qAQYVdetCeGRRkTWYYrLXuHK2HC";

    #[test]
    fn test_empty_pattern_matches_everything() {
        let pattern = Pattern::default();
        assert!(pattern.matches(ADDR));
        assert!(pattern.matches(""));
        assert!(matches("TABy3CywcfrijA3kmcxipCW8SK4QJJWZdd", &pattern));
    }

    #[test]
    fn test_prefix_skips_version_character() {
        assert!(Pattern::new("MVQ", "").matches(ADDR));
        assert!(Pattern::new("M", "").matches(ADDR));
        assert!(!Pattern::new("TMV", "").matches(ADDR));
        assert!(!Pattern::new("VQ", "").matches(ADDR));
    }

    #[test]
    fn test_prefix_is_case_sensitive() {
        assert!(!Pattern::new("mvq", "").matches(ADDR));
        assert!(!Pattern::new("MvQ", "").matches(ADDR));
    }

    #[test]
    fn test_suffix_match() {
        assert!(Pattern::new("", "K2HC").matches(ADDR));
        assert!(!Pattern::new("", "k2hc").matches(ADDR));
        assert!(!Pattern::new("", "K2H").matches(ADDR));
    }

    #[test]
    fn test_prefix_and_suffix() {
        assert!(Pattern::new("MV", "HC").matches(ADDR));
        assert!(!Pattern::new("MV", "HX").matches(ADDR));
        assert!(!Pattern::new("MX", "HC").matches(ADDR));
    }

    #[test]
    fn test_pattern_longer_than_address() {
        let long = "M".repeat(40);
        assert!(!Pattern::new(long.clone(), "").matches(ADDR));
        assert!(!Pattern::new("", long).matches(ADDR));
    }

    #[test]
    fn test_difficulty() {
        assert_eq!(Pattern::new("AB", "").estimated_difficulty(), 3364);
        assert_eq!(Pattern::new("MGf", "fqq").estimated_difficulty(), 38_068_692_544);
        assert_eq!(Pattern::default().estimated_difficulty(), 1);
        assert_eq!(Pattern::new("A".repeat(20), "").estimated_difficulty(), u64::MAX);
    }

    #[test]
    fn test_display() {
        assert_eq!(Pattern::new("MGf", "fqq").to_string(), "TMGf...fqq");
        assert_eq!(Pattern::new("AB", "").to_string(), "TAB...");
    }
}
