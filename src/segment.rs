//! Regex-driven pre-segmentation of text into chunks that merges never cross.

use std::fmt;

use fancy_regex::Regex;

use crate::error::Result;

/// GPT-4 style split pattern: contractions, letter runs, 1-3 digit runs, punctuation runs,
/// and whitespace handling that keeps a trailing space attached to the following word.
/// Whitespace at the very end of the text stays a single chunk, line breaks included.
pub const DEFAULT_PATTERN: &str = r"'(?i:[sdmt]|ll|ve|re)|[^\r\n\p{L}\p{N}]?+\p{L}++|\p{N}{1,3}+| ?[^\s\p{L}\p{N}]++[\r\n]*+|\s++$|\s*[\r\n]|\s+(?!\S)|\s";

/// Compiled segmentation pattern.
///
/// The pattern source is kept next to the compiled regex because it is part of the persisted
/// model: encoding must use exactly the pattern the merges were learned with.
#[derive(Clone)]
pub struct Segmenter {
    pattern: String,
    regex: Regex,
}

impl Segmenter {
    /// Compiles `pattern` into a segmenter.
    pub fn new(pattern: impl Into<String>) -> Result<Self> {
        let pattern = pattern.into();
        let regex = Regex::new(&pattern)?;
        Ok(Self { pattern, regex })
    }

    /// Returns the pattern source string.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Splits `text` into the ordered, non-overlapping matches of the pattern.
    ///
    /// Only matched text is returned: with [`DEFAULT_PATTERN`] every code point belongs to some
    /// alternative, while a custom pattern that leaves gaps drops the unmatched text. Empty
    /// matches are skipped.
    pub fn split<'t>(&self, text: &'t str) -> Result<Vec<&'t str>> {
        let mut chunks = Vec::new();
        for found in self.regex.find_iter(text) {
            let found = found?;
            if !found.as_str().is_empty() {
                chunks.push(found.as_str());
            }
        }
        Ok(chunks)
    }
}

impl Default for Segmenter {
    fn default() -> Self {
        // The built-in pattern is a compile-time constant covered by tests.
        Self::new(DEFAULT_PATTERN).expect("default pattern compiles")
    }
}

impl fmt::Debug for Segmenter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Segmenter")
            .field("pattern", &self.pattern)
            .finish()
    }
}

impl PartialEq for Segmenter {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
    }
}

impl Eq for Segmenter {}
