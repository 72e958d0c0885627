//! Registry of special token literals layered on top of the trained vocabulary.

use std::borrow::Cow;
use std::cmp::Reverse;

use regex::Regex;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::{BpeError, Result};
use crate::model::TokenId;

/// A piece of text produced by [`SpecialTokens::split`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'t> {
    /// Ordinary text that still needs segmentation and merging.
    Text(&'t str),
    /// An exact special token literal, already resolved to its id.
    Special(TokenId),
}

/// Ordered mapping between special token literals and their ids.
///
/// Ids are assigned contiguously in registration order. Registration is all-or-nothing: a batch
/// containing any invalid or duplicate literal leaves the registry untouched.
#[derive(Debug, Clone, Default)]
pub struct SpecialTokens {
    entries: Vec<(String, TokenId)>,
    ids: FxHashMap<String, TokenId>,
    splitter: Option<Regex>,
}

impl SpecialTokens {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when no special tokens are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of registered special tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Looks up the id assigned to `literal`.
    #[must_use]
    pub fn id(&self, literal: &str) -> Option<TokenId> {
        self.ids.get(literal).copied()
    }

    /// Iterates over `(literal, id)` pairs in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, TokenId)> + '_ {
        self.entries.iter().map(|(literal, id)| (literal.as_str(), *id))
    }

    /// Returns the literals in registration order.
    #[must_use]
    pub fn literals(&self) -> Vec<&str> {
        self.iter().map(|(literal, _)| literal).collect()
    }

    /// Registers `tokens` with ids `starting_id, starting_id + 1, ...` in list order.
    pub fn register<I, S>(&mut self, tokens: I, starting_id: TokenId) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tokens: Vec<String> = tokens.into_iter().map(Into::into).collect();
        if tokens.is_empty() {
            return Ok(());
        }
        validate_literals(&tokens)?;
        if let Some(existing) = tokens.iter().find(|token| self.ids.contains_key(*token)) {
            return Err(BpeError::DuplicateSpecialToken(existing.clone()));
        }
        if let Some(&(_, last)) = self.entries.last() {
            if starting_id <= last {
                return Err(BpeError::InvalidConfig(format!(
                    "special token ids must start after {last}, got {starting_id}"
                )));
            }
        }
        let fits = TokenId::try_from(tokens.len())
            .ok()
            .and_then(|count| starting_id.checked_add(count))
            .is_some();
        if !fits {
            return Err(BpeError::InvalidConfig("special token ids overflow".into()));
        }

        let mut entries = self.entries.clone();
        for (offset, token) in tokens.into_iter().enumerate() {
            entries.push((token, starting_id + offset as TokenId));
        }
        let splitter = build_splitter(entries.iter().map(|(literal, _)| literal.as_str()))?;

        self.ids = entries.iter().cloned().collect();
        self.entries = entries;
        self.splitter = splitter;
        Ok(())
    }

    /// Splits `text` around exact special token literals.
    ///
    /// When several literals match at the same position the longest one wins; literals of equal
    /// length are tried in registration order.
    #[must_use]
    pub fn split<'t>(&self, text: &'t str) -> Vec<Segment<'t>> {
        let Some(splitter) = &self.splitter else {
            return if text.is_empty() {
                Vec::new()
            } else {
                vec![Segment::Text(text)]
            };
        };
        let mut segments = Vec::new();
        let mut start = 0;
        for found in splitter.find_iter(text) {
            if found.start() > start {
                segments.push(Segment::Text(&text[start..found.start()]));
            }
            if let Some(id) = self.id(found.as_str()) {
                segments.push(Segment::Special(id));
            }
            start = found.end();
        }
        if start < text.len() {
            segments.push(Segment::Text(&text[start..]));
        }
        segments
    }
}

/// Checks that every literal is non-empty, free of whitespace, and unique within `tokens`.
///
/// Whitespace is rejected because the model file stores literals space-separated on one line.
pub fn validate_literals<S: AsRef<str>>(tokens: &[S]) -> Result<()> {
    let mut seen = FxHashSet::default();
    for token in tokens {
        let token = token.as_ref();
        if token.is_empty() {
            return Err(BpeError::InvalidConfig(
                "special tokens must not be empty".into(),
            ));
        }
        if token.chars().any(char::is_whitespace) {
            return Err(BpeError::InvalidConfig(format!(
                "special token {token:?} must not contain whitespace"
            )));
        }
        if !seen.insert(token) {
            return Err(BpeError::DuplicateSpecialToken(token.to_string()));
        }
    }
    Ok(())
}

/// Removes every occurrence of the given literals from `text`.
pub fn strip_literals<'t, S: AsRef<str>>(text: &'t str, tokens: &[S]) -> Result<Cow<'t, str>> {
    match build_splitter(tokens.iter().map(AsRef::as_ref))? {
        Some(regex) => Ok(regex.replace_all(text, "")),
        None => Ok(Cow::Borrowed(text)),
    }
}

fn build_splitter<'a>(literals: impl Iterator<Item = &'a str>) -> Result<Option<Regex>> {
    let mut literals: Vec<&str> = literals.filter(|literal| !literal.is_empty()).collect();
    if literals.is_empty() {
        return Ok(None);
    }
    // Stable sort keeps registration order among equal lengths.
    literals.sort_by_key(|literal| Reverse(literal.len()));
    let pattern = literals
        .iter()
        .map(|literal| regex::escape(literal))
        .collect::<Vec<_>>()
        .join("|");
    Ok(Some(Regex::new(&pattern)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_assigns_sequential_ids() {
        let mut specials = SpecialTokens::new();
        specials.register(["<|a|>", "<|b|>"], 300).unwrap();
        assert_eq!(specials.id("<|a|>"), Some(300));
        assert_eq!(specials.id("<|b|>"), Some(301));
        assert_eq!(specials.literals(), vec!["<|a|>", "<|b|>"]);
    }

    #[test]
    fn duplicate_registration_is_rejected_atomically() {
        let mut specials = SpecialTokens::new();
        specials.register(["<|a|>"], 300).unwrap();
        let err = specials.register(["<|c|>", "<|a|>"], 301).unwrap_err();
        assert!(matches!(err, BpeError::DuplicateSpecialToken(token) if token == "<|a|>"));
        assert_eq!(specials.len(), 1);
        assert_eq!(specials.id("<|c|>"), None);
    }

    #[test]
    fn duplicates_within_one_batch_are_rejected() {
        let mut specials = SpecialTokens::new();
        assert!(specials.register(["<|x|>", "<|x|>"], 256).is_err());
        assert!(specials.is_empty());
    }

    #[test]
    fn whitespace_and_empty_literals_are_rejected() {
        let mut specials = SpecialTokens::new();
        assert!(matches!(
            specials.register(["<|end of text|>"], 256),
            Err(BpeError::InvalidConfig(_))
        ));
        assert!(matches!(
            specials.register([""], 256),
            Err(BpeError::InvalidConfig(_))
        ));
    }

    #[test]
    fn overlapping_ids_are_rejected() {
        let mut specials = SpecialTokens::new();
        specials.register(["<|a|>", "<|b|>"], 300).unwrap();
        assert!(specials.register(["<|c|>"], 301).is_err());
        specials.register(["<|c|>"], 302).unwrap();
        assert_eq!(specials.id("<|c|>"), Some(302));
    }

    #[test]
    fn split_interleaves_text_and_specials() {
        let mut specials = SpecialTokens::new();
        specials.register(["<|end|>"], 260).unwrap();
        let segments = specials.split("hi<|end|>there<|end|>");
        assert_eq!(
            segments,
            vec![
                Segment::Text("hi"),
                Segment::Special(260),
                Segment::Text("there"),
                Segment::Special(260),
            ]
        );
    }

    #[test]
    fn split_prefers_longest_literal() {
        let mut specials = SpecialTokens::new();
        specials.register(["<|e|>", "<|e|>x"], 256).unwrap();
        assert_eq!(
            specials.split("a<|e|>xb"),
            vec![Segment::Text("a"), Segment::Special(257), Segment::Text("b")]
        );
    }

    #[test]
    fn split_without_specials_returns_whole_text() {
        let specials = SpecialTokens::new();
        assert_eq!(specials.split("abc"), vec![Segment::Text("abc")]);
        assert!(specials.split("").is_empty());
    }

    #[test]
    fn strip_literals_removes_every_occurrence() {
        let stripped = strip_literals("a<|end|>b<|end|>", &["<|end|>"]).unwrap();
        assert_eq!(stripped, "ab");
        let untouched = strip_literals("abc", &Vec::<String>::new()).unwrap();
        assert!(matches!(untouched, Cow::Borrowed("abc")));
    }
}
