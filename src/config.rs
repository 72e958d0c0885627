//! Configuration builders controlling training and corpus loading.

use serde::{Deserialize, Serialize};

use crate::bytes::BYTE_VOCAB_SIZE;
use crate::error::{BpeError, Result};
use crate::model::TokenId;
use crate::segment::{Segmenter, DEFAULT_PATTERN};
use crate::special_tokens::validate_literals;

/// Configuration for BPE training.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrainerConfig {
    /// Target vocabulary size covering the 256 byte tokens plus learned merges.
    /// Special tokens are assigned ids on top of this.
    pub target_vocab_size: usize,
    /// Segmentation pattern; merges never cross the chunks it produces.
    pub pattern: String,
    /// Special tokens stripped from the corpus and registered after the last merge.
    pub special_tokens: Vec<String>,
    /// Enables per-iteration logging through the `log` facade.
    pub show_progress: bool,
}

impl TrainerConfig {
    /// Returns a builder initialised with [`TrainerConfig::default`].
    #[must_use]
    pub fn builder() -> TrainerBuilder {
        TrainerBuilder::default()
    }

    /// Number of merges requested, i.e. `target_vocab_size - 256`.
    #[must_use]
    pub fn requested_merges(&self) -> usize {
        self.target_vocab_size.saturating_sub(BYTE_VOCAB_SIZE)
    }

    /// Validates the invariants required for training.
    pub fn validate(&self) -> Result<()> {
        if self.target_vocab_size <= BYTE_VOCAB_SIZE {
            return Err(BpeError::InvalidConfig(format!(
                "target_vocab_size ({}) must be greater than {BYTE_VOCAB_SIZE}",
                self.target_vocab_size
            )));
        }
        let max_vocab = usize::try_from(TokenId::MAX).unwrap_or(usize::MAX);
        if self.target_vocab_size.saturating_add(self.special_tokens.len()) > max_vocab {
            return Err(BpeError::InvalidConfig(format!(
                "target_vocab_size ({}) exceeds {max_vocab}, the maximum representable TokenId",
                self.target_vocab_size
            )));
        }
        if self.pattern.contains(|ch: char| ch == '\n' || ch == '\r') {
            return Err(BpeError::InvalidConfig(
                "pattern must not contain literal line breaks".into(),
            ));
        }
        Segmenter::new(self.pattern.as_str())
            .map_err(|err| BpeError::InvalidConfig(format!("invalid pattern: {err}")))?;
        validate_literals(&self.special_tokens)
    }
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            target_vocab_size: 512,
            pattern: DEFAULT_PATTERN.to_string(),
            special_tokens: Vec::new(),
            show_progress: true,
        }
    }
}

/// Builder for [`TrainerConfig`].
#[derive(Debug, Default, Clone)]
pub struct TrainerBuilder {
    cfg: TrainerConfig,
}

impl TrainerBuilder {
    /// Creates a builder with [`TrainerConfig::default`] settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the desired vocabulary size (including base byte tokens, excluding special tokens).
    #[must_use]
    pub fn target_vocab_size(mut self, value: usize) -> Self {
        self.cfg.target_vocab_size = value;
        self
    }

    /// Overrides the segmentation pattern.
    #[must_use]
    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.cfg.pattern = pattern.into();
        self
    }

    /// Enables or disables per-iteration logging.
    #[must_use]
    pub fn show_progress(mut self, enabled: bool) -> Self {
        self.cfg.show_progress = enabled;
        self
    }

    /// Overrides the set of special tokens appended to the vocabulary.
    #[must_use]
    pub fn special_tokens<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cfg.special_tokens = tokens.into_iter().map(Into::into).collect();
        self
    }

    /// Finalises the builder, returning a validated [`TrainerConfig`].
    pub fn build(self) -> Result<TrainerConfig> {
        self.cfg.validate()?;
        Ok(self.cfg)
    }
}

/// Configuration controlling how text corpora are read from disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CorpusConfig {
    /// Enables recursive directory traversal.
    pub recursive: bool,
    /// Follows symlinks encountered during traversal.
    pub follow_symlinks: bool,
    /// Text inserted between consecutive documents.
    pub separator: String,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            recursive: true,
            follow_symlinks: false,
            separator: "\n".into(),
        }
    }
}

impl CorpusConfig {
    /// Returns a builder initialised with [`CorpusConfig::default`].
    #[must_use]
    pub fn builder() -> CorpusBuilder {
        CorpusBuilder::default()
    }
}

/// Builder for [`CorpusConfig`].
#[derive(Debug, Default, Clone)]
pub struct CorpusBuilder {
    cfg: CorpusConfig,
}

impl CorpusBuilder {
    /// Enables or disables recursive directory traversal.
    #[must_use]
    pub fn recursive(mut self, enabled: bool) -> Self {
        self.cfg.recursive = enabled;
        self
    }

    /// Enables or disables following of symlinks when traversing directories.
    #[must_use]
    pub fn follow_symlinks(mut self, enabled: bool) -> Self {
        self.cfg.follow_symlinks = enabled;
        self
    }

    /// Sets the text placed between documents.
    #[must_use]
    pub fn separator(mut self, separator: impl Into<String>) -> Self {
        self.cfg.separator = separator.into();
        self
    }

    /// Finalises the builder, returning the [`CorpusConfig`].
    pub fn build(self) -> CorpusConfig {
        self.cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vocab_size_must_exceed_byte_alphabet() {
        for size in [0, 255, 256] {
            let err = TrainerConfig::builder()
                .target_vocab_size(size)
                .build()
                .expect_err("validation should fail");
            assert!(matches!(
                err,
                BpeError::InvalidConfig(message) if message.contains("must be greater than 256")
            ));
        }
        let cfg = TrainerConfig::builder()
            .target_vocab_size(257)
            .build()
            .expect("257 is valid");
        assert_eq!(cfg.requested_merges(), 1);
    }

    #[test]
    fn invalid_pattern_is_a_configuration_error() {
        let err = TrainerConfig::builder()
            .pattern("(?<broken")
            .build()
            .expect_err("pattern should not compile");
        assert!(matches!(err, BpeError::InvalidConfig(message) if message.contains("pattern")));
    }

    #[test]
    fn duplicate_special_tokens_are_rejected() {
        let err = TrainerConfig::builder()
            .special_tokens(["<|end|>", "<|end|>"])
            .build()
            .expect_err("duplicates should fail");
        assert!(matches!(err, BpeError::DuplicateSpecialToken(_)));
    }

    #[test]
    fn corpus_builder_overrides_defaults() {
        let cfg = CorpusConfig::builder()
            .recursive(false)
            .follow_symlinks(true)
            .separator(" <|endoftext|> ")
            .build();
        assert!(!cfg.recursive);
        assert!(cfg.follow_symlinks);
        assert_eq!(cfg.separator, " <|endoftext|> ");
    }

    #[test]
    fn config_round_trips_through_json() {
        let cfg = TrainerConfig::builder()
            .target_vocab_size(300)
            .special_tokens(["<|end|>"])
            .build()
            .unwrap();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: TrainerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cfg);
    }
}
