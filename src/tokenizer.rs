//! Stateful tokenizer façade tracking whether a model has been trained or loaded.

use std::path::{Path, PathBuf};

use log::info;

use crate::bytes::BYTE_VOCAB_SIZE;
use crate::config::TrainerConfig;
use crate::error::{BpeError, Result};
use crate::metrics::TrainingMetrics;
use crate::model::{BpeModel, TokenId};
use crate::serialization::{model_path, vocab_path};
use crate::trainer::Trainer;

/// Training state of a [`Tokenizer`].
#[derive(Debug, Clone, Default)]
pub enum TokenizerState {
    /// No model has been trained or loaded yet.
    #[default]
    Untrained,
    /// A model is available for encoding and decoding.
    Trained(BpeModel),
}

/// A tokenizer that starts untrained and becomes usable after [`Tokenizer::fit`] or
/// [`Tokenizer::load`].
///
/// Methods that need a model fail with [`BpeError::Untrained`] until then. Callers that hold a
/// [`BpeModel`] directly get the same operations without the runtime check.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    config: TrainerConfig,
    state: TokenizerState,
}

impl Tokenizer {
    /// Creates an untrained tokenizer for the given configuration.
    #[must_use]
    pub fn new(config: TrainerConfig) -> Self {
        Self {
            config,
            state: TokenizerState::Untrained,
        }
    }

    /// Wraps an already trained model.
    #[must_use]
    pub fn from_model(model: BpeModel) -> Self {
        let config = TrainerConfig {
            target_vocab_size: (BYTE_VOCAB_SIZE + model.merges().len()).max(BYTE_VOCAB_SIZE + 1),
            pattern: model.pattern().to_string(),
            special_tokens: model
                .special_tokens()
                .literals()
                .into_iter()
                .map(str::to_string)
                .collect(),
            show_progress: false,
        };
        Self {
            config,
            state: TokenizerState::Trained(model),
        }
    }

    /// Returns the configuration used for training.
    #[must_use]
    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> &TokenizerState {
        &self.state
    }

    /// Returns true once a model has been trained or loaded.
    #[must_use]
    pub fn is_trained(&self) -> bool {
        matches!(self.state, TokenizerState::Trained(_))
    }

    /// Returns the trained model.
    pub fn model(&self) -> Result<&BpeModel> {
        match &self.state {
            TokenizerState::Trained(model) => Ok(model),
            TokenizerState::Untrained => Err(BpeError::Untrained),
        }
    }

    /// Consumes the tokenizer, returning the trained model.
    pub fn into_model(self) -> Result<BpeModel> {
        match self.state {
            TokenizerState::Trained(model) => Ok(model),
            TokenizerState::Untrained => Err(BpeError::Untrained),
        }
    }

    /// Trains on `text`, fully replacing any previous model.
    ///
    /// `special_tokens` replaces the configured special tokens for this run. The previous model
    /// is kept if training fails.
    pub fn fit<S: AsRef<str>>(
        &mut self,
        text: &str,
        special_tokens: &[S],
    ) -> Result<TrainingMetrics> {
        let mut config = self.config.clone();
        config.special_tokens = special_tokens
            .iter()
            .map(|token| token.as_ref().to_string())
            .collect();
        let artifacts = Trainer::new(config.clone()).train(text)?;
        self.config = config;
        self.state = TokenizerState::Trained(artifacts.model);
        Ok(artifacts.metrics)
    }

    /// Registers additional special tokens after the current vocabulary.
    pub fn register_special_tokens<I, S>(&mut self, tokens: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let TokenizerState::Trained(model) = &mut self.state else {
            return Err(BpeError::Untrained);
        };
        let tokens: Vec<String> = tokens.into_iter().map(Into::into).collect();
        model.register_special_tokens(tokens.iter().cloned())?;
        self.config.special_tokens.extend(tokens);
        Ok(())
    }

    /// Encodes `text`; see [`BpeModel::encode`].
    pub fn encode(&self, text: &str, allow_special: bool) -> Result<Vec<TokenId>> {
        self.model()?.encode(text, allow_special)
    }

    /// Encodes `text` ignoring special tokens; see [`BpeModel::encode_ordinary`].
    pub fn encode_ordinary(&self, text: &str) -> Result<Vec<TokenId>> {
        self.model()?.encode_ordinary(text)
    }

    /// Decodes ids into text; see [`BpeModel::decode`].
    pub fn decode(&self, ids: &[TokenId]) -> Result<String> {
        self.model()?.decode(ids)
    }

    /// Decodes ids into raw bytes; see [`BpeModel::decode_bytes`].
    pub fn decode_bytes(&self, ids: &[TokenId]) -> Result<Vec<u8>> {
        self.model()?.decode_bytes(ids)
    }

    /// Vocabulary size, or zero while untrained.
    #[must_use]
    pub fn vocab_size(&self) -> usize {
        self.model().map_or(0, BpeModel::vocab_size)
    }

    /// Alias for [`Tokenizer::vocab_size`].
    #[must_use]
    pub fn len(&self) -> usize {
        self.vocab_size()
    }

    /// Returns true while no vocabulary is available.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Saves `<prefix>.bpe` and, when `save_vocab` is set, the `<prefix>.vocab` dump.
    /// Returns the model file path.
    pub fn save<P: AsRef<Path>>(&self, prefix: P, save_vocab: bool) -> Result<PathBuf> {
        let model = self.model()?;
        let path = model_path(&prefix);
        model.save(&path)?;
        if save_vocab {
            model.save_vocab(vocab_path(&prefix))?;
        }
        info!("saved tokenizer to {}", path.display());
        Ok(path)
    }

    /// Loads a tokenizer from a `.bpe` model file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        BpeModel::load(path).map(Self::from_model)
    }
}
