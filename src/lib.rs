//! Regex-segmented byte pair encoding (BPE) training library and CLI.
//!
//! Text is split into chunks by a configurable pattern, each chunk is converted to its UTF-8
//! bytes, and merges are learned greedily from the most frequent adjacent pair. A trained
//! [`BpeModel`] encodes text by applying merges in the order they were learned, decodes ids back
//! to text, and persists itself as a small line-oriented `.bpe` file.
//!
//! ```no_run
//! use regbpe::{Tokenizer, TrainerConfig};
//!
//! # fn main() -> regbpe::Result<()> {
//! let cfg = TrainerConfig::builder()
//!     .target_vocab_size(4096)
//!     .show_progress(false)
//!     .build()?;
//! let mut tokenizer = Tokenizer::new(cfg);
//! tokenizer.fit("some training text", &["<|endoftext|>"])?;
//! let ids = tokenizer.encode("some text<|endoftext|>", true)?;
//! assert_eq!(tokenizer.decode(&ids)?, "some text<|endoftext|>");
//! tokenizer.save("tokenizer", true)?;
//! # Ok(())
//! # }
//! ```
//!
//! The CLI is enabled by default through the `cli` feature. Users targeting the
//! library portion only can disable default features to avoid the CLI
//! dependencies: `regbpe = { version = "...", default-features = false }`.

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    clippy::all,
    rust_2018_idioms,
    future_incompatible,
    unused_lifetimes,
    unreachable_pub
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc,
    clippy::doc_markdown
)]

pub mod bytes;
pub mod config;
pub mod corpus;
pub mod error;
pub mod metrics;
pub mod model;
pub mod segment;
pub mod serialization;
pub mod special_tokens;
pub mod stats;
pub mod tokenizer;
pub mod trainer;

pub use config::{CorpusConfig, TrainerBuilder, TrainerConfig};
pub use error::{BpeError, Result};
pub use metrics::{IterationMetrics, StopReason, TrainingMetrics};
pub use model::{BpeModel, Pair, TokenId};
pub use segment::{Segmenter, DEFAULT_PATTERN};
pub use special_tokens::SpecialTokens;
pub use tokenizer::{Tokenizer, TokenizerState};
pub use trainer::{Trainer, TrainerArtifacts};
