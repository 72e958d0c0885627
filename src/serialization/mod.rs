//! Helpers for persisting trained models.
//!
//! The model file is the only reloadable format; the vocabulary dump is for inspection.

pub mod model_file;
pub mod vocab_dump;

pub use model_file::{
    load_model, model_path, parse_model, save_model, write_model, MODEL_EXTENSION,
};
pub use vocab_dump::{save_vocab, vocab_path, write_vocab, VOCAB_EXTENSION};
