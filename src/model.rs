//! Trained model state: merge table, vocabulary, special tokens, and the encode/decode paths.

use std::path::Path;

use rustc_hash::FxHashMap;

use crate::bytes::{base_vocab, text_to_ids, BYTE_VOCAB_SIZE};
use crate::error::{BpeError, Result};
use crate::segment::Segmenter;
use crate::serialization::{load_model, save_model, save_vocab};
use crate::special_tokens::{Segment, SpecialTokens};
use crate::stats::{adjacent_pairs, replace_pair};

/// Token identifier used throughout the crate.
pub type TokenId = u32;
/// Merge pair encoded as `(left, right)` token identifiers.
pub type Pair = (TokenId, TokenId);

/// Trained BPE model.
///
/// Ids `[0, 256)` are raw bytes, ids `[256, 256 + merges)` are learned merges in training order,
/// and any ids above that belong to special tokens. The merge table is fixed once built; only
/// special tokens may be appended afterwards.
#[must_use]
#[derive(Debug, Clone)]
pub struct BpeModel {
    segmenter: Segmenter,
    merges: Vec<Pair>,
    ranks: FxHashMap<Pair, TokenId>,
    token_bytes: Vec<Vec<u8>>,
    special_tokens: SpecialTokens,
}

impl BpeModel {
    /// Rebuilds a model by replaying `merges` in order, the n-th merge producing id `256 + n`.
    pub fn from_merges(segmenter: Segmenter, merges: Vec<Pair>) -> Result<Self> {
        let mut token_bytes = base_vocab();
        token_bytes.reserve(merges.len());
        for (index, &(left, right)) in merges.iter().enumerate() {
            let known = token_bytes.len();
            let (Some(left_bytes), Some(right_bytes)) = (
                token_bytes.get(left as usize),
                token_bytes.get(right as usize),
            ) else {
                return Err(BpeError::InvalidConfig(format!(
                    "merge {index} ({left}, {right}) references a token outside [0, {known})"
                )));
            };
            let mut merged = Vec::with_capacity(left_bytes.len() + right_bytes.len());
            merged.extend_from_slice(left_bytes);
            merged.extend_from_slice(right_bytes);
            token_bytes.push(merged);
        }
        Self::from_parts(segmenter, merges, token_bytes)
    }

    /// Assembles a model from merges and the matching vocabulary produced during training.
    pub(crate) fn from_parts(
        segmenter: Segmenter,
        merges: Vec<Pair>,
        token_bytes: Vec<Vec<u8>>,
    ) -> Result<Self> {
        if token_bytes.len() != BYTE_VOCAB_SIZE + merges.len() {
            return Err(BpeError::InvalidConfig(format!(
                "vocabulary holds {} entries but {} merges imply {}",
                token_bytes.len(),
                merges.len(),
                BYTE_VOCAB_SIZE + merges.len()
            )));
        }
        let mut ranks = FxHashMap::default();
        ranks.reserve(merges.len());
        for (index, &pair) in merges.iter().enumerate() {
            let id = merge_id(index)?;
            if ranks.insert(pair, id).is_some() {
                return Err(BpeError::InvalidConfig(format!(
                    "pair ({}, {}) is merged more than once",
                    pair.0, pair.1
                )));
            }
        }
        Ok(Self {
            segmenter,
            merges,
            ranks,
            token_bytes,
            special_tokens: SpecialTokens::new(),
        })
    }

    /// Returns the segmenter the merges were learned with.
    pub fn segmenter(&self) -> &Segmenter {
        &self.segmenter
    }

    /// Returns the segmentation pattern source.
    #[must_use]
    pub fn pattern(&self) -> &str {
        self.segmenter.pattern()
    }

    /// Returns the merge table in training order.
    #[must_use]
    pub fn merges(&self) -> &[Pair] {
        &self.merges
    }

    /// Returns the id produced by merging `pair`, which is also its encode priority
    /// (lower ids were learned earlier and are applied first).
    #[must_use]
    pub fn merge_rank(&self, pair: Pair) -> Option<TokenId> {
        self.ranks.get(&pair).copied()
    }

    /// Returns the bytes backing every id, special tokens included.
    #[must_use]
    pub fn token_bytes(&self) -> &[Vec<u8>] {
        &self.token_bytes
    }

    /// Returns the bytes for a single id.
    #[must_use]
    pub fn token(&self, id: TokenId) -> Option<&[u8]> {
        self.token_bytes.get(id as usize).map(Vec::as_slice)
    }

    /// Returns the registered special tokens.
    pub fn special_tokens(&self) -> &SpecialTokens {
        &self.special_tokens
    }

    /// Total vocabulary size: bytes, merges, and special tokens.
    #[must_use]
    pub fn vocab_size(&self) -> usize {
        self.token_bytes.len()
    }

    /// Appends special tokens, assigning ids from the next free id in list order.
    ///
    /// Fails without modifying the model if any literal is invalid or already registered.
    pub fn register_special_tokens<I, S>(&mut self, tokens: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tokens: Vec<String> = tokens.into_iter().map(Into::into).collect();
        let starting_id = TokenId::try_from(self.token_bytes.len())
            .map_err(|_| BpeError::InvalidConfig("vocabulary size exceeded u32::MAX".into()))?;
        self.special_tokens.register(tokens.iter().cloned(), starting_id)?;
        self.token_bytes
            .extend(tokens.into_iter().map(String::into_bytes));
        Ok(())
    }

    /// Encodes `text`, emitting special token ids for exact literals when `allow_special` is set.
    pub fn encode(&self, text: &str, allow_special: bool) -> Result<Vec<TokenId>> {
        if !allow_special || self.special_tokens.is_empty() {
            return self.encode_ordinary(text);
        }
        let mut ids = Vec::new();
        for segment in self.special_tokens.split(text) {
            match segment {
                Segment::Special(id) => ids.push(id),
                Segment::Text(piece) => self.encode_text_into(piece, &mut ids)?,
            }
        }
        Ok(ids)
    }

    /// Encodes `text` treating special token literals as ordinary text.
    pub fn encode_ordinary(&self, text: &str) -> Result<Vec<TokenId>> {
        let mut ids = Vec::new();
        self.encode_text_into(text, &mut ids)?;
        Ok(ids)
    }

    fn encode_text_into(&self, text: &str, out: &mut Vec<TokenId>) -> Result<()> {
        for chunk in self.segmenter.split(text)? {
            self.encode_chunk_into(chunk, out);
        }
        Ok(())
    }

    fn encode_chunk_into(&self, chunk: &str, out: &mut Vec<TokenId>) {
        let mut ids = text_to_ids(chunk);
        while ids.len() >= 2 {
            let best = adjacent_pairs(&ids)
                .filter_map(|pair| self.merge_rank(pair).map(|rank| (rank, pair)))
                .min();
            let Some((rank, pair)) = best else {
                break;
            };
            replace_pair(&mut ids, pair, rank);
        }
        out.extend(ids);
    }

    /// Resolves ids back into their concatenated bytes.
    pub fn decode_bytes(&self, ids: &[TokenId]) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        for &id in ids {
            let token = self.token(id).ok_or(BpeError::UnknownToken(id))?;
            bytes.extend_from_slice(token);
        }
        Ok(bytes)
    }

    /// Decodes ids into text, replacing invalid UTF-8 with U+FFFD.
    pub fn decode(&self, ids: &[TokenId]) -> Result<String> {
        let bytes = self.decode_bytes(ids)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Writes the reloadable model file to `path`.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        save_model(self, path)
    }

    /// Writes the human-readable vocabulary dump to `path`. The dump cannot be loaded back.
    pub fn save_vocab<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        save_vocab(self, path)
    }

    /// Loads a model file written by [`BpeModel::save`].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        load_model(path)
    }
}

fn merge_id(index: usize) -> Result<TokenId> {
    index
        .checked_add(BYTE_VOCAB_SIZE)
        .and_then(|id| TokenId::try_from(id).ok())
        .ok_or_else(|| BpeError::InvalidConfig("vocabulary size exceeded u32::MAX".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(merges: Vec<Pair>) -> BpeModel {
        BpeModel::from_merges(Segmenter::default(), merges).expect("valid merges")
    }

    #[test]
    fn from_merges_rebuilds_vocabulary_recursively() {
        // "a" + "a" -> 256, 256 + "b" -> 257
        let model = model(vec![(97, 97), (256, 98)]);
        assert_eq!(model.vocab_size(), 258);
        assert_eq!(model.token(256), Some(&b"aa"[..]));
        assert_eq!(model.token(257), Some(&b"aab"[..]));
        assert_eq!(model.merge_rank((256, 98)), Some(257));
        assert_eq!(model.merge_rank((98, 98)), None);
    }

    #[test]
    fn from_merges_rejects_forward_references() {
        let err = BpeModel::from_merges(Segmenter::default(), vec![(97, 300)]).unwrap_err();
        assert!(matches!(err, BpeError::InvalidConfig(_)));
    }

    #[test]
    fn from_merges_rejects_repeated_pairs() {
        let err =
            BpeModel::from_merges(Segmenter::default(), vec![(97, 97), (97, 97)]).unwrap_err();
        assert!(matches!(err, BpeError::InvalidConfig(_)));
    }

    #[test]
    fn encode_applies_earliest_merge_first() {
        // (b, c) was learned before (a, b), so "abc" must become [a, bc].
        let model = model(vec![(98, 99), (97, 98)]);
        assert_eq!(model.encode_ordinary("abc").unwrap(), vec![97, 256]);
        assert_eq!(model.encode_ordinary("ab").unwrap(), vec![257]);
    }

    #[test]
    fn encode_never_merges_across_chunks() {
        let model = model(vec![(97, 32)]);
        // "a b" splits into "a" and " b", so the ("a", " ") merge cannot apply.
        assert_eq!(model.encode_ordinary("a b").unwrap(), vec![97, 32, 98]);
    }

    #[test]
    fn empty_inputs_round_trip() {
        let model = model(vec![(97, 97)]);
        assert!(model.encode("", true).unwrap().is_empty());
        assert_eq!(model.decode(&[]).unwrap(), "");
    }

    #[test]
    fn decode_rejects_unknown_ids() {
        let model = model(vec![(97, 97)]);
        assert!(matches!(
            model.decode(&[257]),
            Err(BpeError::UnknownToken(257))
        ));
    }

    #[test]
    fn decode_replaces_invalid_utf8() {
        let model = model(Vec::new());
        assert_eq!(model.decode(&[0xE2, 0x82]).unwrap(), "\u{fffd}");
        assert_eq!(model.decode_bytes(&[0xE2, 0x82]).unwrap(), vec![0xE2, 0x82]);
    }

    #[test]
    fn special_tokens_take_next_free_ids() {
        let mut model = model(vec![(97, 97)]);
        model
            .register_special_tokens(["<|end|>", "<|pad|>"])
            .unwrap();
        assert_eq!(model.vocab_size(), 259);
        assert_eq!(model.special_tokens().id("<|end|>"), Some(257));
        assert_eq!(model.token(258), Some(&b"<|pad|>"[..]));
        assert_eq!(model.encode("<|end|>", true).unwrap(), vec![257]);
        assert_eq!(model.decode(&[257]).unwrap(), "<|end|>");
    }

    #[test]
    fn failed_registration_leaves_vocabulary_unchanged() {
        let mut model = model(Vec::new());
        model.register_special_tokens(["<|end|>"]).unwrap();
        assert!(model
            .register_special_tokens(["<|new|>", "<|end|>"])
            .is_err());
        assert_eq!(model.vocab_size(), 257);
        assert_eq!(model.special_tokens().len(), 1);
    }

    #[test]
    fn encode_without_allow_special_treats_literals_as_text() {
        let mut model = model(Vec::new());
        model.register_special_tokens(["<|end|>"]).unwrap();
        let ordinary = model.encode("<|end|>", false).unwrap();
        assert_eq!(ordinary.len(), "<|end|>".len());
        assert_eq!(model.decode(&ordinary).unwrap(), "<|end|>");
        let mixed = model.encode("hi<|end|>", true).unwrap();
        assert_eq!(mixed, vec![104, 105, 256]);
    }
}
