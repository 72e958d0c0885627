//! Core training loop producing a ranked merge table from a text corpus.

mod word;

use std::cmp::Ordering;
use std::collections::{hash_map::Entry, BinaryHeap};
use std::fmt;
use std::path::Path;
use std::time::Instant;

use log::{debug, info, warn};
use rustc_hash::FxHashMap;

use crate::bytes::{base_vocab, text_to_ids, BYTE_VOCAB_SIZE};
use crate::config::{CorpusConfig, TrainerBuilder, TrainerConfig};
use crate::corpus::load_text_corpus;
use crate::error::{BpeError, Result};
use crate::metrics::{IterationMetrics, StopReason, TrainingMetrics};
use crate::model::{BpeModel, Pair, TokenId};
use crate::segment::Segmenter;
use crate::special_tokens::strip_literals;

use self::word::Word;

/// High-level façade configuring and executing BPE training runs.
#[derive(Debug, Clone)]
pub struct Trainer {
    cfg: TrainerConfig,
}

/// Artifacts returned after a training session completes.
#[must_use]
#[derive(Debug, Clone)]
pub struct TrainerArtifacts {
    /// Trained BPE model.
    pub model: BpeModel,
    /// Detailed metrics captured during training.
    pub metrics: TrainingMetrics,
}

impl Trainer {
    /// Creates a new trainer for the supplied configuration.
    #[must_use]
    pub fn new(cfg: TrainerConfig) -> Self {
        Self { cfg }
    }

    /// Returns a [`TrainerBuilder`] with default settings.
    #[must_use]
    pub fn builder() -> TrainerBuilder {
        TrainerConfig::builder()
    }

    /// Returns an immutable reference to the underlying configuration.
    #[must_use]
    pub fn config(&self) -> &TrainerConfig {
        &self.cfg
    }

    /// Trains a model on text files discovered according to [`CorpusConfig`].
    pub fn train_from_paths<P: AsRef<Path>>(
        &self,
        inputs: &[P],
        corpus: &CorpusConfig,
    ) -> Result<TrainerArtifacts> {
        let text = load_text_corpus(inputs, corpus)?;
        self.train(&text)
    }

    /// Trains a model on an in-memory corpus.
    ///
    /// Special token literals are removed from `text` before segmentation, then up to
    /// `target_vocab_size - 256` merges are learned. Training stops early, without error, once no
    /// chunk has two adjacent tokens left. Special tokens are registered after the last merge.
    pub fn train(&self, text: &str) -> Result<TrainerArtifacts> {
        self.cfg.validate()?;
        let training_start = Instant::now();
        let segmenter = Segmenter::new(self.cfg.pattern.as_str())?;
        let text = strip_literals(text, &self.cfg.special_tokens)?;

        let max_merges = self.cfg.requested_merges();
        let mut metrics = TrainingMetrics::new(max_merges.min(16_384));
        let mut words = collect_words(&segmenter, &text, &mut metrics)?;
        debug!(
            "segmented corpus into {} chunks ({} distinct)",
            metrics.chunks, metrics.unique_chunks
        );

        let mut token_bytes = base_vocab();
        let mut merges: Vec<Pair> = Vec::with_capacity(max_merges);
        let mut pair_counts = compute_pair_counts(&words);
        let mut heap = BinaryHeap::with_capacity(pair_counts.len().max(1));
        for (&pair, &count) in &pair_counts {
            heap.push(PairScore::new(pair, count));
        }

        while merges.len() < max_merges {
            let iteration_start = Instant::now();
            let best_candidate = loop {
                match heap.pop() {
                    Some(score) => {
                        let current = pair_counts.get(&score.pair).copied().unwrap_or(0);
                        if current == 0 || current != score.frequency {
                            continue;
                        }
                        break Some((score.pair, current));
                    }
                    None => break None,
                }
            };

            let Some((best_pair, frequency)) = best_candidate else {
                metrics.stop_reason = StopReason::NoPairsRemaining;
                warn!(
                    "no mergeable pairs remain after {} merges given the pattern; requested {}",
                    merges.len(),
                    max_merges
                );
                break;
            };

            let new_token_id = TokenId::try_from(token_bytes.len())
                .map_err(|_| BpeError::InvalidConfig("vocabulary size exceeded u32::MAX".into()))?;
            let mut new_token = token_bytes[best_pair.0 as usize].clone();
            new_token.extend_from_slice(&token_bytes[best_pair.1 as usize]);

            let total_merges = apply_merge(
                &mut words,
                best_pair,
                new_token_id,
                &mut pair_counts,
                &mut heap,
            );

            token_bytes.push(new_token);
            merges.push(best_pair);

            if self.cfg.show_progress {
                info!(
                    "iter {:>6} pair ({:>6}, {:>6}) -> {:>6} freq {:>8} distinct_pairs {:>8}",
                    merges.len(),
                    best_pair.0,
                    best_pair.1,
                    new_token_id,
                    frequency,
                    pair_counts.len()
                );
            }

            metrics.iterations.push(IterationMetrics {
                iteration: merges.len(),
                pair: best_pair,
                token: new_token_id,
                frequency,
                merges_applied: total_merges,
                distinct_pairs: pair_counts.len(),
                elapsed_iteration: iteration_start.elapsed(),
                elapsed_total: training_start.elapsed(),
            });
        }

        let mut model = BpeModel::from_parts(segmenter, merges, token_bytes)?;
        model.register_special_tokens(self.cfg.special_tokens.iter().cloned())?;

        metrics.total_duration = training_start.elapsed();
        if self.cfg.show_progress {
            info!(
                "completed {} merges in {:.2?}; vocab size {}",
                model.merges().len(),
                metrics.total_duration,
                model.vocab_size()
            );
        }

        Ok(TrainerArtifacts { model, metrics })
    }
}

/// Segments the corpus and groups identical chunks, preserving first-seen order.
fn collect_words(
    segmenter: &Segmenter,
    text: &str,
    metrics: &mut TrainingMetrics,
) -> Result<Vec<Word>> {
    let chunks = segmenter.split(text)?;
    metrics.chunks = chunks.len();

    let mut index: FxHashMap<&str, usize> = FxHashMap::default();
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for chunk in chunks {
        match index.entry(chunk) {
            Entry::Occupied(slot) => counts[*slot.get()].1 += 1,
            Entry::Vacant(slot) => {
                slot.insert(counts.len());
                counts.push((chunk, 1));
            }
        }
    }
    metrics.unique_chunks = counts.len();

    Ok(counts
        .into_iter()
        .map(|(chunk, count)| Word::new(text_to_ids(chunk), count))
        .collect())
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
struct PairScore {
    frequency: usize,
    pair: Pair,
}

impl PairScore {
    fn new(pair: Pair, frequency: usize) -> Self {
        Self { frequency, pair }
    }
}

/// Higher frequency wins; ties go to the lexicographically smallest pair.
impl Ord for PairScore {
    fn cmp(&self, other: &Self) -> Ordering {
        self.frequency
            .cmp(&other.frequency)
            .then_with(|| other.pair.cmp(&self.pair))
    }
}

impl PartialOrd for PairScore {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn compute_pair_counts(words: &[Word]) -> FxHashMap<Pair, usize> {
    let mut counts = FxHashMap::default();
    for word in words.iter().filter(|word| word.has_pairs()) {
        word.for_each_pair(|pair| *counts.entry(pair).or_insert(0) += word.count());
    }
    counts
}

fn apply_delta(
    pair_counts: &mut FxHashMap<Pair, usize>,
    heap: &mut BinaryHeap<PairScore>,
    pair: Pair,
    delta: i64,
) {
    let amount = usize::try_from(delta.unsigned_abs()).unwrap_or(usize::MAX);
    match delta.cmp(&0) {
        Ordering::Greater => {
            let count = pair_counts.entry(pair).or_insert(0);
            *count += amount;
            heap.push(PairScore::new(pair, *count));
        }
        Ordering::Less => {
            if let Entry::Occupied(mut occupied) = pair_counts.entry(pair) {
                let new_value = occupied.get().saturating_sub(amount);
                if new_value == 0 {
                    occupied.remove();
                } else {
                    *occupied.get_mut() = new_value;
                    heap.push(PairScore::new(pair, new_value));
                }
            }
        }
        Ordering::Equal => {}
    }
}

fn apply_merge(
    words: &mut [Word],
    pair: Pair,
    new_token: TokenId,
    pair_counts: &mut FxHashMap<Pair, usize>,
    heap: &mut BinaryHeap<PairScore>,
) -> usize {
    let mut deltas: FxHashMap<Pair, i64> = FxHashMap::default();
    let mut merges = 0usize;
    for word in words.iter_mut().filter(|word| word.has_pairs()) {
        let outcome = word.merge(pair, new_token);
        if outcome.merges == 0 {
            continue;
        }
        let weight = i64::try_from(word.count()).unwrap_or(i64::MAX);
        merges += outcome.merges * word.count();
        for (pair_key, delta) in outcome.deltas {
            *deltas.entry(pair_key).or_insert(0) += delta * weight;
        }
    }

    for (pair_key, delta) in deltas {
        apply_delta(pair_counts, heap, pair_key, delta);
    }

    merges
}

impl fmt::Display for TrainerArtifacts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "BPE model with vocab size {}", self.model.vocab_size())?;
        writeln!(f, "Merges: {}", self.model.merges().len())?;
        writeln!(f, "Stop reason: {:?}", self.metrics.stop_reason)?;
        writeln!(f, "Total duration: {:?}", self.metrics.total_duration)?;
        Ok(())
    }
}
