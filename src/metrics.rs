//! Metrics describing the evolution of the training process.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::model::{Pair, TokenId};

/// Reason a training run terminated.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StopReason {
    /// The requested number of merges was performed.
    TargetVocabReached,
    /// Every chunk was reduced to a single token before the target was reached.
    NoPairsRemaining,
}

/// Metrics captured for each merge iteration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IterationMetrics {
    /// Sequential iteration number (1-indexed).
    pub iteration: usize,
    /// Pair selected for merging.
    pub pair: Pair,
    /// Id assigned to the merged pair.
    pub token: TokenId,
    /// Corpus-wide frequency of the pair when it was selected.
    pub frequency: usize,
    /// Number of occurrences replaced across the corpus.
    pub merges_applied: usize,
    /// Count of distinct pairs remaining after the iteration.
    pub distinct_pairs: usize,
    /// Execution time for the iteration.
    pub elapsed_iteration: Duration,
    /// Total time elapsed since training started.
    pub elapsed_total: Duration,
}

/// Aggregate metrics produced by a training session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrainingMetrics {
    /// Number of chunks the segmenter produced from the corpus.
    pub chunks: usize,
    /// Number of distinct chunks the merges were computed over.
    pub unique_chunks: usize,
    /// Per-iteration snapshots accrued during training.
    pub iterations: Vec<IterationMetrics>,
    /// Total duration of the training session.
    pub total_duration: Duration,
    /// Reason training terminated.
    pub stop_reason: StopReason,
}

impl TrainingMetrics {
    /// Creates an empty metrics container with pre-allocated capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            chunks: 0,
            unique_chunks: 0,
            iterations: Vec::with_capacity(capacity),
            total_duration: Duration::ZERO,
            stop_reason: StopReason::TargetVocabReached,
        }
    }

    /// Number of merges actually performed.
    #[must_use]
    pub fn merges_performed(&self) -> usize {
        self.iterations.len()
    }
}
