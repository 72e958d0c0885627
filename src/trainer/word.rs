use crate::model::{Pair, TokenId};
use crate::stats::adjacent_pairs;

/// Outcome of merging a specific pair within a [`Word`].
#[derive(Default)]
pub(crate) struct MergeOutcome {
    /// Number of pair occurrences replaced inside the word.
    pub merges: usize,
    /// Pair count deltas emitted by the merge, for a single copy of the word. Negative values
    /// represent removed adjacencies, positive values newly formed ones.
    pub deltas: Vec<(Pair, i64)>,
}

/// A distinct chunk of the training corpus and how many times it occurs.
#[derive(Clone, Debug)]
pub(crate) struct Word {
    ids: Vec<TokenId>,
    count: usize,
}

impl Word {
    pub(crate) fn new(ids: Vec<TokenId>, count: usize) -> Self {
        Self { ids, count }
    }

    pub(crate) fn count(&self) -> usize {
        self.count
    }

    #[cfg(test)]
    pub(crate) fn ids(&self) -> &[TokenId] {
        &self.ids
    }

    /// Returns true when the word contains at least two symbols.
    pub(crate) fn has_pairs(&self) -> bool {
        self.ids.len() >= 2
    }

    /// Invokes the provided closure for each adjacent pair.
    pub(crate) fn for_each_pair<F>(&self, f: F)
    where
        F: FnMut(Pair),
    {
        adjacent_pairs(&self.ids).for_each(f);
    }

    /// Replaces every non-overlapping occurrence of `pair`, scanning left to right, and reports
    /// how the adjacent pair counts change.
    pub(crate) fn merge(&mut self, pair: Pair, replacement: TokenId) -> MergeOutcome {
        let mut outcome = MergeOutcome::default();
        let len = self.ids.len();
        if len < 2 {
            return outcome;
        }

        let mut read = 0usize;
        let mut write = 0usize;
        while read < len {
            if read + 1 < len && self.ids[read] == pair.0 && self.ids[read + 1] == pair.1 {
                // `write - 1` already holds the rewritten left neighbour, possibly `replacement`.
                let prev = (write > 0).then(|| self.ids[write - 1]);
                let next = self.ids.get(read + 2).copied();

                if let Some(prev) = prev {
                    outcome.deltas.push(((prev, pair.0), -1));
                }
                outcome.deltas.push((pair, -1));
                if let Some(next) = next {
                    outcome.deltas.push(((pair.1, next), -1));
                }

                self.ids[write] = replacement;
                write += 1;
                read += 2;
                outcome.merges += 1;

                if let Some(prev) = prev {
                    outcome.deltas.push(((prev, replacement), 1));
                }
                if let Some(next) = next {
                    outcome.deltas.push(((replacement, next), 1));
                }
            } else {
                self.ids[write] = self.ids[read];
                write += 1;
                read += 1;
            }
        }
        self.ids.truncate(write);

        outcome
    }
}
