//! Adjacent-pair statistics and pair replacement over token id sequences.

use rustc_hash::FxHashMap;

use crate::model::{Pair, TokenId};

/// Iterates over the adjacent `(left, right)` pairs of `ids` in order.
pub fn adjacent_pairs(ids: &[TokenId]) -> impl Iterator<Item = Pair> + '_ {
    ids.windows(2).map(|window| (window[0], window[1]))
}

/// Counts adjacent pairs within a single sequence.
#[must_use]
pub fn pair_counts(ids: &[TokenId]) -> FxHashMap<Pair, usize> {
    let mut counts = FxHashMap::default();
    update_pair_counts(ids, 1, &mut counts);
    counts
}

/// Adds the adjacent pairs of `ids` to `counts`, each occurrence weighted by `weight`.
pub fn update_pair_counts(ids: &[TokenId], weight: usize, counts: &mut FxHashMap<Pair, usize>) {
    for pair in adjacent_pairs(ids) {
        *counts.entry(pair).or_insert(0) += weight;
    }
}

/// Counts adjacent pairs across many sequences; pairs never span two sequences.
#[must_use]
pub fn corpus_pair_counts<'a, I>(sequences: I) -> FxHashMap<Pair, usize>
where
    I: IntoIterator<Item = &'a [TokenId]>,
{
    let mut counts = FxHashMap::default();
    for ids in sequences {
        update_pair_counts(ids, 1, &mut counts);
    }
    counts
}

/// Replaces every non-overlapping, left-to-right occurrence of `pair` in `ids` with
/// `replacement`, compacting the sequence in place. Returns the number of replacements.
pub fn replace_pair(ids: &mut Vec<TokenId>, pair: Pair, replacement: TokenId) -> usize {
    let len = ids.len();
    let mut read = 0usize;
    let mut write = 0usize;
    let mut replaced = 0usize;
    while read < len {
        if read + 1 < len && ids[read] == pair.0 && ids[read + 1] == pair.1 {
            ids[write] = replacement;
            read += 2;
            replaced += 1;
        } else {
            ids[write] = ids[read];
            read += 1;
        }
        write += 1;
    }
    ids.truncate(write);
    replaced
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_counts_tallies_adjacent_pairs() {
        let counts = pair_counts(&[1, 2, 3, 1, 2]);
        assert_eq!(counts.get(&(1, 2)), Some(&2));
        assert_eq!(counts.get(&(2, 3)), Some(&1));
        assert_eq!(counts.get(&(3, 1)), Some(&1));
        assert_eq!(counts.len(), 3);
    }

    #[test]
    fn short_sequences_have_no_pairs() {
        assert!(pair_counts(&[]).is_empty());
        assert!(pair_counts(&[7]).is_empty());
    }

    #[test]
    fn corpus_counts_do_not_cross_sequences() {
        let a = vec![1, 2];
        let b = vec![3, 1, 2];
        let counts = corpus_pair_counts([a.as_slice(), b.as_slice()]);
        assert_eq!(counts.get(&(1, 2)), Some(&2));
        assert_eq!(counts.get(&(2, 3)), None);
    }

    #[test]
    fn replace_pair_is_left_to_right_and_non_overlapping() {
        let mut ids = vec![97, 97, 97, 98];
        assert_eq!(replace_pair(&mut ids, (97, 97), 256), 1);
        assert_eq!(ids, vec![256, 97, 98]);

        let mut ids = vec![1, 2, 1, 2, 3];
        assert_eq!(replace_pair(&mut ids, (1, 2), 99), 2);
        assert_eq!(ids, vec![99, 99, 3]);
    }

    #[test]
    fn replace_pair_without_match_leaves_sequence_untouched() {
        let mut ids = vec![1, 2, 3];
        assert_eq!(replace_pair(&mut ids, (3, 1), 9), 0);
        assert_eq!(ids, vec![1, 2, 3]);
    }
}
