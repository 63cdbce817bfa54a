//! Per-window catalogs of every non-empty position subset.
//!
//! Catalog order is stable across window sizes: the catalog for `W` starts
//! with the whole catalog for `W - 1` (whose last entry is its own full set),
//! then appends the subsets that include offset `W - 1` in bitmask order, and
//! ends with the full set for `W`. A set number therefore names the same
//! offsets in every window large enough to hold it.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

use crate::classify::{compare_set, is_sequence, is_subset};
use crate::NumberSet;

/// Largest window a catalog is generated for. The catalog holds `2^W - 1` sets.
pub const MAX_WINDOW: usize = 20;

/// Shared, immutable catalog for one window size.
pub type Catalog = Arc<Vec<NumberSet>>;

static CATALOGS: OnceLock<RwLock<HashMap<usize, Catalog>>> = OnceLock::new();

/// All `2^window - 1` non-empty subsets of `0..window`, full set last.
///
/// Returns `None` for a zero window or one above [`MAX_WINDOW`].
pub fn subsets_for_window(window: usize) -> Option<Catalog> {
    if window == 0 || window > MAX_WINDOW {
        return None;
    }
    let cache = CATALOGS.get_or_init(|| RwLock::new(HashMap::new()));
    if let Some(found) = cache.read().ok().and_then(|m| m.get(&window).cloned()) {
        return Some(found);
    }

    let prev = subsets_for_window(window - 1);
    let built = Arc::new(generate_subsets(window, prev.as_deref().map(Vec::as_slice)));

    // Entries are immutable once inserted, so a poisoned map is still sound.
    let mut map = match cache.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    Some(Arc::clone(map.entry(window).or_insert(built)))
}

fn generate_subsets(window: usize, prev: Option<&[NumberSet]>) -> Vec<NumberSet> {
    let mut sets: Vec<NumberSet> = prev.map(<[NumberSet]>::to_vec).unwrap_or_default();
    // Masks 1..=skip are exactly the subsets of 0..window-1, already present.
    let skip = prev.map_or(0, <[NumberSet]>::len);
    let mut full = None;
    for mask in (skip + 1)..(1usize << window) {
        let set: NumberSet = (0..window).filter(|j| mask & (1 << j) != 0).collect();
        if set.len() == window {
            full = Some(set);
        } else {
            sets.push(set);
        }
    }
    sets.extend(full);
    sets
}

/// The full window set `0..window`.
pub fn full_set(window: usize) -> NumberSet {
    (0..window).collect()
}

/// Catalog position of the full set, always the last entry.
pub fn full_set_number(window: usize) -> Option<usize> {
    subsets_for_window(window).map(|c| c.len() - 1)
}

/// Offsets for a catalog set number.
pub fn set_by_number(window: usize, set_number: usize) -> Option<NumberSet> {
    subsets_for_window(window).and_then(|c| c.get(set_number).cloned())
}

/// Catalog position of `set` within the window's catalog.
pub fn find_set_number(window: usize, set: &[usize]) -> Option<usize> {
    subsets_for_window(window).and_then(|c| find_set(&c, set))
}

/// Position of `set` in an arbitrary list of sets.
pub fn find_set(sets: &[NumberSet], set: &[usize]) -> Option<usize> {
    sets.iter().position(|s| compare_set(s, set))
}

/// Position of the entry equal to `set` shifted by `offset`.
pub fn find_set_offset(sets: &[NumberSet], set: &[usize], offset: i64) -> Option<usize> {
    sets.iter().position(|s| {
        s.len() == set.len()
            && s.iter()
                .zip(set)
                .all(|(&a, &b)| a as i64 == b as i64 + offset)
    })
}

/// Positions in `sets` of every strict subset of `sets[set_number]`.
///
/// A non-zero `subset_size` keeps only subsets of that size.
pub fn subsets_order(sets: &[NumberSet], set_number: usize, subset_size: usize) -> Vec<usize> {
    let Some(set) = sets.get(set_number) else {
        return Vec::new();
    };
    sets.iter()
        .enumerate()
        .filter(|(_, ss)| ss.len() < set.len())
        .filter(|(_, ss)| subset_size == 0 || ss.len() == subset_size)
        .filter(|(_, ss)| is_subset(set, ss))
        .map(|(i, _)| i)
        .collect()
}

/// Which contiguous sequences a sequence query keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceFilter {
    All,
    EndingWith(usize),
    StartingWith(usize),
    Containing(usize),
}

impl SequenceFilter {
    fn keeps(self, set: &[usize]) -> bool {
        if !is_sequence(set) {
            return false;
        }
        let (Some(&first), Some(&last)) = (set.first(), set.last()) else {
            return false;
        };
        match self {
            SequenceFilter::All => true,
            SequenceFilter::EndingWith(off) => last == off,
            SequenceFilter::StartingWith(off) => first == off,
            SequenceFilter::Containing(off) => first <= off && off <= last,
        }
    }
}

/// Catalog numbers of the contiguous multi-offset sets matching `filter`.
pub fn sequence_set_numbers(window: usize, filter: SequenceFilter) -> Vec<usize> {
    subsets_for_window(window)
        .map(|c| {
            c.iter()
                .enumerate()
                .filter(|(_, s)| filter.keeps(s))
                .map(|(i, _)| i)
                .collect()
        })
        .unwrap_or_default()
}

/// The contiguous multi-offset sets matching `filter`, in catalog order.
pub fn sequence_sets(window: usize, filter: SequenceFilter) -> Vec<NumberSet> {
    subsets_for_window(window)
        .map(|c| c.iter().filter(|s| filter.keeps(s)).cloned().collect())
        .unwrap_or_default()
}

/// Maps each set of the `subset_size` catalog to the `size` catalog entry
/// holding the same shape, re-centred on the larger window's midpoint.
///
/// Sets that do not fit after shifting are skipped.
pub fn map_set_sizes(size: usize, subset_size: usize) -> Vec<usize> {
    let (Some(large), Some(small)) = (subsets_for_window(size), subsets_for_window(subset_size))
    else {
        return Vec::new();
    };
    let off = (size / 2) as i64 - (subset_size / 2) as i64;
    small
        .iter()
        .filter_map(|ss| find_set_offset(&large, ss, off))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_three_catalog_order() {
        let c = subsets_for_window(3).unwrap();
        let expected: Vec<NumberSet> = vec![
            vec![0],
            vec![1],
            vec![0, 1],
            vec![2],
            vec![0, 2],
            vec![1, 2],
            vec![0, 1, 2],
        ];
        assert_eq!(*c, expected);
    }

    #[test]
    fn test_catalog_prefix_is_previous_window() {
        let c4 = subsets_for_window(4).unwrap();
        let c5 = subsets_for_window(5).unwrap();
        assert_eq!(&c5[..c4.len()], &c4[..]);
    }

    #[test]
    fn test_out_of_range_windows() {
        assert!(subsets_for_window(0).is_none());
        assert!(subsets_for_window(MAX_WINDOW + 1).is_none());
        assert!(full_set_number(0).is_none());
    }

    #[test]
    fn test_catalog_is_shared() {
        let a = subsets_for_window(6).unwrap();
        let b = subsets_for_window(6).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_full_set_lookup() {
        assert_eq!(full_set_number(3), Some(6));
        assert_eq!(set_by_number(3, 6), Some(vec![0, 1, 2]));
        assert_eq!(find_set_number(3, &[0, 2]), Some(4));
        assert_eq!(find_set_number(3, &[0, 3]), None);
        assert_eq!(set_by_number(3, 7), None);
    }

    #[test]
    fn test_subsets_order() {
        let c = subsets_for_window(3).unwrap();
        // every strict subset of [0, 1, 2]
        assert_eq!(subsets_order(&c, 6, 0), vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(subsets_order(&c, 6, 2), vec![2, 4, 5]);
        assert_eq!(subsets_order(&c, 4, 0), vec![0, 3]);
        assert!(subsets_order(&c, 0, 0).is_empty());
    }

    #[test]
    fn test_find_set_offset() {
        let c = subsets_for_window(5).unwrap();
        let at = find_set_offset(&c, &[0, 1], 2).unwrap();
        assert_eq!(c[at], vec![2, 3]);
    }

    #[test]
    fn test_sequence_queries() {
        assert_eq!(
            sequence_sets(3, SequenceFilter::All),
            vec![vec![0, 1], vec![1, 2], vec![0, 1, 2]]
        );
        assert_eq!(
            sequence_sets(4, SequenceFilter::EndingWith(2)),
            vec![vec![1, 2], vec![0, 1, 2]]
        );
        assert_eq!(
            sequence_sets(4, SequenceFilter::StartingWith(2)),
            vec![vec![2, 3]]
        );
        let containing = sequence_sets(3, SequenceFilter::Containing(0));
        assert!(containing.iter().all(|s| s[0] == 0));
        let numbers = sequence_set_numbers(3, SequenceFilter::All);
        assert_eq!(numbers, vec![2, 5, 6]);
    }

    #[test]
    fn test_map_set_sizes_centres_smaller_window() {
        let map = map_set_sizes(5, 3);
        let large = subsets_for_window(5).unwrap();
        let small = subsets_for_window(3).unwrap();
        assert_eq!(map.len(), small.len());
        for (ss, &li) in small.iter().zip(&map) {
            let shifted: NumberSet = ss.iter().map(|o| o + 1).collect();
            assert_eq!(large[li], shifted);
        }
    }
}
