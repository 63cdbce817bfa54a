//! Dependency-extended subsets.
//!
//! A frame may carry dependent tiers alongside the primary value at each
//! position (tier 0 is the primary). For one number set, every position can
//! be read with any combination of tiers that still includes the primary.
//! Each combination across all positions is one dependent number set.

use crate::catalog::subsets_for_window;
use crate::NumberSet;

/// `[offset, tier, tier, ..., -1, -1]`: the primary offset followed by the
/// dependent tiers read at it, padded with `-1` to a fixed width.
pub type DependentTuple = Vec<i32>;

/// Cross-product over the positions of `number_set` of every tier subset that
/// includes the primary, one tuple per position.
///
/// Tuples are `dependent_count + 1` wide. Returns an empty list for an empty
/// number set or when the tier catalog is out of range.
pub fn dependent_subsets(number_set: &[usize], dependent_count: usize) -> Vec<Vec<DependentTuple>> {
    if number_set.is_empty() {
        return Vec::new();
    }
    let Some(tiers) = subsets_for_window(dependent_count + 1) else {
        return Vec::new();
    };
    let tier_sets: Vec<&NumberSet> = tiers.iter().filter(|s| s.contains(&0)).collect();
    let width = dependent_count + 1;

    let mut out = Vec::new();
    let mut chain = Vec::with_capacity(number_set.len());
    extend_chain(&mut out, number_set, &tier_sets, &mut chain, width);
    out
}

fn extend_chain(
    out: &mut Vec<Vec<DependentTuple>>,
    number_set: &[usize],
    tier_sets: &[&NumberSet],
    chain: &mut Vec<DependentTuple>,
    width: usize,
) {
    let position = number_set[chain.len()];
    for tiers in tier_sets {
        let mut tuple = vec![-1i32; width];
        tuple[0] = position as i32;
        for (slot, &tier) in tuple[1..].iter_mut().zip(tiers.iter().filter(|&&t| t != 0)) {
            *slot = tier as i32;
        }
        chain.push(tuple);
        if chain.len() == number_set.len() {
            out.push(chain.clone());
        } else {
            extend_chain(out, number_set, tier_sets, chain, width);
        }
        chain.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_dependent_tier() {
        let sets = dependent_subsets(&[0, 2], 1);
        // two choices per position: primary alone, primary + tier 1
        assert_eq!(sets.len(), 4);
        assert_eq!(sets[0], vec![vec![0, -1], vec![2, -1]]);
        assert_eq!(sets[1], vec![vec![0, -1], vec![2, 1]]);
        assert_eq!(sets[2], vec![vec![0, 1], vec![2, -1]]);
        assert_eq!(sets[3], vec![vec![0, 1], vec![2, 1]]);
    }

    #[test]
    fn test_two_dependent_tiers_width() {
        let sets = dependent_subsets(&[1], 2);
        assert_eq!(sets.len(), 4);
        assert!(sets.iter().all(|s| s.len() == 1 && s[0].len() == 3));
        assert!(sets.contains(&vec![vec![1, 1, 2]]));
        assert!(sets.contains(&vec![vec![1, 2, -1]]));
    }

    #[test]
    fn test_zero_dependents_is_identity() {
        assert_eq!(dependent_subsets(&[0, 1], 0), vec![vec![vec![0], vec![1]]]);
    }

    #[test]
    fn test_empty_number_set() {
        assert!(dependent_subsets(&[], 2).is_empty());
    }
}
