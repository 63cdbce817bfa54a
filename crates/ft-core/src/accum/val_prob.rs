//! Value/probability pairs reported by accumulators.

use std::cmp::Ordering;

use ft_common::ValueId;
use serde::{Deserialize, Serialize};

/// One value's share of an accumulator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValProb {
    pub value: ValueId,
    pub count: u32,
    pub probability: f64,
}

impl ValProb {
    pub fn new(value: ValueId, count: u32, probability: f64) -> Self {
        Self {
            value,
            count,
            probability,
        }
    }

    /// Ranking order: higher probability first, ties broken by lower value id.
    pub fn rank(a: &ValProb, b: &ValProb) -> Ordering {
        b.probability
            .total_cmp(&a.probability)
            .then_with(|| a.value.cmp(&b.value))
    }
}

/// Sorts in ranking order.
pub fn sort_ranked(list: &mut [ValProb]) {
    list.sort_by(ValProb::rank);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_prefers_probability_then_value() {
        let mut list = vec![
            ValProb::new(9, 1, 0.25),
            ValProb::new(4, 2, 0.5),
            ValProb::new(2, 1, 0.25),
        ];
        sort_ranked(&mut list);
        let order: Vec<_> = list.iter().map(|vp| vp.value).collect();
        assert_eq!(order, vec![4, 2, 9]);
    }
}
