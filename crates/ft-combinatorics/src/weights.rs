//! Per-set weights used when combining number set predictions.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::NumberSet;

/// Basis for a number set's weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NsWeightBase {
    /// Every set weighs 1.
    Flat,
    /// Each member contributes `0.5^d`, `d` its distance from the focus.
    Distance,
    /// Each member contributes `window - d`; the focus contributes `window`.
    DistanceLinear,
    /// Set size.
    Natural,
    /// Set size, except the focus identity set weighs `window`.
    NaturalId,
    /// No weighting; equivalent to flat.
    #[default]
    None,
}

impl FromStr for NsWeightBase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "flat" => Ok(NsWeightBase::Flat),
            "distance" => Ok(NsWeightBase::Distance),
            "distance-linear" => Ok(NsWeightBase::DistanceLinear),
            "natural" => Ok(NsWeightBase::Natural),
            "natural-id" => Ok(NsWeightBase::NaturalId),
            "none" => Ok(NsWeightBase::None),
            other => Err(format!("unknown weight base: {other}")),
        }
    }
}

/// One weight per set, in input order.
pub fn number_set_weights(
    sets: &[NumberSet],
    window: usize,
    focus: usize,
    base: NsWeightBase,
) -> Vec<f64> {
    sets.iter().map(|set| set_weight(set, window, focus, base)).collect()
}

fn set_weight(set: &[usize], window: usize, focus: usize, base: NsWeightBase) -> f64 {
    match base {
        NsWeightBase::NaturalId if set == [focus] => window as f64,
        NsWeightBase::NaturalId | NsWeightBase::Natural => set.len() as f64,
        NsWeightBase::DistanceLinear => set
            .iter()
            .map(|&p| window as f64 - p.abs_diff(focus) as f64)
            .sum(),
        NsWeightBase::Distance => set
            .iter()
            .map(|&p| 0.5f64.powi(p.abs_diff(focus) as i32))
            .sum(),
        NsWeightBase::Flat | NsWeightBase::None => 1.0,
    }
}
