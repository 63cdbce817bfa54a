//! Training frames: the encoded window around one focus position.

use ft_combinatorics::DependentTuple;
use ft_common::{Error, Result, VectorId};

use crate::encoding::{encode, EMPTY_VECT, PLACEHOLDER};

/// Key of a number set that read an empty element where empties are not
/// allowed.
pub const EMPTY_KEY: VectorId = -2;

/// Key of a number set that could not be read from the frame.
pub const NO_VECTOR: VectorId = -1;

/// One example's window of encoded values.
///
/// Tier 0 is the primary value at each position; further tiers carry
/// dependent values (a tag alongside a token, for instance).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    tiers: Vec<Vec<i32>>,
    focus: usize,
}

impl Frame {
    pub fn new(primary: Vec<i32>, focus: usize) -> Self {
        Self {
            tiers: vec![primary],
            focus,
        }
    }

    /// Window around `position` in `sequence`. Positions outside the
    /// sequence read as empty.
    pub fn from_sequence(sequence: &[i32], position: usize, window: usize, focus: usize) -> Self {
        Self::new(window_values(sequence, position, window, focus), focus)
    }

    /// Window over parallel sequences, the first being the primary tier.
    pub fn from_tiers(
        sequences: &[&[i32]],
        position: usize,
        window: usize,
        focus: usize,
    ) -> Result<Self> {
        let mut frame: Option<Frame> = None;
        for seq in sequences {
            let values = window_values(seq, position, window, focus);
            frame = Some(match frame {
                None => Frame::new(values, focus),
                Some(f) => f.with_tier(values)?,
            });
        }
        Ok(frame.unwrap_or_else(|| Frame::new(vec![EMPTY_VECT; window], focus)))
    }

    /// Adds a dependent tier; it must match the window width.
    pub fn with_tier(mut self, values: Vec<i32>) -> Result<Self> {
        if values.len() != self.window() {
            return Err(Error::FrameMismatch {
                expected: self.window(),
                actual: values.len(),
            });
        }
        self.tiers.push(values);
        Ok(self)
    }

    pub fn window(&self) -> usize {
        self.tiers[0].len()
    }

    pub fn focus(&self) -> usize {
        self.focus
    }

    pub fn primary(&self) -> &[i32] {
        &self.tiers[0]
    }

    pub fn tier(&self, tier: usize) -> Option<&[i32]> {
        self.tiers.get(tier).map(Vec::as_slice)
    }

    pub fn tier_count(&self) -> usize {
        self.tiers.len()
    }

    /// Context key of `set` in this frame.
    ///
    /// With a dependent layout each position contributes its primary value
    /// followed by one slot per dependent tier, [`PLACEHOLDER`] for tiers the
    /// set does not read. Returns [`EMPTY_KEY`] when `no_empty` is set and a
    /// read element is empty, [`NO_VECTOR`] when an offset is outside the
    /// window.
    pub fn vector_id(
        &self,
        set: &[usize],
        dependent: Option<&[DependentTuple]>,
        no_empty: bool,
    ) -> VectorId {
        let primary = self.primary();
        let mut values = Vec::with_capacity(set.len() * (1 + self.tiers.len()));
        match dependent {
            None => {
                for &off in set {
                    let Some(&v) = primary.get(off) else {
                        return NO_VECTOR;
                    };
                    if no_empty && v == EMPTY_VECT {
                        return EMPTY_KEY;
                    }
                    values.push(v);
                }
            }
            Some(tuples) => {
                for tuple in tuples {
                    let Some(off) = tuple.first().and_then(|&o| usize::try_from(o).ok()) else {
                        return NO_VECTOR;
                    };
                    let Some(&v) = primary.get(off) else {
                        return NO_VECTOR;
                    };
                    if no_empty && v == EMPTY_VECT {
                        return EMPTY_KEY;
                    }
                    values.push(v);
                    for tier in 1..tuple.len() {
                        if !tuple[1..].contains(&(tier as i32)) {
                            values.push(PLACEHOLDER);
                            continue;
                        }
                        let dv = self
                            .tiers
                            .get(tier)
                            .and_then(|t| t.get(off))
                            .copied()
                            .unwrap_or(EMPTY_VECT);
                        if no_empty && dv == EMPTY_VECT {
                            return EMPTY_KEY;
                        }
                        values.push(dv);
                    }
                }
            }
        }
        encode(&values)
    }
}

fn window_values(sequence: &[i32], position: usize, window: usize, focus: usize) -> Vec<i32> {
    (0..window)
        .map(|i| {
            (position + i)
                .checked_sub(focus)
                .and_then(|p| sequence.get(p))
                .copied()
                .unwrap_or(EMPTY_VECT)
        })
        .collect()
}
