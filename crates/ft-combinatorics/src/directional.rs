//! Heuristic number set families anchored on the focus position.
//!
//! Each family lists the full window set exactly once, always last, and
//! never lists the same set twice. A one-position window yields `[[0]]` and
//! an empty window yields nothing.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::catalog::{full_set, subsets_for_window};
use crate::NumberSet;

/// One single-position set per offset.
pub fn linear_sets(window: usize, _focus: usize) -> Vec<NumberSet> {
    family(window, |out| {
        out.extend((0..window).map(|i| vec![i]));
    })
}

/// Growing prefixes `0..i` up to and including the focus width.
pub fn sequence_left_sets(window: usize, focus: usize) -> Vec<NumberSet> {
    family(window, |out| {
        let end = focus.min(window);
        out.extend((1..=end).map(|i| (0..i).collect()));
    })
}

/// Suffixes `i..window` from the focus, shortest first.
pub fn sequence_right_sets(window: usize, focus: usize) -> Vec<NumberSet> {
    family(window, |out| {
        let start = if focus < window { focus } else { 0 };
        out.extend((start..window).rev().map(|i| (i..window).collect()));
    })
}

/// Runs spreading left from the focus, each optionally extended right.
pub fn fan_sets(window: usize, focus: usize) -> Vec<NumberSet> {
    family(window, |out| {
        let mid = focus.min(window - 1);
        for i in 0..mid {
            out.push((i..=mid).collect());
            out.extend(((mid + 1)..window).map(|xi| (i..=xi).collect()));
        }
        out.extend(((mid + 1)..=window).map(|i| (mid..i).collect()));
    })
}

/// Prefixes up to the focus, each joined with suffixes from the focus.
pub fn edge_sets(window: usize, focus: usize) -> Vec<NumberSet> {
    family(window, |out| {
        let mid = focus.min(window - 1);
        for i in 1..=mid {
            out.push((0..i).collect());
            for xi in mid..window {
                out.push((0..i).chain(xi..window).collect());
            }
        }
        out.extend((mid..window).map(|i| (i..window).collect()));
    })
}

/// Runs a family generator for windows of two or more positions, then drops
/// duplicates and moves the full set to the end.
fn family(window: usize, generate: impl FnOnce(&mut Vec<NumberSet>)) -> Vec<NumberSet> {
    match window {
        0 => return Vec::new(),
        1 => return vec![vec![0]],
        _ => {}
    }
    let mut raw = Vec::new();
    generate(&mut raw);

    let full = full_set(window);
    let mut out: Vec<NumberSet> = Vec::with_capacity(raw.len() + 1);
    for set in raw {
        if set != full && !out.contains(&set) {
            out.push(set);
        }
    }
    out.push(full);
    out
}

/// Named number set family, as selected by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NumberSetFamily {
    /// Every non-empty subset.
    #[default]
    All,
    Linear,
    SequenceLeft,
    SequenceRight,
    Fan,
    Edge,
}

impl NumberSetFamily {
    pub const ALL: [NumberSetFamily; 6] = [
        NumberSetFamily::All,
        NumberSetFamily::Linear,
        NumberSetFamily::SequenceLeft,
        NumberSetFamily::SequenceRight,
        NumberSetFamily::Fan,
        NumberSetFamily::Edge,
    ];

    /// Sets for this family, full set last.
    pub fn sets(self, window: usize, focus: usize) -> Vec<NumberSet> {
        match self {
            NumberSetFamily::All => subsets_for_window(window)
                .map(|c| c.as_ref().clone())
                .unwrap_or_default(),
            NumberSetFamily::Linear => linear_sets(window, focus),
            NumberSetFamily::SequenceLeft => sequence_left_sets(window, focus),
            NumberSetFamily::SequenceRight => sequence_right_sets(window, focus),
            NumberSetFamily::Fan => fan_sets(window, focus),
            NumberSetFamily::Edge => edge_sets(window, focus),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NumberSetFamily::All => "all",
            NumberSetFamily::Linear => "linear",
            NumberSetFamily::SequenceLeft => "sequence-left",
            NumberSetFamily::SequenceRight => "sequence-right",
            NumberSetFamily::Fan => "fan",
            NumberSetFamily::Edge => "edge",
        }
    }
}

impl fmt::Display for NumberSetFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NumberSetFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown number set family: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear() {
        assert_eq!(
            linear_sets(3, 1),
            vec![vec![0], vec![1], vec![2], vec![0, 1, 2]]
        );
    }

    #[test]
    fn test_sequence_left() {
        assert_eq!(
            sequence_left_sets(4, 2),
            vec![vec![0], vec![0, 1], vec![0, 1, 2, 3]]
        );
        // focus past the window clamps to the full width
        assert_eq!(sequence_left_sets(3, 9).last(), Some(&vec![0, 1, 2]));
        assert_eq!(sequence_left_sets(3, 9).len(), 3);
    }

    #[test]
    fn test_sequence_right() {
        assert_eq!(
            sequence_right_sets(4, 1),
            vec![vec![3], vec![2, 3], vec![1, 2, 3], vec![0, 1, 2, 3]]
        );
    }

    #[test]
    fn test_fan_window_three_focus_one() {
        assert_eq!(
            fan_sets(3, 1),
            vec![vec![0, 1], vec![1], vec![1, 2], vec![0, 1, 2]]
        );
    }

    #[test]
    fn test_fan_focus_zero_has_single_full() {
        let sets = fan_sets(3, 0);
        assert_eq!(sets, vec![vec![0], vec![0, 1], vec![0, 1, 2]]);
    }

    #[test]
    fn test_edge_window_four_focus_two() {
        assert_eq!(
            edge_sets(4, 2),
            vec![
                vec![0],
                vec![0, 2, 3],
                vec![0, 3],
                vec![0, 1],
                vec![0, 1, 3],
                vec![2, 3],
                vec![3],
                vec![0, 1, 2, 3],
            ]
        );
    }

    #[test]
    fn test_trivial_windows() {
        for f in NumberSetFamily::ALL {
            assert_eq!(f.sets(1, 0), vec![vec![0]], "{f}");
            assert!(f.sets(0, 0).is_empty(), "{f}");
        }
    }

    #[test]
    fn test_family_parse() {
        assert_eq!("fan".parse::<NumberSetFamily>(), Ok(NumberSetFamily::Fan));
        assert_eq!(
            "Sequence-Left".parse::<NumberSetFamily>(),
            Ok(NumberSetFamily::SequenceLeft)
        );
        assert!("spiral".parse::<NumberSetFamily>().is_err());
    }

    #[test]
    fn test_family_serde_names_match_display() {
        for f in NumberSetFamily::ALL {
            let json = serde_json::to_string(&f).unwrap();
            assert_eq!(json, format!("\"{f}\""));
        }
    }
}
