//! Text renderings of number sets for logs and CLI output.

use crate::dependent::DependentTuple;

/// Space-separated offsets: `"0 2 3"`.
pub fn set_to_string(set: &[usize]) -> String {
    set.iter()
        .map(usize::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

/// One glyph per window position.
///
/// `X` is the focus inside the set, `x` another member, `+` the focus outside
/// the set, `-` any other position.
pub fn set_to_string_position(set: &[usize], window: usize, focus: usize) -> String {
    (0..window)
        .map(|i| match (set.contains(&i), i == focus) {
            (true, true) => "X",
            (true, false) => "x",
            (false, true) => "+",
            (false, false) => "-",
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Dependent number set rendering: `"{0 1} {2 D}"`, with `D` for unused tier slots.
pub fn dependent_to_string(tuples: &[DependentTuple]) -> String {
    tuples
        .iter()
        .map(|t| {
            let inner = t
                .iter()
                .map(|&v| if v < 0 { "D".to_string() } else { v.to_string() })
                .collect::<Vec<_>>()
                .join(" ");
            format!("{{{inner}}}")
        })
        .collect::<Vec<_>>()
        .join(" ")
}
