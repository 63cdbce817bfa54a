//! Frame Tally number set combinatorics.
//!
//! A number set is an ascending list of window offsets. Every module here is
//! a pure function over offsets except the per-window catalog, which is
//! memoized process-wide.

pub mod catalog;
pub mod classify;
pub mod dependent;
pub mod directional;
pub mod render;
pub mod weights;

pub use catalog::*;
pub use classify::*;
pub use dependent::{dependent_subsets, DependentTuple};
pub use directional::NumberSetFamily;
pub use render::*;
pub use weights::{number_set_weights, NsWeightBase};

/// Ascending list of window offsets.
pub type NumberSet = Vec<usize>;
