//! Frame Tally core library.
//!
//! Counts which value follows which context across many number sets at once:
//! - Accumulators holding per-context value distributions
//! - Vector key encoding for contexts and tokens
//! - The vector set store and its compaction
//! - Per-number-set accumulator indices
//! - Training fan-out over a shared model
//! - Structured logging and CLI exit codes
//!
//! The binary entry point is in `main.rs`.

pub mod accum;
pub mod encoding;
pub mod exit_codes;
pub mod index;
pub mod logging;
pub mod train;
pub mod vectset;

pub use accum::{Accumulator, AccumulatorKind, ValProb};
pub use index::NumberSetIndex;
pub use train::{Example, Frame, Model, TrainSummary, TrainingAggregator};
pub use vectset::VectorSetStore;
