//! Training: frames, the model and the per-example aggregator.

pub mod aggregator;
pub mod frame;
pub mod model;

pub use aggregator::{Example, TrainStats, TrainSummary, TrainingAggregator};
pub use frame::{Frame, EMPTY_KEY, NO_VECTOR};
pub use model::{Model, Prediction};
