//! Raw per-position vectors kept once per training example.
//!
//! Accumulators for the full window carry a [`VectSetId`](ft_common::VectSetId)
//! into the store; every narrower number set can rebuild its own context from
//! that one array.

mod store;

pub use store::{
    contains_vect_set, is_set_contains, CompactionMap, StoreStats, VectorSetStore,
};
