//! Frame Tally common types, IDs, and errors.
//!
//! This crate provides foundational types shared across the ft-* crates:
//! - Vector set and number set identifiers
//! - Common error types with stable codes
//! - Output formats

pub mod error;
pub mod id;
pub mod output;

pub use error::{Error, ErrorCategory, Result};
pub use id::{ModelId, SetNumber, ValueId, VectSetId, VectorId};
pub use output::OutputFormat;
