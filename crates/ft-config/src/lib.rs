//! Frame Tally configuration loading and validation.
//!
//! This crate provides:
//! - Typed Rust structs for trainer.json
//! - Config resolution (CLI → env → XDG → system → defaults)
//! - Semantic validation

pub mod resolve;
pub mod trainer;
pub mod validate;

pub use resolve::{load_config, resolve_config, ConfigPaths, ConfigSource};
pub use trainer::{AccumulatorKind, NumberSetConfig, TrainerConfig};
pub use validate::{
    check_dependent_budget, dependent_layout_count, validate_trainer, ValidationError,
    ValidationResult, MAX_DEPENDENT_LAYOUTS,
};

/// Schema version for configuration files.
pub const CONFIG_SCHEMA_VERSION: &str = "1.0.0";
