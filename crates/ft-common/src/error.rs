//! Error types for Frame Tally.
//!
//! Errors carry:
//! - Stable error codes for machine parsing
//! - Category classification for grouping
//! - Recoverability hints for automation
//! - Remediation suggestions for humans
//!
//! Absence is never an error in this workspace: looking up a context key that
//! was never observed yields zero, empty or `None`. The variants below cover
//! programmer errors and environment failures only.
//!
//! # Human-Facing Output
//!
//! ```text
//! ✗ Frame Width Mismatch
//!   Reason: frame width mismatch: expected 5 positions, got 3
//!   Fix: Build frames with exactly window_size positions.
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Result type alias for Frame Tally operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Configuration loading and validation.
    Config,
    /// Number set catalog lookups.
    Catalog,
    /// Frame shape and training input.
    Training,
    /// Vector set store addressing.
    Store,
    /// Lock poisoning and other concurrency failures.
    Concurrency,
    /// File I/O and serialization.
    Io,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Catalog => write!(f, "catalog"),
            ErrorCategory::Training => write!(f, "training"),
            ErrorCategory::Store => write!(f, "store"),
            ErrorCategory::Concurrency => write!(f, "concurrency"),
            ErrorCategory::Io => write!(f, "io"),
        }
    }
}

/// Unified error type for Frame Tally.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid configuration value for {field}: {message}")]
    InvalidConfig { field: String, message: String },

    // Catalog errors (20-29)
    #[error("number set {set_number} out of range (model has {count})")]
    NumberSetOutOfRange { set_number: usize, count: usize },

    #[error("number set not in catalog: {0}")]
    UnknownNumberSet(String),

    #[error("window size {window} out of range (max {max})")]
    WindowOutOfRange { window: usize, max: usize },

    // Training errors (30-39)
    #[error("frame width mismatch: expected {expected} positions, got {actual}")]
    FrameMismatch { expected: usize, actual: usize },

    // Store errors (40-49)
    #[error("vector set id {id} out of range")]
    VectSetOutOfRange { id: u32 },

    // Concurrency errors (50-59)
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns the error code for this error type.
    ///
    /// Error codes are stable and grouped by category:
    /// - 10-19: Configuration errors
    /// - 20-29: Catalog errors
    /// - 30-39: Training errors
    /// - 40-49: Store errors
    /// - 50-59: Concurrency errors
    /// - 60-69: I/O errors
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::InvalidConfig { .. } => 11,
            Error::NumberSetOutOfRange { .. } => 20,
            Error::UnknownNumberSet(_) => 21,
            Error::WindowOutOfRange { .. } => 22,
            Error::FrameMismatch { .. } => 30,
            Error::VectSetOutOfRange { .. } => 40,
            Error::LockPoisoned(_) => 50,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
        }
    }

    /// Returns the error category for grouping and filtering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config(_) | Error::InvalidConfig { .. } => ErrorCategory::Config,
            Error::NumberSetOutOfRange { .. }
            | Error::UnknownNumberSet(_)
            | Error::WindowOutOfRange { .. } => ErrorCategory::Catalog,
            Error::FrameMismatch { .. } => ErrorCategory::Training,
            Error::VectSetOutOfRange { .. } => ErrorCategory::Store,
            Error::LockPoisoned(_) => ErrorCategory::Concurrency,
            Error::Io(_) | Error::Json(_) => ErrorCategory::Io,
        }
    }

    /// Returns whether this error is potentially recoverable.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Config(_) | Error::InvalidConfig { .. } => true,

            // Caller bugs: retrying the same input fails again
            Error::NumberSetOutOfRange { .. } => false,
            Error::UnknownNumberSet(_) => false,
            Error::WindowOutOfRange { .. } => false,
            Error::FrameMismatch { .. } => false,
            Error::VectSetOutOfRange { .. } => false,

            // A panicked writer may have left an index half-updated
            Error::LockPoisoned(_) => false,

            Error::Io(_) => true,
            Error::Json(_) => true,
        }
    }

    /// Returns a human-readable remediation hint.
    pub fn remediation(&self) -> &'static str {
        match self {
            Error::Config(_) => "Check the config file syntax, or run without --config to use defaults.",
            Error::InvalidConfig { .. } => {
                "Fix the named field. 'ft-core config schema' prints the accepted shape."
            }
            Error::NumberSetOutOfRange { .. } => {
                "Use a set number below the model's number set count."
            }
            Error::UnknownNumberSet(_) => {
                "Offsets must be ascending, unique and inside the window."
            }
            Error::WindowOutOfRange { .. } => "Use a window between 1 and 20 positions.",
            Error::FrameMismatch { .. } => "Build frames with exactly window_size positions.",
            Error::VectSetOutOfRange { .. } => {
                "The id was issued before a compaction. Re-read ids from the accumulators."
            }
            Error::LockPoisoned(_) => {
                "A training worker panicked. Discard the model and retrain."
            }
            Error::Io(_) => "Check that the path exists and is readable.",
            Error::Json(_) => "Invalid JSON. Check syntax with 'jq . <file>'.",
        }
    }

    /// Returns a short headline for human-readable output.
    pub fn headline(&self) -> &'static str {
        match self {
            Error::Config(_) => "Configuration Error",
            Error::InvalidConfig { .. } => "Invalid Configuration",
            Error::NumberSetOutOfRange { .. } => "Number Set Out Of Range",
            Error::UnknownNumberSet(_) => "Unknown Number Set",
            Error::WindowOutOfRange { .. } => "Window Out Of Range",
            Error::FrameMismatch { .. } => "Frame Width Mismatch",
            Error::VectSetOutOfRange { .. } => "Vector Set Out Of Range",
            Error::LockPoisoned(_) => "Lock Poisoned",
            Error::Io(_) => "I/O Error",
            Error::Json(_) => "JSON Parse Error",
        }
    }
}

/// Structured error response for JSON output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// Stable error code.
    pub code: u32,

    /// Error category for grouping.
    pub category: ErrorCategory,

    /// Human-readable error message.
    pub message: String,

    /// Whether the error is potentially recoverable.
    pub recoverable: bool,

    /// Additional structured context.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,
}

impl From<&Error> for StructuredError {
    fn from(err: &Error) -> Self {
        let mut context = HashMap::new();

        match err {
            Error::InvalidConfig { field, .. } => {
                context.insert("field".to_string(), serde_json::json!(field));
            }
            Error::NumberSetOutOfRange { set_number, count } => {
                context.insert("set_number".to_string(), serde_json::json!(set_number));
                context.insert("count".to_string(), serde_json::json!(count));
            }
            Error::WindowOutOfRange { window, max } => {
                context.insert("window".to_string(), serde_json::json!(window));
                context.insert("max".to_string(), serde_json::json!(max));
            }
            Error::FrameMismatch { expected, actual } => {
                context.insert("expected".to_string(), serde_json::json!(expected));
                context.insert("actual".to_string(), serde_json::json!(actual));
            }
            Error::VectSetOutOfRange { id } => {
                context.insert("vect_set_id".to_string(), serde_json::json!(id));
            }
            _ => {}
        }

        StructuredError {
            code: err.code(),
            category: err.category(),
            message: err.to_string(),
            recoverable: err.is_recoverable(),
            context,
        }
    }
}

impl StructuredError {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(r#"{{"code":{},"error":"serialization_failed"}}"#, self.code)
        })
    }
}

/// Format an error for human-readable stderr output.
///
/// Output format:
/// ```text
/// ✗ [Headline]
///   Reason: [Error message]
///   Fix: [Remediation hint]
/// ```
pub fn format_error_human(err: &Error, use_color: bool) -> String {
    let (red, cyan, reset) = if use_color {
        ("\x1b[31m", "\x1b[36m", "\x1b[0m")
    } else {
        ("", "", "")
    };

    format!(
        "{red}✗{reset} {headline}\n  Reason: {message}\n  {cyan}Fix:{reset} {remediation}",
        red = red,
        cyan = cyan,
        reset = reset,
        headline = err.headline(),
        message = err,
        remediation = err.remediation()
    )
}
