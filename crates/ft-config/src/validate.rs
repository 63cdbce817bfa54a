//! Configuration validation errors and semantic validation.

use ft_combinatorics::MAX_WINDOW;
use thiserror::Error;

use crate::trainer::TrainerConfig;

/// Validation result type.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Largest supported dependent tier count; combinations grow as `(2^n)^len`.
pub const MAX_DEPENDENT_COUNT: usize = 3;

/// Most dependent layouts a single number set may expand into.
pub const MAX_DEPENDENT_LAYOUTS: usize = 4096;

/// Layouts `dependent_subsets` yields for a set of `len` offsets, or `None`
/// past `usize`.
pub fn dependent_layout_count(len: usize, dependent_count: usize) -> Option<usize> {
    let per_offset = 1usize.checked_shl(u32::try_from(dependent_count).ok()?)?;
    per_offset.checked_pow(u32::try_from(len).ok()?)
}

/// Rejects a tier count whose layouts for a `len`-offset set exceed
/// [`MAX_DEPENDENT_LAYOUTS`].
pub fn check_dependent_budget(len: usize, dependent_count: usize) -> ValidationResult<()> {
    if dependent_count == 0 {
        return Ok(());
    }
    if dependent_count > MAX_DEPENDENT_COUNT {
        return Err(invalid(
            "number_sets.dependent_count",
            format!(
                "Must be at most {}, got {}",
                MAX_DEPENDENT_COUNT, dependent_count
            ),
        ));
    }
    match dependent_layout_count(len, dependent_count) {
        Some(n) if n <= MAX_DEPENDENT_LAYOUTS => Ok(()),
        n => Err(invalid(
            "number_sets.dependent_count",
            format!(
                "{} tiers over {} offsets expand to {} layouts, at most {} allowed",
                dependent_count,
                len,
                n.map_or_else(|| "too many".to_string(), |n| n.to_string()),
                MAX_DEPENDENT_LAYOUTS
            ),
        )),
    }
}

/// Configuration validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Semantic validation failed: {0}")]
    SemanticError(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: String, actual: String },
}

impl ValidationError {
    /// Error code for structured error reporting.
    pub fn code(&self) -> u32 {
        match self {
            ValidationError::IoError(_) => 60,
            ValidationError::ParseError(_) => 61,
            ValidationError::SemanticError(_) => 63,
            ValidationError::InvalidValue { .. } => 65,
            ValidationError::VersionMismatch { .. } => 66,
        }
    }
}

impl From<ValidationError> for ft_common::Error {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::InvalidValue { field, message } => {
                ft_common::Error::InvalidConfig { field, message }
            }
            other => ft_common::Error::Config(other.to_string()),
        }
    }
}

fn invalid(field: impl Into<String>, message: impl Into<String>) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.into(),
        message: message.into(),
    }
}

/// Validate a trainer configuration semantically.
pub fn validate_trainer(cfg: &TrainerConfig) -> ValidationResult<()> {
    if cfg.schema_version != crate::CONFIG_SCHEMA_VERSION {
        return Err(ValidationError::VersionMismatch {
            expected: crate::CONFIG_SCHEMA_VERSION.to_string(),
            actual: cfg.schema_version.clone(),
        });
    }

    if cfg.window_size == 0 || cfg.window_size > MAX_WINDOW {
        return Err(invalid(
            "window_size",
            format!("Must be in [1, {}], got {}", MAX_WINDOW, cfg.window_size),
        ));
    }

    if cfg.focus >= cfg.window_size {
        return Err(invalid(
            "focus",
            format!(
                "Must be inside the window [0, {}), got {}",
                cfg.window_size, cfg.focus
            ),
        ));
    }

    for (i, set) in cfg.number_sets.extra.iter().enumerate() {
        let field = format!("number_sets.extra[{}]", i);
        if set.is_empty() {
            return Err(invalid(field, "Must name at least one offset"));
        }
        if !set.windows(2).all(|w| w[0] < w[1]) {
            return Err(invalid(field, "Offsets must be strictly ascending"));
        }
        if let Some(&bad) = set.iter().find(|&&o| o >= cfg.window_size) {
            return Err(invalid(
                field,
                format!("Offset {} is outside the window", bad),
            ));
        }
    }

    // the full set is the widest one expanded
    check_dependent_budget(cfg.window_size, cfg.number_sets.dependent_count)?;

    if cfg.workers == 0 {
        return Err(invalid("workers", "Must be at least 1"));
    }

    if cfg.no_empty_except_full && !cfg.no_empty_elements {
        return Err(ValidationError::SemanticError(
            "no_empty_except_full requires no_empty_elements".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        validate_trainer(&TrainerConfig::default()).unwrap();
    }

    #[test]
    fn test_focus_outside_window() {
        let cfg = TrainerConfig {
            window_size: 3,
            focus: 3,
            ..TrainerConfig::default()
        };
        let err = validate_trainer(&cfg).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidValue { ref field, .. } if field == "focus"));
        assert_eq!(err.code(), 65);
    }

    #[test]
    fn test_window_bounds() {
        for window_size in [0, MAX_WINDOW + 1] {
            let cfg = TrainerConfig {
                window_size,
                focus: 0,
                ..TrainerConfig::default()
            };
            assert!(validate_trainer(&cfg).is_err());
        }
    }

    #[test]
    fn test_extra_sets_checked() {
        let mut cfg = TrainerConfig::default();
        cfg.number_sets.extra = vec![vec![0, 1], vec![3, 1]];
        let err = validate_trainer(&cfg).unwrap_err();
        assert!(err.to_string().contains("extra[1]"));

        cfg.number_sets.extra = vec![vec![0, 9]];
        assert!(validate_trainer(&cfg).is_err());
    }

    #[test]
    fn test_dependent_layout_budget() {
        let mut cfg = TrainerConfig {
            window_size: 8,
            focus: 3,
            ..TrainerConfig::default()
        };
        cfg.number_sets.dependent_count = 3;
        let err = validate_trainer(&cfg).unwrap_err();
        assert!(
            matches!(err, ValidationError::InvalidValue { ref field, .. } if field == "number_sets.dependent_count")
        );
        assert!(err.to_string().contains("16777216"));

        cfg.number_sets.dependent_count = 1;
        validate_trainer(&cfg).unwrap();

        cfg.window_size = 4;
        cfg.focus = 1;
        cfg.number_sets.dependent_count = 3;
        validate_trainer(&cfg).unwrap();

        cfg.number_sets.dependent_count = MAX_DEPENDENT_COUNT + 1;
        assert!(validate_trainer(&cfg).is_err());
    }

    #[test]
    fn test_dependent_layout_count() {
        assert_eq!(dependent_layout_count(3, 1), Some(8));
        assert_eq!(dependent_layout_count(8, 3), Some(16_777_216));
        assert_eq!(dependent_layout_count(20, 3), Some(1 << 60));
        assert_eq!(dependent_layout_count(40, 3), None);
        assert!(check_dependent_budget(20, 0).is_ok());
    }

    #[test]
    fn test_version_mismatch() {
        let cfg = TrainerConfig {
            schema_version: "0.9".into(),
            ..TrainerConfig::default()
        };
        assert!(matches!(
            validate_trainer(&cfg),
            Err(ValidationError::VersionMismatch { .. })
        ));
    }

    #[test]
    fn test_except_full_requires_no_empty() {
        let cfg = TrainerConfig {
            no_empty_elements: false,
            no_empty_except_full: true,
            ..TrainerConfig::default()
        };
        assert!(matches!(
            validate_trainer(&cfg),
            Err(ValidationError::SemanticError(_))
        ));
    }

    #[test]
    fn test_converts_to_common_error() {
        let err: ft_common::Error = invalid("workers", "Must be at least 1").into();
        assert_eq!(err.code(), 11);
    }
}
