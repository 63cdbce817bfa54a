//! Exit codes for the ft-core CLI.
//!
//! Exit code ranges:
//! - 0-1: Operational outcomes (parse outcome from code, not output)
//! - 10-19: User/input errors (recoverable by user action)
//! - 20-29: Internal errors (bugs, should be reported)

use ft_common::{Error, ErrorCategory};

/// Exit codes for ft-core operations.
///
/// These codes are a stable contract for automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Success
    Clean = 0,

    /// Ran fine but nothing was trained (empty input or every example skipped)
    NothingTrained = 1,

    /// Invalid arguments
    ArgsError = 10,

    /// Configuration file missing, unparsable or invalid
    ConfigError = 11,

    /// Training input does not fit the model (window, number set, frame width)
    InputError = 12,

    /// Internal error (bug - please report)
    InternalError = 20,

    /// I/O error
    IoError = 21,
}

impl ExitCode {
    /// Convert to i32 for process exit.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn is_success(self) -> bool {
        (self as i32) < 10
    }

    /// Codes 10-19; the user can fix these.
    pub fn is_user_error(self) -> bool {
        (10..20).contains(&(self as i32))
    }

    /// Codes 20 and up.
    pub fn is_internal_error(self) -> bool {
        (self as i32) >= 20
    }

    /// Stable name for JSON output.
    pub fn code_name(&self) -> &'static str {
        match self {
            ExitCode::Clean => "OK_CLEAN",
            ExitCode::NothingTrained => "OK_NOTHING_TRAINED",
            ExitCode::ArgsError => "ERR_ARGS",
            ExitCode::ConfigError => "ERR_CONFIG",
            ExitCode::InputError => "ERR_INPUT",
            ExitCode::InternalError => "ERR_INTERNAL",
            ExitCode::IoError => "ERR_IO",
        }
    }
}

impl From<&Error> for ExitCode {
    fn from(err: &Error) -> Self {
        match err.category() {
            ErrorCategory::Config => ExitCode::ConfigError,
            ErrorCategory::Catalog | ErrorCategory::Training => ExitCode::InputError,
            ErrorCategory::Io => ExitCode::IoError,
            ErrorCategory::Store | ErrorCategory::Concurrency => ExitCode::InternalError,
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code_name(), self.as_i32())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_are_disjoint() {
        assert!(ExitCode::Clean.is_success());
        assert!(ExitCode::NothingTrained.is_success());
        assert!(ExitCode::ConfigError.is_user_error());
        assert!(!ExitCode::ConfigError.is_internal_error());
        assert!(ExitCode::IoError.is_internal_error());
    }

    #[test]
    fn maps_error_categories() {
        let frame = Error::FrameMismatch {
            expected: 5,
            actual: 3,
        };
        assert_eq!(ExitCode::from(&frame), ExitCode::InputError);
        assert_eq!(
            ExitCode::from(&Error::Config("bad".into())),
            ExitCode::ConfigError
        );
        assert_eq!(
            ExitCode::from(&Error::LockPoisoned("store".into())),
            ExitCode::InternalError
        );
    }

    #[test]
    fn display_includes_name_and_code() {
        assert_eq!(ExitCode::InputError.to_string(), "ERR_INPUT (12)");
        assert_eq!(i32::from(ExitCode::IoError), 21);
    }
}
