//! Stable error codes are part of the CLI's machine contract.

use ft_common::error::StructuredError;
use ft_common::{Error, ErrorCategory};

fn all_errors() -> Vec<Error> {
    vec![
        Error::Config("bad".into()),
        Error::InvalidConfig {
            field: "focus".into(),
            message: "outside window".into(),
        },
        Error::NumberSetOutOfRange {
            set_number: 8,
            count: 7,
        },
        Error::UnknownNumberSet("[0, 9]".into()),
        Error::WindowOutOfRange { window: 21, max: 20 },
        Error::FrameMismatch {
            expected: 3,
            actual: 4,
        },
        Error::VectSetOutOfRange { id: 12 },
        Error::LockPoisoned("index".into()),
        Error::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "gone")),
    ]
}

#[test]
fn codes_are_unique() {
    let mut codes: Vec<u32> = all_errors().iter().map(Error::code).collect();
    let before = codes.len();
    codes.sort_unstable();
    codes.dedup();
    assert_eq!(codes.len(), before);
}

#[test]
fn code_ranges_match_categories() {
    for err in all_errors() {
        let expected = match err.code() / 10 {
            1 => ErrorCategory::Config,
            2 => ErrorCategory::Catalog,
            3 => ErrorCategory::Training,
            4 => ErrorCategory::Store,
            5 => ErrorCategory::Concurrency,
            6 => ErrorCategory::Io,
            other => panic!("unexpected code range {other}"),
        };
        assert_eq!(err.category(), expected, "{err}");
    }
}

#[test]
fn structured_error_round_trips_through_json() {
    let err = Error::NumberSetOutOfRange {
        set_number: 8,
        count: 7,
    };
    let json = StructuredError::from(&err).to_json();
    let back: StructuredError = serde_json::from_str(&json).expect("parse structured error");
    assert_eq!(back.code, 20);
    assert_eq!(back.category, ErrorCategory::Catalog);
    assert_eq!(back.context.get("count"), Some(&serde_json::json!(7)));
}
