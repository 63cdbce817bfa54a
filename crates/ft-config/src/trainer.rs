//! Trainer configuration types.
//!
//! Every field has a default, so `{}` is a complete config.

use ft_combinatorics::NumberSetFamily;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::validate::ValidationError;

/// Complete trainer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TrainerConfig {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,

    /// Positions per frame.
    #[serde(default = "default_window_size")]
    pub window_size: usize,

    /// Offset of the predicted position inside the window.
    #[serde(default = "default_focus")]
    pub focus: usize,

    #[serde(default)]
    pub number_sets: NumberSetConfig,

    /// Count store used for every accumulator in the model.
    #[serde(default)]
    pub accumulator: AccumulatorKind,

    /// Keep the raw per-position values of each full-window context.
    #[serde(default = "default_true")]
    pub save_vect_sets: bool,

    /// Swap context key and value when recording.
    #[serde(default)]
    pub frame_reverse: bool,

    /// Skip number sets whose positions include an empty element.
    #[serde(default = "default_true")]
    pub no_empty_elements: bool,

    /// Apply the empty-element rule to every set except the full window.
    #[serde(default)]
    pub no_empty_except_full: bool,

    /// Value that marks "nothing to learn"; examples whose only value is this are skipped.
    #[serde(default)]
    pub non_value: Option<i64>,

    /// Target values that only train context sets (and totals elsewhere).
    #[serde(default)]
    pub training_filter: Vec<i64>,

    /// Worker threads for batch training.
    #[serde(default = "default_workers")]
    pub workers: usize,
}

/// Which number sets the model tracks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NumberSetConfig {
    #[serde(default)]
    #[schemars(with = "String")]
    pub family: NumberSetFamily,

    /// Additional offset lists appended before the full set.
    #[serde(default)]
    pub extra: Vec<Vec<usize>>,

    /// Positions in the model set list of sets to create turned off.
    #[serde(default)]
    pub turned_off: Vec<usize>,

    /// Dependent tiers per position; 0 disables dependent sets.
    #[serde(default)]
    pub dependent_count: usize,
}

impl Default for NumberSetConfig {
    fn default() -> Self {
        Self {
            family: NumberSetFamily::All,
            extra: Vec::new(),
            turned_off: Vec::new(),
            dependent_count: 0,
        }
    }
}

/// Count store representation for accumulators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum AccumulatorKind {
    /// Two inline slots, for binary-valued contexts.
    TwoSlot,
    /// Small vector scanned linearly.
    #[default]
    Dense,
    /// Hash map keyed by value.
    Hashed,
    /// Hash map with a second per-value count of correct predictions.
    HashedCorrect,
}

impl AccumulatorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AccumulatorKind::TwoSlot => "two-slot",
            AccumulatorKind::Dense => "dense",
            AccumulatorKind::Hashed => "hashed",
            AccumulatorKind::HashedCorrect => "hashed-correct",
        }
    }
}

impl fmt::Display for AccumulatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccumulatorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "two-slot" => Ok(AccumulatorKind::TwoSlot),
            "dense" => Ok(AccumulatorKind::Dense),
            "hashed" => Ok(AccumulatorKind::Hashed),
            "hashed-correct" => Ok(AccumulatorKind::HashedCorrect),
            other => Err(format!("unknown accumulator kind: {other}")),
        }
    }
}

fn default_schema_version() -> String {
    crate::CONFIG_SCHEMA_VERSION.to_string()
}

fn default_window_size() -> usize {
    5
}

fn default_focus() -> usize {
    2
}

fn default_true() -> bool {
    true
}

fn default_workers() -> usize {
    4
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            window_size: default_window_size(),
            focus: default_focus(),
            number_sets: NumberSetConfig::default(),
            accumulator: AccumulatorKind::default(),
            save_vect_sets: default_true(),
            frame_reverse: false,
            no_empty_elements: default_true(),
            no_empty_except_full: false,
            non_value: None,
            training_filter: Vec::new(),
            workers: default_workers(),
        }
    }
}

impl TrainerConfig {
    /// Load a trainer config from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ValidationError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ValidationError::IoError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    /// Parse a trainer config from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ValidationError> {
        serde_json::from_str(json)
            .map_err(|e| ValidationError::ParseError(format!("Invalid JSON: {}", e)))
    }

    /// JSON schema for trainer.json.
    pub fn json_schema() -> serde_json::Value {
        serde_json::to_value(schemars::schema_for!(TrainerConfig)).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_is_default() {
        let cfg = TrainerConfig::from_json("{}").unwrap();
        assert_eq!(cfg, TrainerConfig::default());
        assert_eq!(cfg.window_size, 5);
        assert!(cfg.no_empty_elements);
        assert!(!cfg.no_empty_except_full);
    }

    #[test]
    fn test_partial_override() {
        let cfg = TrainerConfig::from_json(
            r#"{"window_size": 3, "focus": 1, "accumulator": "hashed-correct",
                "number_sets": {"family": "fan", "extra": [[0, 2]]}}"#,
        )
        .unwrap();
        assert_eq!(cfg.window_size, 3);
        assert_eq!(cfg.accumulator, AccumulatorKind::HashedCorrect);
        assert_eq!(cfg.number_sets.family, NumberSetFamily::Fan);
        assert_eq!(cfg.number_sets.extra, vec![vec![0, 2]]);
        assert_eq!(cfg.workers, 4);
    }

    #[test]
    fn test_parse_error() {
        let err = TrainerConfig::from_json("{ window_size: ").unwrap_err();
        assert!(matches!(err, ValidationError::ParseError(_)));
    }

    #[test]
    fn test_accumulator_kind_names() {
        for kind in [
            AccumulatorKind::TwoSlot,
            AccumulatorKind::Dense,
            AccumulatorKind::Hashed,
            AccumulatorKind::HashedCorrect,
        ] {
            assert_eq!(kind.as_str().parse::<AccumulatorKind>(), Ok(kind));
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{kind}\""));
        }
    }

    #[test]
    fn test_schema_names_fields() {
        let schema = TrainerConfig::json_schema().to_string();
        assert!(schema.contains("window_size"));
        assert!(schema.contains("training_filter"));
    }
}
