//! Structured event schema.
//!
//! Every event carries the run id, the model being trained and the stage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<tracing::Level> for Level {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => Level::Trace,
            tracing::Level::DEBUG => Level::Debug,
            tracing::Level::INFO => Level::Info,
            tracing::Level::WARN => Level::Warn,
            tracing::Level::ERROR => Level::Error,
        }
    }
}

/// Phases of a training run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Startup and configuration.
    Init,
    /// Number set catalog generation.
    Catalog,
    /// Counting examples into accumulators.
    Train,
    /// Vector set store compaction and pruning.
    Compact,
    /// Reading distributions back out.
    Query,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Init => "init",
            Stage::Catalog => "catalog",
            Stage::Train => "train",
            Stage::Compact => "compact",
            Stage::Query => "query",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable event names, used as the tracing target.
pub mod event_names {
    pub const RUN_STARTED: &str = "run.started";
    pub const RUN_FINISHED: &str = "run.finished";

    pub const CONFIG_LOADED: &str = "config.loaded";
    pub const CONFIG_DEFAULT_USED: &str = "config.default_used";
    pub const CONFIG_ERROR: &str = "config.error";

    pub const CATALOG_BUILT: &str = "catalog.built";
    pub const MODEL_BUILT: &str = "model.built";

    pub const TRAIN_STARTED: &str = "train.started";
    pub const TRAIN_LOCKED: &str = "train.locked";
    pub const TRAIN_FINISHED: &str = "train.finished";

    pub const COMPACT_FINISHED: &str = "compact.finished";
    pub const PRUNE_FINISHED: &str = "prune.finished";

    pub const INTERNAL_ERROR: &str = "internal_error";
}

/// One JSONL log line.
///
/// Correlation ids come from the event itself or, failing that, from the
/// innermost enclosing span that set them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    pub ts: DateTime<Utc>,
    pub level: Level,
    /// Event name, e.g. `train.finished`.
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Number set the event concerns, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_number: Option<u64>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl LogEvent {
    pub fn new(level: Level, event: impl Into<String>) -> Self {
        LogEvent {
            ts: Utc::now(),
            level,
            event: event.into(),
            run_id: None,
            model_id: None,
            host_id: None,
            stage: None,
            message: None,
            set_number: None,
            fields: serde_json::Map::new(),
        }
    }

    /// Serialize to a single JSON line.
    pub fn to_jsonl(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(
                r#"{{"error":"serialization_failed","event":"{}"}}"#,
                self.event
            )
        })
    }
}

/// Correlation ids shared by every event of one run.
#[derive(Debug, Clone)]
pub struct LogContext {
    pub run_id: String,
    pub model_id: Option<String>,
    pub host_id: String,
}

impl LogContext {
    pub fn new(run_id: impl Into<String>, host_id: impl Into<String>) -> Self {
        LogContext {
            run_id: run_id.into(),
            model_id: None,
            host_id: host_id.into(),
        }
    }

    pub fn with_model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = Some(model_id.into());
        self
    }
}
