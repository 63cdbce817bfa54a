//! Structured logging for ft-core.
//!
//! Two modes:
//! - human-readable console output for interactive use
//! - JSONL for pipelines and batch jobs
//!
//! ```ignore
//! use ft_core::logging::{init_logging, LogConfig, LogContext, Stage, event_names};
//!
//! init_logging(&LogConfig::from_env(None, None));
//! let ctx = LogContext::new(generate_run_id(), get_host_id()).with_model_id(model.id().to_string());
//! ft_core::log_event!(ctx, INFO, event_names::TRAIN_STARTED, Stage::Train, "training", examples = 10);
//! ```
//!
//! stdout carries command payloads only; every log line goes to stderr.

pub mod config;
pub mod events;
pub mod layer;

pub use config::{LogConfig, LogFormat, LogLevel};
pub use events::{event_names, Level, LogContext, LogEvent, Stage};
pub use layer::JsonlLayer;

use std::io::IsTerminal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Installs the global subscriber. Call once at startup; later calls are
/// ignored.
pub fn init_logging(config: &LogConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "ft_core={level},ft_config={level},train={level},compact={level},prune={level},run={level},config={level},catalog={level},model={level}",
            level = config.level
        ))
    });

    let result = match config.format {
        LogFormat::Human => {
            let use_ansi = std::io::stderr().is_terminal();
            let fmt_layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_ansi(use_ansi);
            if config.timestamps {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt_layer)
                    .try_init()
            } else {
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt_layer.without_time())
                    .try_init()
            }
        }
        LogFormat::Jsonl => tracing_subscriber::registry()
            .with(filter)
            .with(JsonlLayer::stderr())
            .try_init(),
    };
    let _ = result;
}

/// Unique id for this invocation.
pub fn generate_run_id() -> String {
    let uuid = uuid::Uuid::new_v4().simple().to_string();
    format!("run-{}", &uuid[..12])
}

/// Stable host id: machine-id on Linux, hostname hash otherwise.
pub fn get_host_id() -> String {
    if let Ok(id) = std::fs::read_to_string("/etc/machine-id") {
        let id = id.trim();
        if id.len() >= 8 {
            return format!("host-{}", &id[..8]);
        }
    }
    if let Ok(hostname) = std::env::var("HOSTNAME") {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};
        let mut hasher = DefaultHasher::new();
        hostname.hash(&mut hasher);
        return format!("host-{:08x}", hasher.finish() as u32);
    }
    let uuid = uuid::Uuid::new_v4().simple().to_string();
    format!("host-{}", &uuid[..8])
}

/// Emits a tracing event stamped with a [`LogContext`].
///
/// ```ignore
/// log_event!(ctx, INFO, "train.finished", Stage::Train, "done", examples = 10);
/// ```
#[macro_export]
macro_rules! log_event {
    ($ctx:expr, INFO, $event:expr, $stage:expr, $msg:expr $(, $key:ident = $val:expr)*) => {
        tracing::info!(
            target: $event,
            run_id = %$ctx.run_id,
            model_id = $ctx.model_id.as_deref(),
            host_id = %$ctx.host_id,
            stage = %$stage,
            message = $msg,
            $($key = $val,)*
        )
    };
    ($ctx:expr, DEBUG, $event:expr, $stage:expr, $msg:expr $(, $key:ident = $val:expr)*) => {
        tracing::debug!(
            target: $event,
            run_id = %$ctx.run_id,
            model_id = $ctx.model_id.as_deref(),
            host_id = %$ctx.host_id,
            stage = %$stage,
            message = $msg,
            $($key = $val,)*
        )
    };
    ($ctx:expr, WARN, $event:expr, $stage:expr, $msg:expr $(, $key:ident = $val:expr)*) => {
        tracing::warn!(
            target: $event,
            run_id = %$ctx.run_id,
            model_id = $ctx.model_id.as_deref(),
            host_id = %$ctx.host_id,
            stage = %$stage,
            message = $msg,
            $($key = $val,)*
        )
    };
    ($ctx:expr, ERROR, $event:expr, $stage:expr, $msg:expr $(, $key:ident = $val:expr)*) => {
        tracing::error!(
            target: $event,
            run_id = %$ctx.run_id,
            model_id = $ctx.model_id.as_deref(),
            host_id = %$ctx.host_id,
            stage = %$stage,
            message = $msg,
            $($key = $val,)*
        )
    };
}
