//! JSONL tracing layer.
//!
//! Writes one [`LogEvent`] per tracing event to stderr; stdout stays
//! reserved for command output.

use std::io::{self, Write};
use std::sync::Mutex;

use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

use super::events::{Level, LogEvent};

/// Correlation fields, recorded on spans and lifted out of events.
#[derive(Debug, Clone, Default)]
struct SpanContext {
    run_id: Option<String>,
    model_id: Option<String>,
    host_id: Option<String>,
    stage: Option<String>,
    set_number: Option<u64>,
}

impl SpanContext {
    /// Fills unset fields from an outer span.
    fn inherit(&mut self, outer: &SpanContext) {
        if self.run_id.is_none() {
            self.run_id.clone_from(&outer.run_id);
        }
        if self.model_id.is_none() {
            self.model_id.clone_from(&outer.model_id);
        }
        if self.host_id.is_none() {
            self.host_id.clone_from(&outer.host_id);
        }
        if self.stage.is_none() {
            self.stage.clone_from(&outer.stage);
        }
        if self.set_number.is_none() {
            self.set_number = outer.set_number;
        }
    }

    /// Takes a string field if it is a correlation id.
    fn record_str(&mut self, name: &str, value: &str) -> bool {
        let slot = match name {
            "run_id" => &mut self.run_id,
            "model_id" => &mut self.model_id,
            "host_id" => &mut self.host_id,
            "stage" => &mut self.stage,
            _ => return false,
        };
        *slot = Some(value.to_string());
        true
    }

    fn record_set_number(&mut self, name: &str, value: u64) -> bool {
        if name != "set_number" {
            return false;
        }
        self.set_number = Some(value);
        true
    }

    fn into_event(self, level: Level, target: &str) -> LogEvent {
        let mut event = LogEvent::new(level, target);
        event.run_id = self.run_id;
        event.model_id = self.model_id;
        event.host_id = self.host_id;
        event.stage = self.stage;
        event.set_number = self.set_number;
        event
    }
}

#[derive(Default)]
struct EventVisitor {
    context: SpanContext,
    fields: serde_json::Map<String, serde_json::Value>,
    message: Option<String>,
}

impl Visit for EventVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else if !self.context.record_str(field.name(), value) {
            self.fields
                .insert(field.name().to_string(), serde_json::json!(value));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.record_str(field, &format!("{:?}", value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        if value >= 0 && self.context.record_set_number(field.name(), value as u64) {
            return;
        }
        self.fields
            .insert(field.name().to_string(), serde_json::json!(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        if !self.context.record_set_number(field.name(), value) {
            self.fields
                .insert(field.name().to_string(), serde_json::json!(value));
        }
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        if let Some(n) = serde_json::Number::from_f64(value) {
            self.fields
                .insert(field.name().to_string(), serde_json::Value::Number(n));
        }
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields
            .insert(field.name().to_string(), serde_json::Value::Bool(value));
    }
}

struct SpanContextVisitor {
    context: SpanContext,
}

impl Visit for SpanContextVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.context.record_str(field.name(), value);
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.record_str(field, &format!("{:?}", value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.context.record_set_number(field.name(), value);
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        if value >= 0 {
            self.context.record_set_number(field.name(), value as u64);
        }
    }
}

/// JSONL tracing layer.
pub struct JsonlLayer<W = io::Stderr> {
    writer: Mutex<W>,
}

impl JsonlLayer<io::Stderr> {
    pub fn stderr() -> Self {
        JsonlLayer {
            writer: Mutex::new(io::stderr()),
        }
    }
}

impl<W: Write> JsonlLayer<W> {
    pub fn new(writer: W) -> Self {
        JsonlLayer {
            writer: Mutex::new(writer),
        }
    }
}

impl<S, W> Layer<S> for JsonlLayer<W>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: Write + 'static,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let mut visitor = SpanContextVisitor {
            context: SpanContext::default(),
        };
        attrs.record(&mut visitor);
        if let Some(span) = ctx.span(id) {
            span.extensions_mut().insert(visitor.context);
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);

        // fields on the event win over the innermost span, then outer spans
        if let Some(scope) = ctx.event_scope(event) {
            for span in scope {
                if let Some(outer) = span.extensions().get::<SpanContext>() {
                    visitor.context.inherit(outer);
                }
            }
        }

        let metadata = event.metadata();
        let mut line = visitor
            .context
            .into_event((*metadata.level()).into(), metadata.target());
        line.message = visitor.message;
        line.fields = visitor.fields;

        if let Ok(mut writer) = self.writer.lock() {
            let _ = writeln!(writer, "{}", line.to_jsonl());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tracing_subscriber::layer::SubscriberExt;

    struct BufWriter(Arc<Mutex<Vec<u8>>>);

    impl Write for BufWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn capture(f: impl FnOnce()) -> serde_json::Value {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let layer = JsonlLayer::new(BufWriter(buffer.clone()));
        let subscriber = tracing_subscriber::registry().with(layer);
        tracing::subscriber::with_default(subscriber, f);
        let output = buffer.lock().unwrap();
        let line = String::from_utf8_lossy(&output);
        serde_json::from_str(line.trim()).unwrap()
    }

    #[test]
    fn test_event_fields() {
        let parsed = capture(|| {
            tracing::info!(target: "train.finished", examples = 42u64, ok = true, message = "done");
        });
        assert_eq!(parsed["level"], "info");
        assert_eq!(parsed["event"], "train.finished");
        assert_eq!(parsed["message"], "done");
        assert_eq!(parsed["fields"]["examples"], 42);
        assert_eq!(parsed["fields"]["ok"], true);
        assert!(parsed["ts"].is_string());
    }

    #[test]
    fn test_span_context_is_attached() {
        let parsed = capture(|| {
            let run = tracing::info_span!("run", run_id = "run-1", model_id = "ft-m", stage = "train");
            let _r = run.enter();
            let set = tracing::debug_span!("set", set_number = 7u64);
            let _s = set.enter();
            tracing::warn!(target: "compact.finished", message = "inner");
        });
        assert_eq!(parsed["run_id"], "run-1");
        assert_eq!(parsed["model_id"], "ft-m");
        assert_eq!(parsed["stage"], "train");
        assert_eq!(parsed["set_number"], 7);
        assert_eq!(parsed["level"], "warn");
    }

    #[test]
    fn test_event_correlation_ids_are_top_level() {
        let parsed = capture(|| {
            let ctx = crate::logging::LogContext::new("run-7", "host-7").with_model_id("ft-7");
            crate::log_event!(
                ctx,
                INFO,
                crate::logging::event_names::TRAIN_FINISHED,
                crate::logging::Stage::Train,
                "done",
                trained = 5u64
            );
        });
        assert_eq!(parsed["run_id"], "run-7");
        assert_eq!(parsed["model_id"], "ft-7");
        assert_eq!(parsed["host_id"], "host-7");
        assert_eq!(parsed["stage"], "train");
        assert_eq!(parsed["fields"]["trained"], 5);
        assert!(parsed["fields"].get("run_id").is_none());

        let back: LogEvent = serde_json::from_value(parsed).unwrap();
        assert_eq!(back.event, "train.finished");
        assert_eq!(back.message.as_deref(), Some("done"));
    }

    #[test]
    fn test_inner_span_wins() {
        let mut inner = SpanContext {
            stage: Some("compact".to_string()),
            ..Default::default()
        };
        let outer = SpanContext {
            stage: Some("train".to_string()),
            run_id: Some("run-9".to_string()),
            ..Default::default()
        };
        inner.inherit(&outer);
        assert_eq!(inner.stage.as_deref(), Some("compact"));
        assert_eq!(inner.run_id.as_deref(), Some("run-9"));
    }
}
