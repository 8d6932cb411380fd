//! ## meshload-telemetry::logging
//! **Structured logging with tracing**
//!
//! `RUST_LOG` wins when set; otherwise the configured level applies.

use opentelemetry::KeyValue;
use tracing::field::{display, Empty};
use tracing::info_span;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, EnvFilter};

/// Metadata keys recorded as span fields of a traffic event. Any other key
/// is folded into the event's `extra` field.
pub const EVENT_FIELDS: [&str; 7] = [
    "service",
    "destination",
    "sequence",
    "request_id",
    "failures",
    "status",
    "error",
];

#[derive(Clone)]
pub struct EventLogger;

impl EventLogger {
    /// Installs the global subscriber. Later calls are ignored.
    pub fn init(default_level: &str) {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(default_level))
            .unwrap_or_else(|_| EnvFilter::new("info"));

        let _ = fmt()
            .with_env_filter(filter)
            .with_thread_names(true)
            .with_span_events(FmtSpan::CLOSE)
            .try_init();
    }

    /// Emits one traffic event inside a `traffic_event` span carrying the
    /// metadata as fields.
    pub fn log_event(event_type: &str, metadata: Vec<KeyValue>) {
        let span = info_span!(
            "traffic_event",
            event_type,
            otel.kind = "INTERNAL",
            service = Empty,
            destination = Empty,
            sequence = Empty,
            request_id = Empty,
            failures = Empty,
            status = Empty,
            error = Empty,
        );

        let mut extra = Vec::new();
        for attribute in &metadata {
            let key = attribute.key.as_str();
            if EVENT_FIELDS.contains(&key) {
                span.record(key, display(&attribute.value));
            } else {
                extra.push(format!("{key}={}", attribute.value));
            }
        }

        span.in_scope(|| {
            if extra.is_empty() {
                tracing::info!("Traffic event recorded");
            } else {
                tracing::info!(extra = %extra.join(" "), "Traffic event recorded");
            }
        });
    }
}
