//! ## meshload-telemetry::metrics
//! **Prometheus sink for outbound traffic**
//!
//! Counts every dispatched request and its size per destination, the outcome
//! of every invocation, and the requests a served service answered. Metrics
//! live in a private registry so that several recorders (one per test, say)
//! never collide.

use std::time::Duration;

use meshload_core::MetricsSink;
use prometheus::{Histogram, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry};

const SIZE_BUCKETS: [f64; 9] = [
    64.0,
    256.0,
    1_024.0,
    4_096.0,
    16_384.0,
    65_536.0,
    262_144.0,
    1_048_576.0,
    4_194_304.0,
];

#[derive(Debug, Clone)]
pub struct MetricsRecorder {
    pub registry: Registry,
    pub outgoing_requests: IntCounterVec,
    pub outgoing_request_size: HistogramVec,
    pub invocations: IntCounterVec,
    pub incoming_requests: IntCounterVec,
    pub response_duration: Histogram,
}

impl MetricsRecorder {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let outgoing_requests = IntCounterVec::new(
            Opts::new(
                "meshload_outgoing_requests_total",
                "Requests dispatched to other services",
            ),
            &["destination_service"],
        )?;
        let outgoing_request_size = HistogramVec::new(
            HistogramOpts::new(
                "meshload_outgoing_request_size_bytes",
                "Payload size of requests dispatched to other services",
            )
            .buckets(SIZE_BUCKETS.to_vec()),
            &["destination_service"],
        )?;
        let invocations = IntCounterVec::new(
            Opts::new("meshload_invocations_total", "Script invocations by outcome"),
            &["outcome"],
        )?;

        let incoming_requests = IntCounterVec::new(
            Opts::new(
                "meshload_incoming_requests_total",
                "Requests answered by the served service, by status code",
            ),
            &["status"],
        )?;
        let response_duration = Histogram::with_opts(HistogramOpts::new(
            "meshload_response_duration_seconds",
            "Time from receiving a request to answering it",
        ))?;

        registry.register(Box::new(outgoing_requests.clone()))?;
        registry.register(Box::new(outgoing_request_size.clone()))?;
        registry.register(Box::new(invocations.clone()))?;
        registry.register(Box::new(incoming_requests.clone()))?;
        registry.register(Box::new(response_duration.clone()))?;

        Ok(Self {
            registry,
            outgoing_requests,
            outgoing_request_size,
            invocations,
            incoming_requests,
            response_duration,
        })
    }

    /// Counts one answered request.
    pub fn record_incoming(&self, status: u16, elapsed: Duration) {
        self.incoming_requests
            .with_label_values(&[&status.to_string()])
            .inc();
        self.response_duration.observe(elapsed.as_secs_f64());
    }

    pub fn record_invocation(&self, success: bool) {
        let outcome = if success { "success" } else { "failure" };
        self.invocations.with_label_values(&[outcome]).inc();
    }

    /// Renders every metric in the Prometheus text format.
    pub fn gather_metrics(&self) -> Result<String, prometheus::Error> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::<u8>::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl MetricsSink for MetricsRecorder {
    fn record_request_sent(&self, destination: &str, size: u64) {
        self.outgoing_requests
            .with_label_values(&[destination])
            .inc();
        self.outgoing_request_size
            .with_label_values(&[destination])
            .observe(size as f64);
    }
}
