//! Recording fakes for the transport and metrics contracts.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::headers::HeaderSet;
use crate::metrics::MetricsSink;
use crate::transport::{Transport, TransportError, TransportResponse, STATUS_OK};

/// One call observed by [`RecordingTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub destination: String,
    pub size: u64,
    pub headers: HeaderSet,
}

/// Transport that answers from a table and remembers every call.
///
/// Destinations without an entry answer `200`.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    calls: Mutex<Vec<RecordedCall>>,
    statuses: HashMap<String, u16>,
    failing: HashSet<String>,
    panicking: HashSet<String>,
    failing_drain: HashSet<String>,
    drained: Arc<AtomicUsize>,
}

impl RecordingTransport {
    pub fn respond_with(mut self, destination: &str, status: u16) -> Self {
        self.statuses.insert(destination.to_string(), status);
        self
    }

    /// Calls to `destination` fail at the transport level.
    pub fn fail_with(mut self, destination: &str) -> Self {
        self.failing.insert(destination.to_string());
        self
    }

    /// Calls to `destination` panic.
    pub fn panic_on(mut self, destination: &str) -> Self {
        self.panicking.insert(destination.to_string());
        self
    }

    /// Responses from `destination` fail while their body is drained.
    pub fn fail_drain_on(mut self, destination: &str) -> Self {
        self.failing_drain.insert(destination.to_string());
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Number of responses whose body was drained.
    pub fn drained_count(&self) -> usize {
        self.drained.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(
        &self,
        destination: &str,
        size: u64,
        headers: &HeaderSet,
    ) -> Result<Box<dyn TransportResponse>, TransportError> {
        if self.panicking.contains(destination) {
            panic!("branch exploded on {destination}");
        }
        self.calls.lock().push(RecordedCall {
            destination: destination.to_string(),
            size,
            headers: headers.clone(),
        });
        tokio::task::yield_now().await;

        if self.failing.contains(destination) {
            return Err(TransportError::Request(
                format!("connection refused by {destination}").into(),
            ));
        }
        let status = self.statuses.get(destination).copied().unwrap_or(STATUS_OK);
        Ok(Box::new(RecordedResponse {
            status,
            body_len: size,
            drain_fails: self.failing_drain.contains(destination),
            drained: Arc::clone(&self.drained),
        }))
    }
}

struct RecordedResponse {
    status: u16,
    body_len: u64,
    drain_fails: bool,
    drained: Arc<AtomicUsize>,
}

#[async_trait]
impl TransportResponse for RecordedResponse {
    fn status(&self) -> u16 {
        self.status
    }

    async fn drain(self: Box<Self>) -> Result<u64, TransportError> {
        self.drained.fetch_add(1, Ordering::SeqCst);
        if self.drain_fails {
            return Err(TransportError::Body("connection reset mid-body".into()));
        }
        Ok(self.body_len)
    }
}

/// Metrics sink that keeps every notification.
#[derive(Debug, Default)]
pub struct RecordingMetrics {
    records: Mutex<Vec<(String, u64)>>,
}

impl RecordingMetrics {
    pub fn records(&self) -> Vec<(String, u64)> {
        self.records.lock().clone()
    }
}

impl MetricsSink for RecordingMetrics {
    fn record_request_sent(&self, destination: &str, size: u64) {
        self.records.lock().push((destination.to_string(), size));
    }
}
