/// Receives a notification for every request that was dispatched.
///
/// Implementations must not block and have no way to fail the caller.
pub trait MetricsSink: Send + Sync {
    fn record_request_sent(&self, destination: &str, size: u64);
}

/// Discards every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    #[inline]
    fn record_request_sent(&self, _destination: &str, _size: u64) {}
}
