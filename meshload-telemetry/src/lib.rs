//! # meshload Telemetry
//!
//! Crate for logging and metrics of the traffic runner.

pub mod logging;
pub mod metrics;

pub use logging::EventLogger;
pub use metrics::MetricsRecorder;
