//! # meshload-core
//!
//! Execution engine of a simulated service: interprets a script of sleeps,
//! downstream requests and concurrent fan-outs, and aggregates the failures
//! of parallel branches.
//!
//! ### Key Submodules:
//! - `model`: the command tree (`Sleep`, `Request`, `Concurrent`) and `Script`
//! - `executor`: the interpreter
//! - `sampling`: per-executor random source deciding which requests are skipped
//! - `transport`, `metrics`, `registry`: contracts of the collaborators
//!
//! ### Future:
//! - Per-request response size hints forwarded to the transport

pub mod error;
pub mod executor;
pub mod headers;
pub mod metrics;
pub mod model;
pub mod registry;
pub mod sampling;
pub mod transport;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub mod prelude {
    pub use crate::error::*;
    pub use crate::executor::*;
    pub use crate::headers::*;
    pub use crate::metrics::*;
    pub use crate::model::*;
    pub use crate::registry::*;
    pub use crate::sampling::*;
    pub use crate::transport::*;
}

pub use error::ExecutionError;
pub use executor::{Executor, SharedRegistry};
pub use headers::HeaderSet;
pub use metrics::{MetricsSink, NoopMetrics};
pub use model::{Command, ConcurrentCommand, Probability, RequestCommand, Script, SleepCommand};
pub use registry::{ServiceRegistry, ServiceType};
pub use sampling::RequestSampler;
pub use transport::{Transport, TransportError, TransportResponse};
