//! # meshload-engine
//!
//! Ties configuration, topology, transport and telemetry together and drives
//! the interpreter for one simulated service, either as a load runner
//! ([`run_traffic_mode`]) or as an HTTP service ([`run_service_mode`]).

mod error;
mod report;
pub mod runtime;
pub mod server;

pub use error::EngineError;
pub use report::RunReport;
pub use runtime::{run_traffic_mode, RunnerSettings, TrafficRun, TrafficRuntime};
pub use server::{run_service_mode, service_router, ServiceState};
