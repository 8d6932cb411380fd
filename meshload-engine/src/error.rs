use thiserror::Error;
use tokio::task::JoinError;

use meshload_config::ConfigError;
use meshload_core::TransportError;
use meshload_topology::TopologyError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("service {0} is not part of the topology")]
    UnknownService(String),

    #[error("no service was selected and the topology declares no entrypoint")]
    NoEntrypoint,

    #[error("serving requires a service name")]
    ServiceRequired,

    #[error("response size {0} does not fit in memory")]
    ResponseTooLarge(u64),

    #[error("Server I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Topology error: {0}")]
    Topology(#[from] TopologyError),

    #[error("Transport setup error: {0}")]
    Transport(#[from] TransportError),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("Invocation task failed: {0}")]
    Task(String),
}

impl From<JoinError> for EngineError {
    fn from(err: JoinError) -> Self {
        EngineError::Task(err.to_string())
    }
}
