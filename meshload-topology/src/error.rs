//! Error types for topology loading and validation

use std::path::PathBuf;

use meshload_core::model::ModelError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("Topology file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Topology I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Topology parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("unknown command '{0}' in script")]
    UnknownCommand(String),

    #[error("invalid script step: {0}")]
    InvalidStep(String),

    #[error("invalid size '{0}'")]
    InvalidSize(String),

    #[error("invalid duration '{0}'")]
    InvalidDuration(String),

    #[error("unknown service type '{0}'")]
    InvalidServiceType(String),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("service {0} is declared more than once")]
    DuplicateService(String),

    #[error("service name '{0}' is not a valid DNS label")]
    InvalidServiceName(String),

    #[error("service {0} must have at least one replica")]
    InvalidReplicas(String),

    #[error("service {service} calls {destination}, which is not declared")]
    UnknownDestination {
        service: String,
        destination: String,
    },

    #[error("service {service}: {source}")]
    InService {
        service: String,
        #[source]
        source: Box<TopologyError>,
    },
}

impl TopologyError {
    pub(crate) fn in_service(service: &str, source: TopologyError) -> Self {
        TopologyError::InService {
            service: service.to_string(),
            source: Box::new(source),
        }
    }
}
