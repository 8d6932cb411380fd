//! ## meshload-topology::graph
//! **Service graph model and validation**
//!
//! A [`ServiceGraph`] is the full simulated topology: every service, its
//! declared type, and the script it runs per incoming request. The graph also
//! serves as the [`ServiceRegistry`] handed to the interpreter.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use meshload_core::{RequestCommand, Script, ServiceRegistry, ServiceType};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::decode;
use crate::error::TopologyError;

static DNS_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new("^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").expect("DNS label pattern is valid")
});

/// One simulated service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Service {
    pub name: String,
    pub service_type: ServiceType,
    pub num_replicas: u32,
    pub is_entrypoint: bool,
    /// Bytes returned to callers.
    pub response_size: u64,
    pub script: Script,
}

impl Service {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            service_type: ServiceType::Http,
            num_replicas: 1,
            is_entrypoint: false,
            response_size: 0,
            script: Script::default(),
        }
    }

    pub fn with_script(mut self, script: Script) -> Self {
        self.script = script;
        self
    }

    pub fn entrypoint(mut self) -> Self {
        self.is_entrypoint = true;
        self
    }

    pub fn requests(&self) -> Vec<&RequestCommand> {
        self.script.requests()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ServiceGraph {
    pub services: Vec<Service>,
}

impl ServiceGraph {
    pub fn new(services: Vec<Service>) -> Self {
        Self { services }
    }

    /// Parses and validates a YAML topology.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, TopologyError> {
        let graph = decode::decode_graph(yaml)?;
        graph.validate()?;
        Ok(graph)
    }

    /// Loads and validates a YAML topology file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, TopologyError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(TopologyError::FileNotFound(PathBuf::from(path)));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn service(&self, name: &str) -> Option<&Service> {
        self.services.iter().find(|s| s.name == name)
    }

    pub fn entrypoints(&self) -> impl Iterator<Item = &Service> {
        self.services.iter().filter(|s| s.is_entrypoint)
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Checks names, replica counts and that every call targets a declared
    /// service.
    pub fn validate(&self) -> Result<(), TopologyError> {
        let mut names = HashSet::with_capacity(self.services.len());
        for service in &self.services {
            if service.name.len() > 63 || !DNS_LABEL.is_match(&service.name) {
                return Err(TopologyError::InvalidServiceName(service.name.clone()));
            }
            if !names.insert(service.name.as_str()) {
                return Err(TopologyError::DuplicateService(service.name.clone()));
            }
            if service.num_replicas == 0 {
                return Err(TopologyError::InvalidReplicas(service.name.clone()));
            }
        }

        for service in &self.services {
            if let Some(request) = service
                .requests()
                .into_iter()
                .find(|r| !names.contains(r.destination.as_str()))
            {
                return Err(TopologyError::UnknownDestination {
                    service: service.name.clone(),
                    destination: request.destination.clone(),
                });
            }
        }
        Ok(())
    }
}

impl ServiceRegistry for ServiceGraph {
    fn contains(&self, name: &str) -> bool {
        self.service(name).is_some()
    }
}
