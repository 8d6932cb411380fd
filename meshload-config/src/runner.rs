//! Traffic runner configuration.
//!
//! Controls how often and how widely the selected service's script is
//! invoked.

use serde::{Deserialize, Serialize};
use validator::{self, Validate};

use crate::validation;

#[derive(Debug, Serialize, Deserialize, Validate, Clone, PartialEq)]
pub struct RunnerConfig {
    /// Service whose script is executed. Defaults to the first entrypoint.
    #[serde(default)]
    #[validate(custom(function = validation::validate_service_name))]
    pub service: Option<String>,

    /// Total number of invocations.
    #[serde(default = "default_invocations")]
    #[validate(range(min = 1))]
    pub invocations: u64,

    /// Maximum invocations in flight at once.
    #[serde(default = "default_parallelism")]
    #[validate(range(min = 1, max = 65536))]
    pub parallelism: usize,

    /// Delay between two invocation starts, in milliseconds. `0` starts them
    /// as fast as `parallelism` allows.
    #[serde(default)]
    pub interval_ms: u64,

    /// Seed of the request sampler. Unset means a fresh seed per run.
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_invocations() -> u64 {
    100
}

fn default_parallelism() -> usize {
    num_cpus::get()
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            service: None,
            invocations: default_invocations(),
            parallelism: default_parallelism(),
            interval_ms: 0,
            seed: None,
        }
    }
}
