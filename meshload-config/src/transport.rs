//! Outbound HTTP parameters.

use serde::{Deserialize, Serialize};
use validator::{self, Validate};

use crate::validation;

#[derive(Debug, Serialize, Deserialize, Validate, Clone, PartialEq)]
pub struct TransportConfig {
    /// `http` or `https`.
    #[serde(default = "default_scheme")]
    #[validate(custom(function = validation::validate_scheme))]
    pub scheme: String,

    /// Port every simulated service listens on.
    #[serde(default = "default_port")]
    #[validate(range(min = 1))]
    pub port: u16,

    /// Per-call timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    #[validate(range(min = 1, max = 600000))]
    pub timeout_ms: u64,
}

fn default_scheme() -> String {
    "http".into()
}

fn default_port() -> u16 {
    8080
}

fn default_timeout_ms() -> u64 {
    15_000
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            scheme: default_scheme(),
            port: default_port(),
            timeout_ms: default_timeout_ms(),
        }
    }
}
