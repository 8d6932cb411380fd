//! Location of the topology definition.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate, Clone, PartialEq)]
pub struct TopologyConfig {
    #[serde(default = "default_path")]
    pub path: PathBuf,
}

fn default_path() -> PathBuf {
    PathBuf::from("topology.yaml")
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
        }
    }
}
