//! # meshload configuration
//!
//! Layered runtime configuration for the traffic runner.
//!
//! ## Layers
//! 1. Built-in defaults
//! 2. `config/meshload.yaml`, when present
//! 3. `config/<MESHLOAD_ENV>.yaml`, when present (`production` by default)
//! 4. `MESHLOAD_*` environment variables, `__` separating sections
//!    (`MESHLOAD_RUNNER__INVOCATIONS=500`)

#![warn(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

mod error;
mod runner;
mod telemetry;
mod topology;
mod transport;
mod validation;

pub use error::ConfigError;
pub use runner::RunnerConfig;
pub use telemetry::TelemetryConfig;
pub use topology::TopologyConfig;
pub use transport::TransportConfig;

const BASE_FILE: &str = "config/meshload.yaml";
const ENV_PREFIX: &str = "MESHLOAD_";

/// Top-level configuration container.
#[derive(Debug, Serialize, Deserialize, Validate, Default, Clone, PartialEq)]
pub struct MeshloadConfig {
    #[serde(default)]
    #[validate(nested)]
    pub topology: TopologyConfig,

    #[serde(default)]
    #[validate(nested)]
    pub runner: RunnerConfig,

    #[serde(default)]
    #[validate(nested)]
    pub transport: TransportConfig,

    #[serde(default)]
    #[validate(nested)]
    pub telemetry: TelemetryConfig,
}

impl MeshloadConfig {
    /// Load configuration from the default files and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(MeshloadConfig::default()));

        if Path::new(BASE_FILE).exists() {
            figment = figment.merge(Yaml::file(BASE_FILE));
        }

        let env = std::env::var("MESHLOAD_ENV").unwrap_or_else(|_| "production".into());
        let env_file = format!("config/{}.yaml", env);
        if Path::new(&env_file).exists() {
            figment = figment.merge(Yaml::file(env_file));
        }

        Self::finish(figment)
    }

    /// Load configuration from a specific file, still honouring the
    /// environment overrides.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(PathBuf::from(path)));
        }

        let figment = Figment::from(Serialized::defaults(MeshloadConfig::default()))
            .merge(Yaml::file(path));
        Self::finish(figment)
    }

    /// Re-checks every constraint, e.g. after command-line overrides.
    pub fn ensure_valid(&self) -> Result<(), ConfigError> {
        self.validate()?;
        Ok(())
    }

    fn finish(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment
            .merge(Env::prefixed(ENV_PREFIX).ignore(&["env"]).split("__"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }
}
