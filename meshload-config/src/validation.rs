//! Custom validation functions shared by the configuration sections.

use once_cell::sync::Lazy;
use regex::Regex;
use validator::ValidationError;

static SCHEME: Lazy<Regex> = Lazy::new(|| Regex::new("^https?$").expect("scheme pattern is valid"));

/// Validate that the transport scheme is one the HTTP adapter speaks.
pub fn validate_scheme(scheme: &str) -> Result<(), ValidationError> {
    if SCHEME.is_match(scheme) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_scheme"))
    }
}

/// Validate a `tracing` level name.
pub fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid = ["trace", "debug", "info", "warn", "error"].contains(&level.to_lowercase().as_str());
    if valid {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_log_level"))
    }
}

/// Validate that an optional service name is not blank.
pub fn validate_service_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        Err(ValidationError::new("blank_service_name"))
    } else {
        Ok(())
    }
}
