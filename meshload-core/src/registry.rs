//! Read-only lookup of the services a request may target.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

/// Protocol a simulated service speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ServiceType {
    #[default]
    Http,
    Grpc,
}

impl ServiceType {
    pub fn as_str(self) -> &'static str {
        match self {
            ServiceType::Http => "http",
            ServiceType::Grpc => "grpc",
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Ok(ServiceType::Http),
            "grpc" => Ok(ServiceType::Grpc),
            other => Err(format!("unknown service type '{other}'")),
        }
    }
}

/// Membership-only view of the known services.
///
/// Implementations are shared across every concurrent branch of an
/// invocation and must not change while one is running.
pub trait ServiceRegistry: Send + Sync {
    fn contains(&self, name: &str) -> bool;
}

impl ServiceRegistry for HashSet<String> {
    fn contains(&self, name: &str) -> bool {
        HashSet::contains(self, name)
    }
}

impl ServiceRegistry for BTreeSet<String> {
    fn contains(&self, name: &str) -> bool {
        BTreeSet::contains(self, name)
    }
}

impl<V: Send + Sync> ServiceRegistry for HashMap<String, V> {
    fn contains(&self, name: &str) -> bool {
        self.contains_key(name)
    }
}

impl<V: Send + Sync> ServiceRegistry for BTreeMap<String, V> {
    fn contains(&self, name: &str) -> bool {
        self.contains_key(name)
    }
}
