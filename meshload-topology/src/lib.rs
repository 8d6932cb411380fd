//! # meshload-topology
//!
//! Simulated service topologies: the YAML format operators write, the
//! validated [`ServiceGraph`] the interpreter reads, and a Graphviz export.

mod decode;
pub mod dot;
mod error;
pub mod graph;
pub mod units;

pub use dot::to_dot;
pub use error::TopologyError;
pub use graph::{Service, ServiceGraph};
