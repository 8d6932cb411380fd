//! Graphviz rendering of a service graph.
//!
//! One box per service and one edge per call. Edge labels carry the step
//! path inside the caller's script (`3.2` is the second member of the third
//! step) and the request size.

use std::fmt::Write;

use meshload_core::Command;

use crate::graph::{Service, ServiceGraph};
use crate::units::format_size;

pub fn to_dot(graph: &ServiceGraph) -> String {
    let mut out = String::new();
    out.push_str("digraph \"service-graph\" {\n");
    out.push_str("  node [shape=box fontsize=10 fontname=\"Helvetica\"];\n");
    out.push_str("  edge [fontsize=9];\n");

    for service in &graph.services {
        let _ = writeln!(
            out,
            "  {} [label=\"{}\"{}];",
            quote(&service.name),
            node_label(service),
            if service.is_entrypoint {
                " penwidth=2"
            } else {
                ""
            }
        );
    }

    for service in &graph.services {
        for (index, command) in service.script.iter().enumerate() {
            write_edges(&mut out, &service.name, command, &(index + 1).to_string());
        }
    }

    out.push_str("}\n");
    out
}

fn node_label(service: &Service) -> String {
    let mut label = format!(
        "{}\\n{} x{}\\nresponse: {}",
        escape(&service.name),
        service.service_type,
        service.num_replicas,
        format_size(service.response_size)
    );
    if service.is_entrypoint {
        label.push_str("\\nentrypoint");
    }
    label
}

fn write_edges(out: &mut String, caller: &str, command: &Command, path: &str) {
    match command {
        Command::Sleep(_) => {}
        Command::Request(request) => {
            let mut label = format!("{}: {}", path, format_size(request.size));
            if !request.probability.is_always() {
                let _ = write!(label, " ({})", request.probability);
            }
            let _ = writeln!(
                out,
                "  {} -> {} [label=\"{}\"];",
                quote(caller),
                quote(&request.destination),
                escape(&label)
            );
        }
        Command::Concurrent(group) => {
            for (index, member) in group.commands().iter().enumerate() {
                write_edges(out, caller, member, &format!("{}.{}", path, index + 1));
            }
        }
    }
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

fn quote(text: &str) -> String {
    format!("\"{}\"", escape(text))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use meshload_core::{Probability, Script};

    #[test]
    fn renders_nodes_and_numbered_edges() {
        let graph = ServiceGraph::new(vec![
            Service::new("a").entrypoint().with_script(Script::new(vec![
                Command::sleep(Duration::from_millis(1)),
                Command::request("b", 1_024, Probability::ALWAYS),
                Command::concurrent([
                    Command::request("b", 10, Probability::ALWAYS),
                    Command::request("c", 10, Probability::new(50).unwrap()),
                ]),
            ])),
            Service::new("b"),
            Service::new("c"),
        ]);

        let dot = to_dot(&graph);
        assert!(dot.starts_with("digraph"));
        assert!(dot.contains("\"a\" [label=\"a\\nhttp x1\\nresponse: 0 B\\nentrypoint\" penwidth=2];"));
        assert!(dot.contains("\"a\" -> \"b\" [label=\"2: 1 KiB\"];"));
        assert!(dot.contains("\"a\" -> \"b\" [label=\"3.1: 10 B\"];"));
        assert!(dot.contains("\"a\" -> \"c\" [label=\"3.2: 10 B (50%)\"];"));
        assert!(dot.trim_end().ends_with('}'));
    }
}
