//! YAML decoding of topologies.
//!
//! ```yaml
//! defaults:
//!   type: http
//!   requestSize: 1 KB
//!   responseSize: 1 KB
//!   numReplicas: 1
//! services:
//! - name: a
//!   isEntrypoint: true
//!   script:
//!   - sleep: 10ms
//!   - call: b
//!   - call: {service: c, size: 10KB, probability: 50}
//!   - - call: b        # a nested list runs concurrently
//!     - call: c
//! ```

use std::collections::BTreeMap;

use meshload_core::{Command, Probability, RequestCommand, Script, ServiceType};
use serde::Deserialize;
use serde_yaml::Value;

use crate::error::TopologyError;
use crate::graph::{Service, ServiceGraph};
use crate::units;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawGraph {
    #[serde(default)]
    defaults: RawDefaults,
    #[serde(default)]
    services: Vec<RawService>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawDefaults {
    #[serde(rename = "type")]
    service_type: Option<String>,
    request_size: Option<RawSize>,
    response_size: Option<RawSize>,
    num_replicas: Option<u32>,
    script: Option<Vec<RawStep>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawService {
    name: String,
    #[serde(rename = "type")]
    service_type: Option<String>,
    #[serde(default)]
    is_entrypoint: bool,
    num_replicas: Option<u32>,
    request_size: Option<RawSize>,
    response_size: Option<RawSize>,
    script: Option<Vec<RawStep>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawSize {
    Bytes(u64),
    Text(String),
}

impl RawSize {
    fn bytes(&self) -> Result<u64, TopologyError> {
        match self {
            RawSize::Bytes(bytes) => Ok(*bytes),
            RawSize::Text(text) => units::parse_size(text),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawStep {
    Concurrent(Vec<RawStep>),
    Single(BTreeMap<String, Value>),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCall {
    service: String,
    size: Option<RawSize>,
    probability: Option<u32>,
}

pub(crate) fn decode_graph(yaml: &str) -> Result<ServiceGraph, TopologyError> {
    let raw: RawGraph = serde_yaml::from_str(yaml)?;
    let defaults = &raw.defaults;

    let default_type = match &defaults.service_type {
        Some(name) => parse_service_type(name)?,
        None => ServiceType::default(),
    };
    let default_request_size = optional_size(&defaults.request_size)?.unwrap_or(0);
    let default_response_size = optional_size(&defaults.response_size)?.unwrap_or(0);

    let services = raw
        .services
        .iter()
        .map(|service| {
            decode_service(
                service,
                defaults,
                default_type,
                default_request_size,
                default_response_size,
            )
            .map_err(|e| TopologyError::in_service(&service.name, e))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ServiceGraph::new(services))
}

fn decode_service(
    raw: &RawService,
    defaults: &RawDefaults,
    default_type: ServiceType,
    default_request_size: u64,
    default_response_size: u64,
) -> Result<Service, TopologyError> {
    let service_type = match &raw.service_type {
        Some(name) => parse_service_type(name)?,
        None => default_type,
    };
    let request_size = optional_size(&raw.request_size)?.unwrap_or(default_request_size);
    let steps = raw
        .script
        .as_deref()
        .or(defaults.script.as_deref())
        .unwrap_or_default();

    Ok(Service {
        name: raw.name.clone(),
        service_type,
        num_replicas: raw.num_replicas.or(defaults.num_replicas).unwrap_or(1),
        is_entrypoint: raw.is_entrypoint,
        response_size: optional_size(&raw.response_size)?.unwrap_or(default_response_size),
        script: decode_script(steps, request_size)?,
    })
}

fn decode_script(steps: &[RawStep], request_size: u64) -> Result<Script, TopologyError> {
    steps
        .iter()
        .map(|step| decode_step(step, request_size))
        .collect()
}

fn decode_step(step: &RawStep, request_size: u64) -> Result<Command, TopologyError> {
    match step {
        RawStep::Concurrent(steps) => Ok(Command::concurrent(
            steps
                .iter()
                .map(|step| decode_step(step, request_size))
                .collect::<Result<Vec<_>, _>>()?,
        )),
        RawStep::Single(map) => {
            let mut entries = map.iter();
            let (key, value) = match (entries.next(), entries.next()) {
                (Some(entry), None) => entry,
                _ => {
                    return Err(TopologyError::InvalidStep(format!(
                        "expected exactly one command per step, found {}",
                        map.len()
                    )))
                }
            };
            match key.as_str() {
                "sleep" => decode_sleep(value),
                "call" => decode_call(value, request_size),
                other => Err(TopologyError::UnknownCommand(other.to_string())),
            }
        }
    }
}

fn decode_sleep(value: &Value) -> Result<Command, TopologyError> {
    let duration = match value {
        Value::String(text) => units::parse_duration(text)?,
        Value::Number(ms) => match ms.as_u64() {
            Some(ms) => std::time::Duration::from_millis(ms),
            None => return Err(TopologyError::InvalidDuration(ms.to_string())),
        },
        other => {
            return Err(TopologyError::InvalidStep(format!(
                "sleep expects a duration, found {other:?}"
            )))
        }
    };
    Ok(Command::sleep(duration))
}

fn decode_call(value: &Value, request_size: u64) -> Result<Command, TopologyError> {
    let request = match value {
        Value::String(service) => RequestCommand::new(service.clone(), request_size),
        Value::Mapping(_) => {
            let call: RawCall = serde_yaml::from_value(value.clone())?;
            let size = optional_size(&call.size)?.unwrap_or(request_size);
            let probability = match call.probability {
                Some(percent) => Probability::new(percent)?,
                None => Probability::ALWAYS,
            };
            RequestCommand::new(call.service, size).with_probability(probability)
        }
        other => {
            return Err(TopologyError::InvalidStep(format!(
                "call expects a service name or mapping, found {other:?}"
            )))
        }
    };
    Ok(Command::Request(request))
}

fn optional_size(size: &Option<RawSize>) -> Result<Option<u64>, TopologyError> {
    size.as_ref().map(RawSize::bytes).transpose()
}

fn parse_service_type(name: &str) -> Result<ServiceType, TopologyError> {
    name.parse()
        .map_err(|_| TopologyError::InvalidServiceType(name.to_string()))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use meshload_core::{ConcurrentCommand, SleepCommand};

    const TOPOLOGY: &str = r#"
defaults:
  type: http
  requestSize: 1 KB
  responseSize: 2KiB
services:
- name: a
  isEntrypoint: true
  numReplicas: 3
  script:
  - sleep: 10ms
  - call: b
  - call: {service: c, size: 100, probability: 50}
  - - call: b
    - - call: c
      - sleep: 1s
- name: b
  type: grpc
- name: c
  responseSize: 10 KB
"#;

    #[test]
    fn decodes_the_full_format() {
        let graph = decode_graph(TOPOLOGY).unwrap();
        assert_eq!(graph.len(), 3);

        let a = graph.service("a").unwrap();
        assert!(a.is_entrypoint);
        assert_eq!(a.num_replicas, 3);
        assert_eq!(a.response_size, 2_048);

        let expected = Script::new(vec![
            Command::Sleep(SleepCommand(Duration::from_millis(10))),
            Command::Request(RequestCommand::new("b", 1_000)),
            Command::Request(
                RequestCommand::new("c", 100).with_probability(Probability::new(50).unwrap()),
            ),
            Command::Concurrent(ConcurrentCommand::new(vec![
                Command::Request(RequestCommand::new("b", 1_000)),
                Command::concurrent([
                    Command::Request(RequestCommand::new("c", 1_000)),
                    Command::sleep(Duration::from_secs(1)),
                ]),
            ])),
        ]);
        assert_eq!(a.script, expected);

        let b = graph.service("b").unwrap();
        assert_eq!(b.service_type, ServiceType::Grpc);
        assert!(b.script.is_empty());
        assert_eq!(graph.service("c").unwrap().response_size, 10_000);
    }

    #[test]
    fn unknown_command_is_rejected_with_service_context() {
        let yaml = "services:\n- name: a\n  script:\n  - explode: now\n";
        let err = decode_graph(yaml).unwrap_err();
        match err {
            TopologyError::InService { service, source } => {
                assert_eq!(service, "a");
                assert!(matches!(*source, TopologyError::UnknownCommand(ref k) if k == "explode"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn step_with_two_commands_is_rejected() {
        let yaml = "services:\n- name: a\n  script:\n  - {sleep: 1ms, call: a}\n";
        let err = decode_graph(yaml).unwrap_err().to_string();
        assert!(err.contains("exactly one command"), "{err}");
    }

    #[test]
    fn probability_above_hundred_is_rejected() {
        let yaml = "services:\n- name: a\n  script:\n  - call: {service: a, probability: 150}\n";
        assert!(decode_graph(yaml).is_err());
    }

    #[test]
    fn numeric_sleep_is_milliseconds() {
        let yaml = "services:\n- name: a\n  script:\n  - sleep: 25\n";
        let graph = decode_graph(yaml).unwrap();
        assert_eq!(
            graph.services[0].script.commands(),
            &[Command::sleep(Duration::from_millis(25))]
        );
    }

    #[test]
    fn service_script_falls_back_to_defaults() {
        let yaml = "defaults:\n  script:\n  - sleep: 5ms\nservices:\n- name: a\n";
        let graph = decode_graph(yaml).unwrap();
        assert_eq!(graph.services[0].script.len(), 1);
    }
}
