use thiserror::Error;

use crate::transport::TransportError;

/// Failure of a command, a script or an invocation.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("service {0} does not exist")]
    DestinationNotFound(String),

    #[error("service {destination} responded with status {status}")]
    UnexpectedStatus { destination: String, status: u16 },

    #[error("call to service {destination} failed: {source}")]
    Transport {
        destination: String,
        #[source]
        source: TransportError,
    },

    /// Failures of the sub-commands of one or more concurrent commands.
    /// Never nested and never empty.
    #[error("{}", format_failures(.0))]
    Concurrent(Vec<ExecutionError>),

    #[error("concurrent branch was cancelled before completing")]
    Cancelled,
}

impl ExecutionError {
    /// Combines branch failures into a single error.
    ///
    /// Nested aggregates are flattened so the result lists every underlying
    /// failure exactly once. No failures means success.
    pub fn aggregate(errors: Vec<ExecutionError>) -> Result<(), ExecutionError> {
        let mut flat = Vec::with_capacity(errors.len());
        for error in errors {
            match error {
                ExecutionError::Concurrent(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        if flat.is_empty() {
            Ok(())
        } else {
            Err(ExecutionError::Concurrent(flat))
        }
    }

    /// The leaf failures this error is made of.
    pub fn failures(&self) -> &[ExecutionError] {
        match self {
            ExecutionError::Concurrent(inner) => inner,
            other => std::slice::from_ref(other),
        }
    }

    pub fn failure_count(&self) -> usize {
        self.failures().len()
    }

    /// Short, stable label for reporting.
    pub fn kind(&self) -> &'static str {
        match self {
            ExecutionError::DestinationNotFound(_) => "destination_not_found",
            ExecutionError::UnexpectedStatus { .. } => "unexpected_status",
            ExecutionError::Transport { .. } => "transport",
            ExecutionError::Concurrent(_) => "concurrent",
            ExecutionError::Cancelled => "cancelled",
        }
    }

    /// Destination named by a leaf failure, if any.
    pub fn destination(&self) -> Option<&str> {
        match self {
            ExecutionError::DestinationNotFound(destination)
            | ExecutionError::UnexpectedStatus { destination, .. }
            | ExecutionError::Transport { destination, .. } => Some(destination.as_str()),
            ExecutionError::Concurrent(_) | ExecutionError::Cancelled => None,
        }
    }
}

fn format_failures(errors: &[ExecutionError]) -> String {
    use std::fmt::Write;

    let mut output = if errors.len() == 1 {
        "1 error occurred:".to_string()
    } else {
        format!("{} errors occurred:", errors.len())
    };
    for error in errors {
        let _ = write!(output, "\n\t* {}", error);
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_of_nothing_is_success() {
        assert!(ExecutionError::aggregate(Vec::new()).is_ok());
    }

    #[test]
    fn aggregate_flattens_nested_groups() {
        let nested = ExecutionError::Concurrent(vec![
            ExecutionError::DestinationNotFound("x".into()),
            ExecutionError::DestinationNotFound("y".into()),
        ]);
        let err = ExecutionError::aggregate(vec![
            nested,
            ExecutionError::UnexpectedStatus {
                destination: "z".into(),
                status: 503,
            },
        ])
        .unwrap_err();

        assert_eq!(err.failure_count(), 3);
        assert!(err
            .failures()
            .iter()
            .all(|f| !matches!(f, ExecutionError::Concurrent(_))));
    }

    #[test]
    fn aggregate_message_names_every_failure() {
        let err = ExecutionError::aggregate(vec![
            ExecutionError::DestinationNotFound("missing".into()),
            ExecutionError::UnexpectedStatus {
                destination: "c".into(),
                status: 500,
            },
        ])
        .unwrap_err();

        let message = err.to_string();
        assert!(message.starts_with("2 errors occurred:"));
        assert!(message.contains("service missing does not exist"));
        assert!(message.contains("service c responded with status 500"));
    }
}
