use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use meshload_core::ExecutionError;

/// Outcome of one traffic run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    pub service: String,
    pub invocations: u64,
    pub successful: u64,
    pub failed: u64,
    /// Leaf failures by kind; one failed invocation may contribute several.
    pub failures_by_kind: BTreeMap<&'static str, u64>,
    pub wall_time: Duration,
}

impl RunReport {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            ..Self::default()
        }
    }

    pub fn record_success(&mut self) {
        self.invocations += 1;
        self.successful += 1;
    }

    pub fn record_failure(&mut self, error: &ExecutionError) {
        self.invocations += 1;
        self.failed += 1;
        for failure in error.failures() {
            *self.failures_by_kind.entry(failure.kind()).or_default() += 1;
        }
    }

    /// Percentage of successful invocations.
    pub fn success_rate(&self) -> f64 {
        if self.invocations == 0 {
            0.0
        } else {
            (self.successful as f64 / self.invocations as f64) * 100.0
        }
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Traffic Report: {} ===", self.service)?;
        writeln!(f, "Invocations: {}", self.invocations)?;
        writeln!(f, "Successful: {}", self.successful)?;
        writeln!(f, "Failed: {}", self.failed)?;
        writeln!(f, "Success Rate: {:.2}%", self.success_rate())?;
        writeln!(f, "Wall Time: {:?}", self.wall_time)?;
        for (kind, count) in &self.failures_by_kind {
            writeln!(f, "  {}: {}", kind, count)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failures_are_counted_per_leaf_kind() {
        let mut report = RunReport::new("a");
        report.record_success();
        report.record_failure(&ExecutionError::Concurrent(vec![
            ExecutionError::DestinationNotFound("x".into()),
            ExecutionError::DestinationNotFound("y".into()),
            ExecutionError::UnexpectedStatus {
                destination: "z".into(),
                status: 500,
            },
        ]));

        assert_eq!(report.invocations, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.failures_by_kind["destination_not_found"], 2);
        assert_eq!(report.failures_by_kind["unexpected_status"], 1);
        assert_eq!(report.success_rate(), 50.0);
    }

    #[test]
    fn empty_report_has_zero_success_rate() {
        assert_eq!(RunReport::new("a").success_rate(), 0.0);
    }

    #[test]
    fn display_summarises_the_run() {
        let mut report = RunReport::new("frontend");
        report.record_success();
        let text = report.to_string();
        assert!(text.contains("Traffic Report: frontend"));
        assert!(text.contains("Success Rate: 100.00%"));
    }
}
