//! ## meshload-core::executor
//! **Script interpreter**
//!
//! Walks a command tree for one invocation:
//! - `Sleep` suspends only the path it runs on.
//! - `Request` is sampled, checked against the registry, sent, counted,
//!   drained, and finally judged by its status.
//! - `Concurrent` runs one tokio task per sub-command and joins all of them
//!   before the parent continues. A failing branch never cancels its siblings.
//!
//! Nothing is retained between invocations. The command tree is borrowed,
//! and a concurrent branch holds a reference-counted handle on its group
//! rather than a copy, so one [`Executor`] can serve any number of
//! simultaneous invocations of the same script.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, trace};

use crate::error::ExecutionError;
use crate::headers::HeaderSet;
use crate::metrics::MetricsSink;
use crate::model::{Command, ConcurrentCommand, RequestCommand, Script, SleepCommand};
use crate::registry::ServiceRegistry;
use crate::sampling::RequestSampler;
use crate::transport::{Transport, STATUS_OK};

/// Shared, read-only lookup used for every request of an invocation.
pub type SharedRegistry = Arc<dyn ServiceRegistry>;

type ExecuteFuture<'a> = Pin<Box<dyn Future<Output = Result<(), ExecutionError>> + Send + 'a>>;

/// Executes commands against a transport.
///
/// Cloning is cheap: clones share the transport, the metrics sink and the
/// random source.
#[derive(Clone)]
pub struct Executor {
    transport: Arc<dyn Transport>,
    metrics: Arc<dyn MetricsSink>,
    sampler: Arc<RequestSampler>,
}

impl Executor {
    pub fn new(
        transport: Arc<dyn Transport>,
        metrics: Arc<dyn MetricsSink>,
        sampler: RequestSampler,
    ) -> Self {
        Self {
            transport,
            metrics,
            sampler: Arc::new(sampler),
        }
    }

    /// Runs every command of `script` in order, stopping at the first failure.
    pub async fn run_script(
        &self,
        script: &Script,
        headers: &Arc<HeaderSet>,
        registry: &SharedRegistry,
    ) -> Result<(), ExecutionError> {
        for command in script {
            self.execute(command, headers, registry).await?;
        }
        Ok(())
    }

    /// Executes a single command, including everything nested below it.
    ///
    /// # Panics
    /// Re-raises the panic of any concurrent branch. A panicking branch means
    /// the script broke an invariant of the interpreter, which is not a
    /// runtime failure to report but a defect that must stop the process.
    pub fn execute<'a>(
        &'a self,
        command: &'a Command,
        headers: &'a Arc<HeaderSet>,
        registry: &'a SharedRegistry,
    ) -> ExecuteFuture<'a> {
        Box::pin(async move {
            match command {
                Command::Sleep(cmd) => {
                    self.execute_sleep(cmd).await;
                    Ok(())
                }
                Command::Request(cmd) => {
                    self.execute_request(cmd, headers, registry.as_ref()).await
                }
                Command::Concurrent(cmd) => self.execute_concurrent(cmd, headers, registry).await,
            }
        })
    }

    async fn execute_sleep(&self, cmd: &SleepCommand) {
        trace!(duration = ?cmd.duration(), "sleeping");
        tokio::time::sleep(cmd.duration()).await;
    }

    async fn execute_request(
        &self,
        cmd: &RequestCommand,
        headers: &HeaderSet,
        registry: &dyn ServiceRegistry,
    ) -> Result<(), ExecutionError> {
        if self.sampler.should_skip(cmd.probability) {
            trace!(destination = %cmd.destination, "request skipped");
            return Ok(());
        }

        let destination = cmd.destination.as_str();
        if !registry.contains(destination) {
            return Err(ExecutionError::DestinationNotFound(destination.to_string()));
        }

        let sent = self.transport.send(destination, cmd.size, headers).await;
        self.metrics.record_request_sent(destination, cmd.size);

        let response = sent.map_err(|source| ExecutionError::Transport {
            destination: destination.to_string(),
            source,
        })?;

        let status = response.status();
        // Drained whatever the status.
        if let Err(e) = response.drain().await {
            debug!(destination, error = %e, "failed to drain response body");
        }

        debug!(destination, status, "service responded");
        if status != STATUS_OK {
            return Err(ExecutionError::UnexpectedStatus {
                destination: destination.to_string(),
                status,
            });
        }
        Ok(())
    }

    async fn execute_concurrent(
        &self,
        cmd: &ConcurrentCommand,
        headers: &Arc<HeaderSet>,
        registry: &SharedRegistry,
    ) -> Result<(), ExecutionError> {
        let mut branches = JoinSet::new();
        for index in 0..cmd.len() {
            let executor = self.clone();
            let group = cmd.shared();
            let headers = Arc::clone(headers);
            let registry = Arc::clone(registry);
            branches.spawn(async move {
                let result = executor.execute(&group[index], &headers, &registry).await;
                (index, result)
            });
        }

        let mut failures = Vec::new();
        while let Some(joined) = branches.join_next().await {
            match joined {
                Ok((_, Ok(()))) => {}
                Ok((index, Err(e))) => failures.push((index, e)),
                Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                Err(_) => failures.push((usize::MAX, ExecutionError::Cancelled)),
            }
        }

        // Completion order is arbitrary; report in declaration order.
        failures.sort_by_key(|(index, _)| *index);
        ExecutionError::aggregate(failures.into_iter().map(|(_, e)| e).collect())
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("sampler", &self.sampler)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::time::Duration;

    use super::*;
    use crate::metrics::NoopMetrics;
    use crate::model::Probability;
    use crate::testing::{RecordingMetrics, RecordingTransport};

    fn registry(names: &[&str]) -> SharedRegistry {
        let names: HashSet<String> = names.iter().map(|n| n.to_string()).collect();
        Arc::new(names)
    }

    fn executor(transport: &Arc<RecordingTransport>, metrics: &Arc<RecordingMetrics>) -> Executor {
        Executor::new(
            transport.clone(),
            metrics.clone(),
            RequestSampler::from_seed(42),
        )
    }

    fn always(destination: &str) -> Command {
        Command::request(destination, 100, Probability::ALWAYS)
    }

    fn certain(destination: &str) -> Command {
        Command::request(destination, 100, Probability::new(100).unwrap())
    }

    #[tokio::test]
    async fn zero_probability_request_is_always_sent() {
        let transport = Arc::new(RecordingTransport::default());
        let metrics = Arc::new(RecordingMetrics::default());
        let exec = executor(&transport, &metrics);
        let headers = Arc::new(HeaderSet::new());
        let registry = registry(&["b"]);

        for _ in 0..500 {
            exec.execute(&always("b"), &headers, &registry).await.unwrap();
        }
        assert_eq!(transport.call_count(), 500);
        assert_eq!(metrics.records().len(), 500);
    }

    #[tokio::test]
    async fn send_rate_follows_probability() {
        let transport = Arc::new(RecordingTransport::default());
        let metrics = Arc::new(RecordingMetrics::default());
        let exec = executor(&transport, &metrics);
        let headers = Arc::new(HeaderSet::new());
        let registry = registry(&["b"]);
        let cmd = Command::request("b", 10, Probability::new(30).unwrap());

        let trials = 5_000;
        for _ in 0..trials {
            exec.execute(&cmd, &headers, &registry).await.unwrap();
        }
        let rate = transport.call_count() as f64 / trials as f64;
        assert!((rate - 0.30).abs() < 0.03, "observed send rate {rate}");
        // Skipped requests never reach the metrics sink.
        assert_eq!(metrics.records().len(), transport.call_count());
    }

    #[tokio::test]
    async fn unknown_destination_fails_without_network_activity() {
        let transport = Arc::new(RecordingTransport::default());
        let metrics = Arc::new(RecordingMetrics::default());
        let exec = executor(&transport, &metrics);

        let err = exec
            .execute(&always("missing"), &Arc::new(HeaderSet::new()), &registry(&["b"]))
            .await
            .unwrap_err();

        assert!(matches!(err, ExecutionError::DestinationNotFound(ref name) if name == "missing"));
        assert_eq!(transport.call_count(), 0);
        assert!(metrics.records().is_empty());
    }

    #[tokio::test]
    async fn non_ok_status_is_reported_and_still_counted_and_drained() {
        let transport = Arc::new(RecordingTransport::default().respond_with("b", 503));
        let metrics = Arc::new(RecordingMetrics::default());
        let exec = executor(&transport, &metrics);

        let err = exec
            .execute(&always("b"), &Arc::new(HeaderSet::new()), &registry(&["b"]))
            .await
            .unwrap_err();

        match err {
            ExecutionError::UnexpectedStatus {
                ref destination,
                status,
            } => {
                assert_eq!(destination, "b");
                assert_eq!(status, 503);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(metrics.records(), vec![("b".to_string(), 100)]);
        assert_eq!(transport.drained_count(), 1);
    }

    #[tokio::test]
    async fn runs_without_a_metrics_backend() {
        let transport = Arc::new(RecordingTransport::default());
        let exec = Executor::new(
            transport.clone(),
            Arc::new(NoopMetrics),
            RequestSampler::from_seed(5),
        );
        let cmd = Command::concurrent([always("b"), always("c")]);

        exec.execute(&cmd, &Arc::new(HeaderSet::new()), &registry(&["b", "c"]))
            .await
            .unwrap();
        assert_eq!(transport.call_count(), 2);
    }

    #[tokio::test]
    async fn drain_failure_does_not_change_the_outcome() {
        let transport = Arc::new(RecordingTransport::default().fail_drain_on("b"));
        let metrics = Arc::new(RecordingMetrics::default());
        let exec = executor(&transport, &metrics);

        exec.execute(&always("b"), &Arc::new(HeaderSet::new()), &registry(&["b"]))
            .await
            .unwrap();

        assert_eq!(transport.drained_count(), 1);
        assert_eq!(metrics.records(), vec![("b".to_string(), 100)]);
    }

    #[tokio::test]
    async fn drain_failure_keeps_the_status_failure() {
        let transport = Arc::new(
            RecordingTransport::default()
                .respond_with("b", 502)
                .fail_drain_on("b"),
        );
        let metrics = Arc::new(RecordingMetrics::default());
        let exec = executor(&transport, &metrics);

        let err = exec
            .execute(&always("b"), &Arc::new(HeaderSet::new()), &registry(&["b"]))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::UnexpectedStatus { status: 502, .. }));
    }

    #[tokio::test]
    async fn transport_error_still_notifies_metrics() {
        let transport = Arc::new(RecordingTransport::default().fail_with("b"));
        let metrics = Arc::new(RecordingMetrics::default());
        let exec = executor(&transport, &metrics);

        let err = exec
            .execute(&always("b"), &Arc::new(HeaderSet::new()), &registry(&["b"]))
            .await
            .unwrap_err();

        assert!(matches!(err, ExecutionError::Transport { ref destination, .. } if destination == "b"));
        assert_eq!(metrics.records().len(), 1);
    }

    #[tokio::test]
    async fn headers_reach_every_request_unchanged() {
        let transport = Arc::new(RecordingTransport::default());
        let metrics = Arc::new(RecordingMetrics::default());
        let exec = executor(&transport, &metrics);
        let headers = Arc::new(HeaderSet::new().with("x-request-id", "r-1"));
        let cmd = Command::concurrent([always("b"), always("c")]);

        exec.execute(&cmd, &headers, &registry(&["b", "c"]))
            .await
            .unwrap();

        let calls = transport.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls
            .iter()
            .all(|call| call.headers.get("x-request-id") == Some("r-1")));
    }

    #[tokio::test]
    async fn concurrent_runs_every_branch_and_counts_failures() {
        let transport = Arc::new(RecordingTransport::default().respond_with("bad", 500));
        let metrics = Arc::new(RecordingMetrics::default());
        let exec = executor(&transport, &metrics);
        let cmd = Command::concurrent([
            certain("ok"),
            certain("bad"),
            certain("ok"),
            certain("missing"),
            certain("ok"),
        ]);

        let err = exec
            .execute(&cmd, &Arc::new(HeaderSet::new()), &registry(&["ok", "bad"]))
            .await
            .unwrap_err();

        assert_eq!(err.failure_count(), 2);
        // "missing" never reaches the transport; the other four do.
        assert_eq!(transport.call_count(), 4);
        let destinations: Vec<_> = err.failures().iter().filter_map(|f| f.destination()).collect();
        assert_eq!(destinations, vec!["bad", "missing"]);
    }

    #[tokio::test]
    async fn concurrent_all_successful() {
        let transport = Arc::new(RecordingTransport::default());
        let metrics = Arc::new(RecordingMetrics::default());
        let exec = executor(&transport, &metrics);
        let names = ["a", "b", "c", "d", "e"];
        let cmd = Command::concurrent(names.iter().map(|n| certain(n)));

        exec.execute(&cmd, &Arc::new(HeaderSet::new()), &registry(&names))
            .await
            .unwrap();

        assert_eq!(transport.call_count(), 5);
    }

    #[tokio::test]
    async fn nested_failures_are_flattened() {
        let transport = Arc::new(RecordingTransport::default());
        let metrics = Arc::new(RecordingMetrics::default());
        let exec = executor(&transport, &metrics);
        let cmd = Command::concurrent([
            certain("x"),
            Command::concurrent([certain("y"), certain("ok")]),
        ]);

        let err = exec
            .execute(&cmd, &Arc::new(HeaderSet::new()), &registry(&["ok"]))
            .await
            .unwrap_err();

        assert_eq!(err.failure_count(), 2);
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_sleeps_overlap() {
        let transport = Arc::new(RecordingTransport::default());
        let metrics = Arc::new(RecordingMetrics::default());
        let exec = executor(&transport, &metrics);
        let cmd = Command::concurrent([
            Command::sleep(Duration::from_millis(100)),
            Command::sleep(Duration::from_millis(100)),
            Command::sleep(Duration::from_millis(100)),
        ]);

        let started = tokio::time::Instant::now();
        exec.execute(&cmd, &Arc::new(HeaderSet::new()), &registry(&[]))
            .await
            .unwrap();
        let elapsed = started.elapsed();

        assert!(elapsed >= Duration::from_millis(100));
        assert!(elapsed < Duration::from_millis(200));
    }

    #[tokio::test]
    async fn script_halts_at_first_sequential_failure() {
        let transport = Arc::new(RecordingTransport::default());
        let metrics = Arc::new(RecordingMetrics::default());
        let exec = executor(&transport, &metrics);
        let script = Script::new(vec![always("a"), always("missing"), always("a")]);

        let err = exec
            .run_script(&script, &Arc::new(HeaderSet::new()), &registry(&["a"]))
            .await
            .unwrap_err();

        assert!(matches!(err, ExecutionError::DestinationNotFound(_)));
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn mixed_script_scenario() {
        let transport = Arc::new(RecordingTransport::default());
        let metrics = Arc::new(RecordingMetrics::default());
        let exec = executor(&transport, &metrics);
        let script = Script::new(vec![
            Command::sleep(Duration::from_millis(10)),
            Command::request("b", 100, Probability::ALWAYS),
            Command::concurrent([certain("c"), certain("missing")]),
        ]);
        let before = script.clone();

        let started = std::time::Instant::now();
        let err = exec
            .run_script(&script, &Arc::new(HeaderSet::new()), &registry(&["b", "c"]))
            .await
            .unwrap_err();

        assert!(started.elapsed() >= Duration::from_millis(10));
        assert_eq!(err.failure_count(), 1);
        assert!(matches!(
            err.failures()[0],
            ExecutionError::DestinationNotFound(ref name) if name == "missing"
        ));
        let mut destinations: Vec<_> = transport
            .calls()
            .into_iter()
            .map(|call| call.destination)
            .collect();
        destinations.sort();
        assert_eq!(destinations, vec!["b", "c"]);
        assert_eq!(script, before);
    }

    #[tokio::test]
    async fn repeated_execution_leaves_the_script_untouched() {
        let transport = Arc::new(RecordingTransport::default());
        let metrics = Arc::new(RecordingMetrics::default());
        let exec = executor(&transport, &metrics);
        let script = Script::new(vec![Command::concurrent([always("a"), always("b")])]);
        let before = script.clone();
        let headers = Arc::new(HeaderSet::new());
        let registry = registry(&["a", "b"]);

        exec.run_script(&script, &headers, &registry).await.unwrap();
        exec.run_script(&script, &headers, &registry).await.unwrap();

        assert_eq!(script, before);
        assert_eq!(transport.call_count(), 4);
    }

    #[tokio::test]
    #[should_panic(expected = "branch exploded")]
    async fn panicking_branch_is_fatal() {
        let transport = Arc::new(RecordingTransport::default().panic_on("boom"));
        let metrics = Arc::new(RecordingMetrics::default());
        let exec = executor(&transport, &metrics);
        let cmd = Command::concurrent([always("a"), always("boom")]);

        let _ = exec
            .execute(&cmd, &Arc::new(HeaderSet::new()), &registry(&["a", "boom"]))
            .await;
    }
}
