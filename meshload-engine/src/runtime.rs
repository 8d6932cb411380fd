// meshload-engine/src/runtime.rs

/*!
# Traffic Runtime

Drives one simulated service: its script is invoked again and again, each
invocation with its own request id, with a bounded number in flight. Every
failed invocation is logged with its aggregated error. Nothing is retried.
*/

use std::sync::Arc;
use std::time::{Duration, Instant};

use opentelemetry::KeyValue;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info, info_span, instrument, warn, Instrument};
use uuid::Uuid;

use meshload_config::{MeshloadConfig, RunnerConfig};
use meshload_core::{
    ExecutionError, Executor, HeaderSet, RequestSampler, Script, SharedRegistry,
};
use meshload_telemetry::{EventLogger, MetricsRecorder};
use meshload_topology::ServiceGraph;
use meshload_transport::HttpTransport;

use crate::error::EngineError;
use crate::report::RunReport;

/// How a run is paced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerSettings {
    pub invocations: u64,
    pub parallelism: usize,
    /// Minimum delay between two invocation starts.
    pub interval: Duration,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self::from(&RunnerConfig::default())
    }
}

impl From<&RunnerConfig> for RunnerSettings {
    fn from(config: &RunnerConfig) -> Self {
        Self {
            invocations: config.invocations,
            parallelism: config.parallelism.max(1),
            interval: Duration::from_millis(config.interval_ms),
        }
    }
}

struct Finished {
    sequence: u64,
    request_id: String,
    result: Result<(), ExecutionError>,
}

/// Repeatedly executes the script of one service.
pub struct TrafficRuntime {
    service: String,
    script: Arc<Script>,
    registry: SharedRegistry,
    executor: Executor,
    settings: RunnerSettings,
    metrics: Option<Arc<MetricsRecorder>>,
}

impl TrafficRuntime {
    /// Selects `service`, or the first entrypoint when `None`.
    pub fn new(
        graph: Arc<ServiceGraph>,
        service: Option<&str>,
        executor: Executor,
        settings: RunnerSettings,
    ) -> Result<Self, EngineError> {
        let selected = match service {
            Some(name) => graph
                .service(name)
                .ok_or_else(|| EngineError::UnknownService(name.to_string()))?,
            None => graph.entrypoints().next().ok_or(EngineError::NoEntrypoint)?,
        };
        let service = selected.name.clone();
        let script = Arc::new(selected.script.clone());
        debug!(%service, commands = script.len(), "traffic runtime ready");

        Ok(Self {
            service,
            script,
            registry: graph,
            executor,
            settings,
            metrics: None,
        })
    }

    /// Also counts invocation outcomes in `metrics`.
    pub fn with_metrics(mut self, metrics: Arc<MetricsRecorder>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// Runs every invocation and waits for the last one to finish.
    ///
    /// # Panics
    /// Re-raises a panic from any invocation.
    #[instrument(level = "info", skip(self), fields(service = %self.service))]
    pub async fn run(&self) -> Result<RunReport, EngineError> {
        info!(
            invocations = self.settings.invocations,
            parallelism = self.settings.parallelism,
            "Starting traffic run"
        );
        let started = Instant::now();
        let mut report = RunReport::new(self.service.clone());
        let permits = Arc::new(Semaphore::new(self.settings.parallelism));
        let mut ticker = (!self.settings.interval.is_zero())
            .then(|| tokio::time::interval(self.settings.interval));
        let mut in_flight = JoinSet::new();

        for sequence in 0..self.settings.invocations {
            if let Some(ticker) = ticker.as_mut() {
                ticker.tick().await;
            }
            let permit = Arc::clone(&permits)
                .acquire_owned()
                .await
                .map_err(|e| EngineError::Task(e.to_string()))?;

            let executor = self.executor.clone();
            let script = Arc::clone(&self.script);
            let registry = Arc::clone(&self.registry);
            in_flight.spawn(
                async move {
                    let _permit = permit;
                    let request_id = Uuid::new_v4().to_string();
                    let headers = Arc::new(HeaderSet::new().with("x-request-id", request_id.clone()));
                    let result = executor.run_script(&script, &headers, &registry).await;
                    Finished {
                        sequence,
                        request_id,
                        result,
                    }
                }
                .instrument(info_span!("invocation", sequence)),
            );

            while let Some(joined) = in_flight.try_join_next() {
                self.record(&mut report, joined)?;
            }
        }

        while let Some(joined) = in_flight.join_next().await {
            self.record(&mut report, joined)?;
        }

        report.wall_time = started.elapsed();
        info!(
            successful = report.successful,
            failed = report.failed,
            "Traffic run complete"
        );
        Ok(report)
    }

    fn record(
        &self,
        report: &mut RunReport,
        joined: Result<Finished, JoinError>,
    ) -> Result<(), EngineError> {
        let finished = match joined {
            Ok(finished) => finished,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => return Err(e.into()),
        };

        let success = finished.result.is_ok();
        if let Some(metrics) = &self.metrics {
            metrics.record_invocation(success);
        }

        match finished.result {
            Ok(()) => report.record_success(),
            Err(error) => {
                warn!(
                    sequence = finished.sequence,
                    request_id = %finished.request_id,
                    failures = error.failure_count(),
                    error = %error,
                    "invocation failed"
                );
                EventLogger::log_event(
                    "invocation_failed",
                    vec![
                        KeyValue::new("service", self.service.clone()),
                        KeyValue::new("sequence", finished.sequence as i64),
                        KeyValue::new("request_id", finished.request_id),
                        KeyValue::new("failures", error.failure_count() as i64),
                        KeyValue::new("error", error.to_string()),
                    ],
                );
                report.record_failure(&error);
            }
        }
        Ok(())
    }
}

/// A completed run together with the recorder that observed it.
pub struct TrafficRun {
    pub report: RunReport,
    pub metrics: Arc<MetricsRecorder>,
}

/// Runs live traffic as described by `config`: loads the topology, talks
/// HTTP to the other services, and records Prometheus metrics.
#[instrument(level = "info", name = "run_traffic_mode", skip(config))]
pub async fn run_traffic_mode(config: &MeshloadConfig) -> Result<TrafficRun, EngineError> {
    let graph = load_graph(config)?;
    let metrics = Arc::new(MetricsRecorder::new()?);
    let executor = http_executor(config, metrics.clone())?;

    let runtime = TrafficRuntime::new(
        graph,
        config.runner.service.as_deref(),
        executor,
        RunnerSettings::from(&config.runner),
    )?
    .with_metrics(metrics.clone());

    let report = runtime.run().await?;
    Ok(TrafficRun { report, metrics })
}

pub(crate) fn load_graph(config: &MeshloadConfig) -> Result<Arc<ServiceGraph>, EngineError> {
    info!("Loading topology from {:?}", config.topology.path);
    Ok(Arc::new(ServiceGraph::load(&config.topology.path)?))
}

/// Interpreter talking HTTP to the other services and counting into `metrics`.
pub(crate) fn http_executor(
    config: &MeshloadConfig,
    metrics: Arc<MetricsRecorder>,
) -> Result<Executor, EngineError> {
    let transport = HttpTransport::new(
        &config.transport.scheme,
        config.transport.port,
        Duration::from_millis(config.transport.timeout_ms),
    )?;
    let sampler = match config.runner.seed {
        Some(seed) => RequestSampler::from_seed(seed),
        None => RequestSampler::from_entropy(),
    };
    Ok(Executor::new(Arc::new(transport), metrics, sampler))
}
