//! ## meshload-engine::server
//! **Serving one simulated service**
//!
//! Every incoming request runs the service's script once, forwarding the
//! request's trace headers to each call the script makes. A script that
//! succeeds is answered with `200` and `response_size` zero bytes, a failing
//! one with `500` and the aggregated error. `GET /metrics` exposes the
//! Prometheus registry.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use bytes::Bytes;
use futures::StreamExt;
use opentelemetry::KeyValue;
use tokio::net::TcpListener;
use tracing::{debug, info, instrument, warn};

use meshload_config::MeshloadConfig;
use meshload_core::{Executor, HeaderSet, Script, SharedRegistry};
use meshload_telemetry::{EventLogger, MetricsRecorder};
use meshload_topology::ServiceGraph;

use crate::error::EngineError;
use crate::runtime::{http_executor, load_graph};

/// Everything a request handler needs, shared by all connections.
pub struct ServiceState {
    service: String,
    script: Arc<Script>,
    registry: SharedRegistry,
    executor: Executor,
    response: Bytes,
    metrics: Arc<MetricsRecorder>,
}

impl ServiceState {
    pub fn new(
        graph: Arc<ServiceGraph>,
        service: &str,
        executor: Executor,
        metrics: Arc<MetricsRecorder>,
    ) -> Result<Self, EngineError> {
        let selected = graph
            .service(service)
            .ok_or_else(|| EngineError::UnknownService(service.to_string()))?;
        let response_len = usize::try_from(selected.response_size)
            .map_err(|_| EngineError::ResponseTooLarge(selected.response_size))?;
        let script = Arc::new(selected.script.clone());

        Ok(Self {
            service: service.to_string(),
            script,
            response: Bytes::from(vec![0u8; response_len]),
            registry: graph,
            executor,
            metrics,
        })
    }

    pub fn service(&self) -> &str {
        &self.service
    }
}

/// Routes `GET /metrics` to the exposition and everything else to the script.
pub fn service_router(state: Arc<ServiceState>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .fallback(handle_request)
        .with_state(state)
}

async fn handle_request(
    State(state): State<Arc<ServiceState>>,
    headers: HeaderMap,
    body: Body,
) -> Response {
    let started = Instant::now();
    if let Err(e) = drain_request(body).await {
        debug!(error = %e, "failed to read request body");
    }

    let forwarded = Arc::new(HeaderSet::forwardable(headers.iter().filter_map(
        |(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str(), value.to_string()))
        },
    )));
    let result = state
        .executor
        .run_script(&state.script, &forwarded, &state.registry)
        .await;

    let response = match result {
        Ok(()) => (StatusCode::OK, state.response.clone()).into_response(),
        Err(error) => {
            let request_id = forwarded.get("x-request-id").unwrap_or_default().to_string();
            warn!(
                service = %state.service,
                request_id = %request_id,
                failures = error.failure_count(),
                error = %error,
                "request failed"
            );
            EventLogger::log_event(
                "request_failed",
                vec![
                    KeyValue::new("service", state.service.clone()),
                    KeyValue::new("request_id", request_id),
                    KeyValue::new("failures", error.failure_count() as i64),
                    KeyValue::new("error", error.to_string()),
                ],
            );
            (StatusCode::INTERNAL_SERVER_ERROR, error.to_string()).into_response()
        }
    };

    state
        .metrics
        .record_incoming(response.status().as_u16(), started.elapsed());
    response
}

/// Reads the request body to its end and returns its length.
async fn drain_request(body: Body) -> Result<u64, axum::Error> {
    let mut stream = body.into_data_stream();
    let mut received = 0u64;
    while let Some(chunk) = stream.next().await {
        received += chunk?.len() as u64;
    }
    Ok(received)
}

async fn metrics_handler(State(state): State<Arc<ServiceState>>) -> Response {
    match state.metrics.gather_metrics() {
        Ok(text) => (StatusCode::OK, text).into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to encode metrics".to_string(),
            )
                .into_response()
        }
    }
}

/// Serves `runner.service` on `transport.port` until Ctrl-C.
#[instrument(level = "info", name = "run_service_mode", skip(config))]
pub async fn run_service_mode(config: &MeshloadConfig) -> Result<(), EngineError> {
    let service = config
        .runner
        .service
        .as_deref()
        .ok_or(EngineError::ServiceRequired)?;
    let graph = load_graph(config)?;
    let metrics = Arc::new(MetricsRecorder::new()?);
    let executor = http_executor(config, metrics.clone())?;
    let state = ServiceState::new(graph, service, executor, metrics)?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.transport.port));
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, service, "Serving simulated service");

    axum::serve(listener, service_router(Arc::new(state)))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for shutdown signal");
            }
        })
        .await?;

    info!("Service stopped");
    Ok(())
}
