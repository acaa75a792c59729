//! Local HTTP API for trying jobs without the job platform.
//!
//! - `GET /health` reports whether the engine answers.
//! - `POST /runsync` runs one job envelope and returns its result.

use std::net::SocketAddr;

use axum::extract::State;
use axum::http::HeaderName;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use podbridge_comfyui::progress::{ProgressError, ProgressSink};
use podbridge_pipeline::orchestrator::Orchestrator;
use podbridge_pipeline::request::JobResult;

use crate::job::{run_job, JobEnvelope};

/// Shared handler state.
#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Orchestrator,
    /// Parent of every job's cancellation token.
    pub shutdown: CancellationToken,
}

/// Health check response payload.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `ok` when the engine answers, `degraded` otherwise.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    pub engine_ready: bool,
}

/// Logs progress instead of relaying it; HTTP callers only see the result.
struct LoggedProgress {
    job_id: String,
}

impl ProgressSink for LoggedProgress {
    fn report(&self, progress: u8, message: &str) -> Result<(), ProgressError> {
        tracing::info!(job_id = %self.job_id, progress, detail = %message, "Job progress");
        Ok(())
    }
}

/// GET /health
async fn health(State(state): State<ApiState>) -> Json<HealthResponse> {
    let engine_ready = state.orchestrator.engine().probe_ready().await;

    Json(HealthResponse {
        status: if engine_ready { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        engine_ready,
    })
}

/// POST /runsync
async fn run_sync(State(state): State<ApiState>, Json(envelope): Json<JobEnvelope>) -> Json<JobResult> {
    let progress = LoggedProgress {
        job_id: envelope.id.clone(),
    };
    let result = run_job(
        &state.orchestrator,
        envelope,
        progress,
        state.shutdown.child_token(),
    )
    .await;
    Json(result)
}

/// Build the router with the same middleware stack in tests and production.
pub fn router(state: ApiState) -> Router {
    let request_id_header = HeaderName::from_static("x-request-id");

    Router::new()
        .route("/health", get(health))
        .route("/runsync", post(run_sync))
        // Panic recovery: catch panics and return 500.
        .layer(CatchPanicLayer::new())
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .with_state(state)
}

/// Serve the local API on `0.0.0.0:{port}` until `shutdown` fires.
pub async fn serve(state: ApiState, port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let shutdown = state.shutdown.clone();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Serving local job API");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}
