use std::sync::Arc;

use anyhow::Context;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use podbridge_comfyui::api::ComfyUIApi;
use podbridge_comfyui::engine::Engine;
use podbridge_comfyui::wait::await_ready;
use podbridge_core::housekeeping::cleanup_old_outputs;
use podbridge_core::templates::TemplateRegistry;
use podbridge_pipeline::orchestrator::Orchestrator;
use podbridge_worker::config::BridgeConfig;
use podbridge_worker::runner::run_jobs;
use podbridge_worker::server::{self, ApiState};

const DEFAULT_LOG_FILTER: &str =
    "podbridge_worker=info,podbridge_pipeline=info,podbridge_comfyui=info,podbridge_core=info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing (stderr; stdout carries the job protocol) ---
    init_tracing();

    // --- Configuration ---
    let config = BridgeConfig::from_env().inspect_err(|e| {
        tracing::error!(error = %e, "Invalid configuration");
    })?;
    tracing::info!(
        comfy_host = %config.comfy_host,
        comfy_port = config.comfy_port,
        input_mode = ?config.input_mode,
        "Loaded worker configuration",
    );

    // --- Housekeeping ---
    if let Some(max_age) = config.output_max_age {
        cleanup_old_outputs(&config.output_dir, max_age);
    }

    // --- Shutdown signal ---
    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));

    // --- Engine ---
    let api = ComfyUIApi::from_host_port(&config.comfy_host, config.comfy_port)
        .with_request_timeout(config.request_timeout);
    tracing::info!(api_url = %api.api_url(), "Waiting for ComfyUI");
    let engine: Arc<dyn Engine> = Arc::new(api);

    if !await_ready(engine.as_ref(), config.startup_timeout, &shutdown).await {
        anyhow::bail!(
            "ComfyUI not ready within {}s, exiting",
            config.startup_timeout.as_secs()
        );
    }

    let orchestrator = Orchestrator::new(engine, TemplateRegistry::builtin(), config.pipeline());

    // --- Serve ---
    match config.serve_api_port {
        Some(port) => {
            server::serve(
                ApiState {
                    orchestrator,
                    shutdown,
                },
                port,
            )
            .await
            .context("local API server failed")?;
        }
        None => {
            tracing::info!("Reading jobs from stdin");
            let answered = run_jobs(
                &orchestrator,
                BufReader::new(tokio::io::stdin()),
                tokio::io::stdout(),
                &shutdown,
            )
            .await
            .context("job loop failed")?;
            tracing::info!(answered, "Job loop finished");
        }
    }

    tracing::info!("Worker stopped");
    Ok(())
}

/// Install the global subscriber. `LOG_FORMAT=json` selects JSON lines.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Cancel `token` on SIGINT (Ctrl-C) or SIGTERM.
///
/// Cancelling aborts the in-flight job's wait; the job runner then sends a
/// best-effort interrupt to the engine.
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl-C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }

    token.cancel();
}
