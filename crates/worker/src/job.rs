//! Job envelope and panic-isolated job execution.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use podbridge_comfyui::progress::ProgressSink;
use podbridge_pipeline::error::{ErrorKind, JobError};
use podbridge_pipeline::orchestrator::Orchestrator;
use podbridge_pipeline::request::JobResult;

/// Identifier used when a job arrives without one.
pub const UNKNOWN_JOB_ID: &str = "unknown";

/// `{"id": "...", "input": {...}}` as delivered by the job platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEnvelope {
    #[serde(default = "unknown_id")]
    pub id: String,
    #[serde(default = "empty_input")]
    pub input: Value,
}

fn unknown_id() -> String {
    UNKNOWN_JOB_ID.to_string()
}

fn empty_input() -> Value {
    Value::Object(Default::default())
}

/// Run one job on its own task so a panic inside it cannot take the
/// worker down. A panicked job is reported as an `internal` failure.
///
/// When the job ends because `cancel` fired, a best-effort interrupt is
/// sent to the engine so the abandoned execution stops as well.
pub async fn run_job<S>(
    orchestrator: &Orchestrator,
    envelope: JobEnvelope,
    progress: S,
    cancel: CancellationToken,
) -> JobResult
where
    S: ProgressSink + 'static,
{
    let JobEnvelope { id, input } = envelope;
    let span = tracing::info_span!("job", job_id = %id);
    tracing::info!(parent: &span, "Processing job");

    let task = {
        let orchestrator = orchestrator.clone();
        let cancel = cancel.clone();
        tokio::spawn(
            async move { orchestrator.handle_input(input, &progress, &cancel).await }
                .instrument(span.clone()),
        )
    };

    let result = match task.await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!(parent: &span, error = %e, "Job task aborted");
            JobResult::failure(&JobError::Internal(panic_message(e)), Vec::new())
        }
    };

    if result.error_kind() == Some(ErrorKind::Cancelled) {
        orchestrator.engine().interrupt().await;
    }

    result
}

fn panic_message(err: JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    let payload = err.into_panic();
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "job panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use podbridge_comfyui::progress::NoProgress;

    use super::*;
    use crate::test_support::{self, FakeEngine};

    #[test]
    fn envelope_defaults() {
        let envelope: JobEnvelope = serde_json::from_value(json!({})).unwrap();
        assert_eq!(envelope.id, UNKNOWN_JOB_ID);
        assert_eq!(envelope.input, json!({}));
    }

    #[tokio::test]
    async fn panicking_job_becomes_internal_error() {
        let harness = test_support::Harness::new();
        let engine = Arc::new(FakeEngine::panicking());
        let orchestrator = harness.orchestrator(engine);

        let result = run_job(
            &orchestrator,
            test_support::direct_job("j1"),
            NoProgress,
            CancellationToken::new(),
        )
        .await;

        assert_eq!(result.error_kind(), Some(ErrorKind::Internal));
        let json = serde_json::to_value(&result).unwrap();
        assert!(json["error"].as_str().unwrap().contains("engine exploded"));
    }

    #[tokio::test]
    async fn cancelled_job_interrupts_engine() {
        let harness = test_support::Harness::new();
        let engine = Arc::new(FakeEngine::never_finishing());
        let orchestrator = harness.orchestrator(engine.clone());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = run_job(&orchestrator, test_support::direct_job("j1"), NoProgress, cancel).await;

        assert_eq!(result.error_kind(), Some(ErrorKind::Cancelled));
        assert_eq!(engine.interrupts(), 1);
    }
}
