//! REST API client for the ComfyUI HTTP endpoints.
//!
//! Wraps the ComfyUI HTTP API (readiness, workflow submission, history
//! retrieval, queue inspection, interruption, input upload) using
//! [`reqwest`].

use std::time::Duration;

use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;

use podbridge_core::graph::WorkflowGraph;

use crate::error::EngineError;
use crate::history::{HistoryEntry, QueueStatus, SubmitResponse, SystemStats, UploadResponse};

/// Timeout for readiness probes. Kept well below the general request
/// timeout so a dead engine is detected quickly.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default timeout for every other request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest response body excerpt kept in error messages.
const MAX_BODY_EXCERPT: usize = 512;

/// HTTP client for a single ComfyUI instance.
#[derive(Debug, Clone)]
pub struct ComfyUIApi {
    client: reqwest::Client,
    api_url: String,
    request_timeout: Duration,
}

impl ComfyUIApi {
    /// Create a new API client for a ComfyUI instance.
    ///
    /// * `api_url` - Base HTTP URL, e.g. `http://host:8188`.
    pub fn new(api_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), api_url)
    }

    /// Create an API client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, api_url: impl Into<String>) -> Self {
        let api_url: String = api_url.into();
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Client for `http://{host}:{port}`.
    pub fn from_host_port(host: &str, port: u16) -> Self {
        Self::new(format!("http://{host}:{port}"))
    }

    /// Override the per-request timeout used for everything but probes.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Base HTTP URL (e.g. `http://host:8188`).
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Single readiness check against `GET /system_stats`.
    ///
    /// Never fails: any transport error, timeout, or non-2xx status is
    /// reported as `false`.
    pub async fn is_ready(&self) -> bool {
        let result = self
            .client
            .get(self.url("/system_stats"))
            .timeout(PROBE_TIMEOUT)
            .send()
            .await;

        match result {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!(error = %e, "ComfyUI readiness probe failed");
                false
            }
        }
    }

    /// Retrieve system statistics (devices, VRAM, versions).
    pub async fn system_stats(&self) -> Result<SystemStats, EngineError> {
        let response = self
            .client
            .get(self.url("/system_stats"))
            .timeout(self.request_timeout)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Submit a workflow for execution.
    ///
    /// Sends a `POST /prompt` request with the given workflow and a fresh
    /// client ID. Returns the server-assigned `prompt_id` and queue
    /// position.
    pub async fn submit_workflow(
        &self,
        workflow: &WorkflowGraph,
    ) -> Result<(String, Option<i64>), EngineError> {
        let client_id = uuid::Uuid::new_v4().to_string();
        let body = serde_json::json!({
            "prompt": workflow,
            "client_id": client_id,
        });

        let response = self
            .client
            .post(self.url("/prompt"))
            .timeout(self.request_timeout)
            .json(&body)
            .send()
            .await?;

        let submitted: SubmitResponse = Self::parse_response(response).await?;
        match submitted.prompt_id {
            Some(prompt_id) if !prompt_id.is_empty() => Ok((prompt_id, submitted.number)),
            _ => Err(EngineError::MalformedResponse(format!(
                "No prompt_id in response (node_errors: {})",
                submitted.node_errors
            ))),
        }
    }

    /// Retrieve execution history for a specific prompt.
    ///
    /// Sends a `GET /history/{prompt_id}` request. Returns `Ok(None)` while
    /// the engine has no record of the prompt (queued or still running).
    pub async fn get_history(&self, prompt_id: &str) -> Result<Option<HistoryEntry>, EngineError> {
        let response = self
            .client
            .get(self.url(&format!("/history/{prompt_id}")))
            .timeout(self.request_timeout)
            .send()
            .await?;

        let mut history: indexmap::IndexMap<String, HistoryEntry> =
            Self::parse_response(response).await?;
        Ok(history.shift_remove(prompt_id))
    }

    /// Current queue state (`GET /queue`).
    pub async fn get_queue(&self) -> Result<QueueStatus, EngineError> {
        let response = self
            .client
            .get(self.url("/queue"))
            .timeout(self.request_timeout)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Interrupt the currently running execution immediately.
    ///
    /// Sends a `POST /interrupt` request. This does not target a specific
    /// prompt -- it interrupts whatever is executing right now.
    pub async fn interrupt(&self) -> Result<(), EngineError> {
        let response = self
            .client
            .post(self.url("/interrupt"))
            .timeout(self.request_timeout)
            .send()
            .await?;

        Self::check_status(response).await
    }

    /// Upload an input image into the engine's input directory.
    ///
    /// Sends a multipart `POST /upload/image` with the file bytes, the
    /// destination subfolder and the `input` folder type.
    pub async fn upload_image(
        &self,
        data: Vec<u8>,
        filename: &str,
        subfolder: &str,
    ) -> Result<UploadResponse, EngineError> {
        let form = Form::new()
            .part("image", Part::bytes(data).file_name(filename.to_string()))
            .text("subfolder", subfolder.to_string())
            .text("type", "input");

        let response = self
            .client
            .post(self.url("/upload/image"))
            .timeout(self.request_timeout)
            .multipart(form)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    // ---- private helpers ----

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or an [`EngineError::ApiError`]
    /// containing the status and body text on failure.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, EngineError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(EngineError::ApiError {
                status: status.as_u16(),
                body: excerpt(&body),
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    ///
    /// Decode failures become [`EngineError::MalformedResponse`] rather than
    /// transport errors.
    async fn parse_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, EngineError> {
        let response = Self::ensure_success(response).await?;
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| {
            EngineError::MalformedResponse(format!(
                "{e} (body: {})",
                excerpt(&String::from_utf8_lossy(&bytes))
            ))
        })
    }

    /// Assert the response has a success status code, discarding the body.
    async fn check_status(response: reqwest::Response) -> Result<(), EngineError> {
        Self::ensure_success(response).await?;
        Ok(())
    }
}

fn excerpt(body: &str) -> String {
    if body.len() <= MAX_BODY_EXCERPT {
        return body.to_string();
    }
    let mut end = MAX_BODY_EXCERPT;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}
