//! The seam between the job pipeline and a generation engine.
//!
//! [`Engine`] exposes the primitive operations the pipeline needs. The
//! wait loops in [`crate::wait`] are built only from these primitives, so
//! a fake implementation is enough to exercise the full pipeline without
//! a running engine.

use async_trait::async_trait;

use podbridge_core::graph::WorkflowGraph;

use crate::api::ComfyUIApi;
use crate::error::EngineError;
use crate::history::{HistoryEntry, QueueStatus, UploadResponse};

#[async_trait]
pub trait Engine: Send + Sync {
    /// Best-effort health check. Never fails; transport problems are `false`.
    async fn probe_ready(&self) -> bool;

    /// Submit a graph and return its execution handle (`prompt_id`).
    async fn submit(&self, graph: &WorkflowGraph) -> Result<String, EngineError>;

    /// Single non-blocking result check.
    ///
    /// `None` means the engine has no record yet, or the poll itself failed;
    /// both are retried on the next tick by the caller.
    async fn poll_result(&self, prompt_id: &str) -> Option<HistoryEntry>;

    /// Best-effort interruption of whatever is executing. `false` on failure.
    async fn interrupt(&self) -> bool;

    /// Queue depth, used for diagnostics after submission.
    async fn queue_status(&self) -> Result<QueueStatus, EngineError>;

    /// Push an input file through the engine's upload endpoint.
    async fn upload_input(
        &self,
        data: Vec<u8>,
        filename: &str,
        subfolder: &str,
    ) -> Result<UploadResponse, EngineError>;
}

#[async_trait]
impl Engine for ComfyUIApi {
    async fn probe_ready(&self) -> bool {
        self.is_ready().await
    }

    async fn submit(&self, graph: &WorkflowGraph) -> Result<String, EngineError> {
        let (prompt_id, number) = self.submit_workflow(graph).await?;
        tracing::info!(
            prompt_id = %prompt_id,
            queue_number = ?number,
            nodes = graph.len(),
            "Workflow submitted to ComfyUI",
        );
        Ok(prompt_id)
    }

    async fn poll_result(&self, prompt_id: &str) -> Option<HistoryEntry> {
        match self.get_history(prompt_id).await {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(prompt_id = %prompt_id, error = %e, "Failed to get history");
                None
            }
        }
    }

    async fn interrupt(&self) -> bool {
        match ComfyUIApi::interrupt(self).await {
            Ok(()) => {
                tracing::info!("Interrupt sent to ComfyUI");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to interrupt ComfyUI");
                false
            }
        }
    }

    async fn queue_status(&self) -> Result<QueueStatus, EngineError> {
        self.get_queue().await
    }

    async fn upload_input(
        &self,
        data: Vec<u8>,
        filename: &str,
        subfolder: &str,
    ) -> Result<UploadResponse, EngineError> {
        let size_bytes = data.len();
        let uploaded = self.upload_image(data, filename, subfolder).await?;
        tracing::info!(
            filename = %uploaded.name,
            subfolder = %uploaded.subfolder,
            size_bytes,
            "Uploaded input image",
        );
        Ok(uploaded)
    }
}
