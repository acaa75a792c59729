//! End-to-end job sequencing.
//!
//! [`Orchestrator::handle`] runs one job to completion:
//!
//! 1. check engine readiness
//! 2. resolve the graph (direct, or template load + `apply_template`)
//! 3. stage input images
//! 4. apply raw overrides, then point `LoadImage` nodes at staged files
//! 5. submit and wait, relaying progress
//! 6. enumerate and materialize outputs
//!
//! The first failure ends the job. Every failure comes back as the error
//! variant of [`JobResult`]; nothing escapes this boundary.
//!
//! Progress is reported on a fixed scale: 5 when queuing, 10-90 while the
//! engine executes, 95 while collecting outputs, 100 on completion.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use podbridge_comfyui::engine::Engine;
use podbridge_comfyui::progress::{ProgressSink, ScaledProgress};
use podbridge_comfyui::wait::{
    await_completion, WaitOptions, DEFAULT_POLL_INTERVAL, DEFAULT_WAIT_TIMEOUT,
};
use podbridge_core::graph::WorkflowGraph;
use podbridge_core::injection::{apply_template, inject_fields, rewrite_matching, InjectionReport};
use podbridge_core::templates::TemplateRegistry;

use crate::error::JobError;
use crate::inputs::{stage_inputs, InputMode, StagedInput};
use crate::outputs::{enumerate_artifacts, materialize, ArtifactRecord};
use crate::request::{JobRequest, JobResult, WorkflowSource};

/// Node type whose `image` field names an input file.
const LOAD_IMAGE_NODE: &str = "LoadImage";
const LOAD_IMAGE_FIELD: &str = "image";

const PROGRESS_QUEUED: u8 = 5;
const PROGRESS_EXECUTING: u8 = 10;
const PROGRESS_EXECUTION_SPAN: u8 = 80;
const PROGRESS_COLLECTING: u8 = 95;
const PROGRESS_COMPLETE: u8 = 100;

/// Filesystem locations and timing used for every job.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub workflow_dir: PathBuf,
    pub input_mode: InputMode,
    /// Wait budget for jobs that do not set their own.
    pub default_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("/workspace/input"),
            output_dir: PathBuf::from("/workspace/output"),
            workflow_dir: PathBuf::from("/workflows"),
            input_mode: InputMode::Filesystem,
            default_timeout: DEFAULT_WAIT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Runs jobs against one engine. Cheap to clone; holds no per-job state.
#[derive(Clone)]
pub struct Orchestrator {
    engine: Arc<dyn Engine>,
    templates: Arc<TemplateRegistry>,
    config: Arc<PipelineConfig>,
}

impl Orchestrator {
    pub fn new(engine: Arc<dyn Engine>, templates: TemplateRegistry, config: PipelineConfig) -> Self {
        Self {
            engine,
            templates: Arc::new(templates),
            config: Arc::new(config),
        }
    }

    pub fn engine(&self) -> &Arc<dyn Engine> {
        &self.engine
    }

    /// Parse a raw job input and run it.
    pub async fn handle_input(
        &self,
        input: Value,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> JobResult {
        match JobRequest::parse(input) {
            Ok(request) => self.handle(request, progress, cancel).await,
            Err(e) => {
                tracing::warn!(error = %e, "Rejected job input");
                JobResult::failure(&e, Vec::new())
            }
        }
    }

    /// Run one validated job to completion.
    pub async fn handle(
        &self,
        request: JobRequest,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> JobResult {
        let mut report = InjectionReport::default();

        match self.execute(request, progress, cancel, &mut report).await {
            Ok((prompt_id, outputs)) => {
                tracing::info!(
                    prompt_id = %prompt_id,
                    outputs = outputs.len(),
                    skipped = report.skipped.len(),
                    "Job completed",
                );
                JobResult::Success {
                    prompt_id,
                    outputs,
                    warnings: report.warnings(),
                }
            }
            Err(e) => {
                tracing::error!(error = %e, kind = ?e.kind(), "Job failed");
                JobResult::failure(&e, report.warnings())
            }
        }
    }

    async fn execute(
        &self,
        request: JobRequest,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
        report: &mut InjectionReport,
    ) -> Result<(String, Vec<ArtifactRecord>), JobError> {
        if !self.engine.probe_ready().await {
            return Err(JobError::EngineUnavailable);
        }

        let mut graph = self.resolve_graph(&request.source, report).await?;

        let staged = stage_inputs(
            &request.images,
            self.config.input_mode,
            &self.config.input_dir,
            self.engine.as_ref(),
        )
        .await?;

        if !request.overrides.is_empty() {
            report.merge(inject_fields(&mut graph, &request.overrides));
            tracing::info!(
                nodes = ?request.overrides.keys().collect::<Vec<_>>(),
                "Injected params",
            );
        }
        point_inputs_at_staged_files(&mut graph, &staged);

        if cancel.is_cancelled() {
            return Err(JobError::Cancelled);
        }

        report_progress(progress, PROGRESS_QUEUED, "Queuing workflow...");
        let prompt_id = self.engine.submit(&graph).await?;

        match self.engine.queue_status().await {
            Ok(queue) => tracing::info!(
                prompt_id = %prompt_id,
                running = queue.running(),
                pending = queue.pending(),
                "Queue status after submission",
            ),
            Err(e) => tracing::debug!(error = %e, "Queue status unavailable"),
        }

        report_progress(progress, PROGRESS_EXECUTING, "Executing workflow...");
        let options = WaitOptions {
            timeout: request.timeout.unwrap_or(self.config.default_timeout),
            poll_interval: self.config.poll_interval,
        };
        let scaled = ScaledProgress::new(progress, PROGRESS_EXECUTING, PROGRESS_EXECUTION_SPAN);
        let entry =
            await_completion(self.engine.as_ref(), &prompt_id, &options, &scaled, cancel).await?;

        report_progress(progress, PROGRESS_COLLECTING, "Collecting outputs...");
        let refs = enumerate_artifacts(&entry);
        if refs.is_empty() {
            return Err(JobError::NoOutputs);
        }
        let outputs = materialize(&refs, &self.config.output_dir).await?;
        if outputs.is_empty() {
            return Err(JobError::UnreadableOutputs { count: refs.len() });
        }

        report_progress(progress, PROGRESS_COMPLETE, "Complete");
        Ok((prompt_id, outputs))
    }

    async fn resolve_graph(
        &self,
        source: &WorkflowSource,
        report: &mut InjectionReport,
    ) -> Result<WorkflowGraph, JobError> {
        match source {
            WorkflowSource::Direct(graph) => {
                tracing::info!(nodes = graph.len(), "Using direct workflow from input");
                Ok(graph.clone())
            }
            WorkflowSource::Template { name, params } => {
                let template = self.templates.get(name).ok_or_else(|| JobError::UnknownTemplate {
                    name: name.clone(),
                    available: self.templates.names().join(", "),
                })?;

                let mut graph = template.load_graph(&self.config.workflow_dir).await?;
                tracing::info!(template = %name, nodes = graph.len(), "Loaded template");

                report.merge(apply_template(&mut graph, template, params));
                Ok(graph)
            }
        }
    }
}

fn point_inputs_at_staged_files(graph: &mut WorkflowGraph, staged: &[StagedInput]) {
    for input in staged {
        let changed = rewrite_matching(
            graph,
            LOAD_IMAGE_NODE,
            LOAD_IMAGE_FIELD,
            &Value::String(input.name.clone()),
            &Value::String(input.filename.clone()),
        );
        tracing::debug!(name = %input.name, nodes = changed, "Pointed image inputs at staged file");
    }
}

fn report_progress(progress: &dyn ProgressSink, percent: u8, message: &str) {
    if let Err(e) = progress.report(percent, message) {
        tracing::warn!(error = %e, "Failed to send progress update");
    }
}
