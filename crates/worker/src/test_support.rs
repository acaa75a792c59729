//! Shared fixtures for the worker's unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use podbridge_comfyui::engine::Engine;
use podbridge_comfyui::error::EngineError;
use podbridge_comfyui::history::{HistoryEntry, QueueStatus, UploadResponse};
use podbridge_core::graph::WorkflowGraph;
use podbridge_core::templates::TemplateRegistry;
use podbridge_pipeline::inputs::InputMode;
use podbridge_pipeline::orchestrator::{Orchestrator, PipelineConfig};

use crate::job::JobEnvelope;

/// Filename every completed fake execution reports.
pub const OUTPUT_FILE: &str = "result.png";

#[derive(Clone, Copy)]
enum Behaviour {
    Completes,
    NeverFinishes,
    Panics,
}

pub struct FakeEngine {
    ready: bool,
    behaviour: Behaviour,
    submits: AtomicUsize,
    interrupts: AtomicUsize,
}

impl FakeEngine {
    fn with(behaviour: Behaviour) -> Self {
        Self {
            ready: true,
            behaviour,
            submits: AtomicUsize::new(0),
            interrupts: AtomicUsize::new(0),
        }
    }

    pub fn completing() -> Self {
        Self::with(Behaviour::Completes)
    }

    pub fn never_finishing() -> Self {
        Self::with(Behaviour::NeverFinishes)
    }

    pub fn panicking() -> Self {
        Self::with(Behaviour::Panics)
    }

    pub fn offline() -> Self {
        Self {
            ready: false,
            ..Self::completing()
        }
    }

    pub fn submits(&self) -> usize {
        self.submits.load(Ordering::SeqCst)
    }

    pub fn interrupts(&self) -> usize {
        self.interrupts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Engine for FakeEngine {
    async fn probe_ready(&self) -> bool {
        self.ready
    }

    async fn submit(&self, _graph: &WorkflowGraph) -> Result<String, EngineError> {
        self.submits.fetch_add(1, Ordering::SeqCst);
        if let Behaviour::Panics = self.behaviour {
            panic!("engine exploded");
        }
        Ok("prompt-1".to_string())
    }

    async fn poll_result(&self, _prompt_id: &str) -> Option<HistoryEntry> {
        match self.behaviour {
            Behaviour::Completes => Some(
                serde_json::from_value(json!({
                    "outputs": {"9": {"images": [{"filename": OUTPUT_FILE, "subfolder": ""}]}}
                }))
                .unwrap(),
            ),
            Behaviour::NeverFinishes | Behaviour::Panics => None,
        }
    }

    async fn interrupt(&self) -> bool {
        self.interrupts.fetch_add(1, Ordering::SeqCst);
        true
    }

    async fn queue_status(&self) -> Result<QueueStatus, EngineError> {
        Ok(QueueStatus::default())
    }

    async fn upload_input(
        &self,
        _data: Vec<u8>,
        filename: &str,
        subfolder: &str,
    ) -> Result<UploadResponse, EngineError> {
        Ok(UploadResponse {
            name: filename.to_string(),
            subfolder: subfolder.to_string(),
            folder_type: "input".to_string(),
        })
    }
}

/// Temporary directories with one pre-written output file.
pub struct Harness {
    _dir: tempfile::TempDir,
    config: PipelineConfig,
}

impl Harness {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig {
            input_dir: dir.path().join("input"),
            output_dir: dir.path().join("output"),
            workflow_dir: dir.path().join("workflows"),
            input_mode: InputMode::Filesystem,
            default_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(10),
        };
        std::fs::create_dir_all(&config.output_dir).unwrap();
        std::fs::write(config.output_dir.join(OUTPUT_FILE), b"png").unwrap();
        Self { _dir: dir, config }
    }

    pub fn orchestrator(&self, engine: Arc<FakeEngine>) -> Orchestrator {
        Orchestrator::new(engine, TemplateRegistry::builtin(), self.config.clone())
    }
}

/// A direct-mode job with a one-node graph.
pub fn direct_job(id: &str) -> JobEnvelope {
    JobEnvelope {
        id: id.to_string(),
        input: json!({
            "workflow": {"9": {"class_type": "SaveImage", "inputs": {"filename_prefix": "out"}}}
        }),
    }
}
