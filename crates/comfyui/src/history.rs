//! Typed ComfyUI response bodies.
//!
//! The most important one is [`HistoryEntry`], the result descriptor that
//! `GET /history/{prompt_id}` returns once the engine has recorded an
//! execution. It is polled until it carries either an error status or a
//! non-empty `outputs` map.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `status_str` value ComfyUI uses for failed executions.
pub const STATUS_ERROR: &str = "error";

/// Response of `POST /prompt`.
///
/// `prompt_id` is optional here so that a 2xx body without one can be
/// reported as a malformed response instead of a decode failure.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitResponse {
    /// Server-assigned identifier for the queued prompt.
    #[serde(default)]
    pub prompt_id: Option<String>,
    /// Position in the execution queue.
    #[serde(default)]
    pub number: Option<i64>,
    /// Per-node validation errors (usually empty on success).
    #[serde(default)]
    pub node_errors: Value,
}

/// One execution's record from `GET /history/{prompt_id}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Producing node address to that node's output descriptors.
    #[serde(default)]
    pub outputs: IndexMap<String, NodeOutput>,
    #[serde(default)]
    pub status: Option<ExecutionStatus>,
}

impl HistoryEntry {
    /// Whether the engine marked this execution as failed.
    pub fn is_error(&self) -> bool {
        self.status
            .as_ref()
            .is_some_and(|s| s.status_str == STATUS_ERROR)
    }

    /// Whether any node has reported output yet.
    pub fn has_outputs(&self) -> bool {
        !self.outputs.is_empty()
    }

    /// Engine status messages, empty when no status was reported.
    pub fn messages(&self) -> Vec<Value> {
        self.status
            .as_ref()
            .map(|s| s.messages.clone())
            .unwrap_or_default()
    }
}

/// The `status` block of a history entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStatus {
    /// `"success"` or `"error"`.
    #[serde(default)]
    pub status_str: String,
    #[serde(default)]
    pub completed: bool,
    /// `[kind, payload]` pairs describing execution events.
    #[serde(default)]
    pub messages: Vec<Value>,
}

/// Everything one node wrote during an execution.
///
/// Still images arrive under `images`. Video collections arrive under the
/// legacy `gifs` key regardless of their actual container format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeOutput {
    #[serde(default)]
    pub images: Vec<OutputFile>,
    #[serde(default)]
    pub gifs: Vec<OutputFile>,
    /// Other output kinds (text, latents, ...), not interpreted here.
    #[serde(flatten)]
    pub other: IndexMap<String, Value>,
}

/// A file reference inside a node output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputFile {
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub subfolder: String,
    /// Engine folder kind: `output`, `temp` or `input`.
    #[serde(default, rename = "type")]
    pub folder_type: Option<String>,
}

/// Response of `GET /queue`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueueStatus {
    #[serde(default)]
    pub queue_running: Vec<Value>,
    #[serde(default)]
    pub queue_pending: Vec<Value>,
}

impl QueueStatus {
    pub fn running(&self) -> usize {
        self.queue_running.len()
    }

    pub fn pending(&self) -> usize {
        self.queue_pending.len()
    }
}

/// Response of `GET /system_stats`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SystemStats {
    #[serde(default)]
    pub system: Value,
    #[serde(default)]
    pub devices: Vec<Value>,
}

/// Response of `POST /upload/image`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadResponse {
    /// Final filename (the engine may rename on collision).
    pub name: String,
    #[serde(default)]
    pub subfolder: String,
    #[serde(default, rename = "type")]
    pub folder_type: String,
}
