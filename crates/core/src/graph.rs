//! Workflow graph model.
//!
//! A workflow is the API-format JSON that the generation engine accepts: an
//! object keyed by node address, where each node carries a `class_type` and
//! an `inputs` map. [`WorkflowGraph`] keeps the nodes in an ordered map so
//! iteration follows the order of the source document rather than hash order.
//!
//! The bridge never invents node addresses. Nodes are only looked up by
//! address, or by a `(class_type, field value)` pattern.

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;

/// Field name to value map holding one node's inputs.
pub type NodeInputs = IndexMap<String, Value>;

/// A single node of a workflow graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowNode {
    /// Engine node type, e.g. `CLIPTextEncode` or `LoadImage`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub class_type: String,

    /// Input fields. `None` when the source document had no `inputs` key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputs: Option<NodeInputs>,

    /// Any other keys (`_meta`, editor hints) passed through untouched.
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

impl WorkflowNode {
    pub fn new(class_type: impl Into<String>) -> Self {
        Self {
            class_type: class_type.into(),
            inputs: None,
            extra: IndexMap::new(),
        }
    }

    /// Builder-style helper used mostly by tests and fixtures.
    pub fn with_input(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.inputs_mut().insert(field.into(), value.into());
        self
    }

    /// Read a single input field.
    pub fn input(&self, field: &str) -> Option<&Value> {
        self.inputs.as_ref().and_then(|inputs| inputs.get(field))
    }

    /// Mutable access to the input map, creating it when absent.
    pub fn inputs_mut(&mut self) -> &mut NodeInputs {
        self.inputs.get_or_insert_with(NodeInputs::new)
    }
}

/// An ordered mapping from node address to [`WorkflowNode`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowGraph {
    nodes: IndexMap<String, WorkflowNode>,
}

impl WorkflowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a graph from its JSON text.
    pub fn from_json(text: &str) -> Result<Self, CoreError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Convert an already-parsed JSON value (e.g. from a job payload).
    pub fn from_value(value: Value) -> Result<Self, CoreError> {
        if !value.is_object() {
            return Err(CoreError::Validation(
                "Workflow must be a JSON object keyed by node id".to_string(),
            ));
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Load a graph from a JSON file on disk.
    pub async fn load(path: &Path) -> Result<Self, CoreError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| CoreError::io(path, e))?;
        Self::from_json(&text)
    }

    pub fn insert(&mut self, node_id: impl Into<String>, node: WorkflowNode) {
        self.nodes.insert(node_id.into(), node);
    }

    pub fn node(&self, node_id: &str) -> Option<&WorkflowNode> {
        self.nodes.get(node_id)
    }

    pub fn node_mut(&mut self, node_id: &str) -> Option<&mut WorkflowNode> {
        self.nodes.get_mut(node_id)
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.nodes.contains_key(node_id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate nodes in document order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &WorkflowNode)> {
        self.nodes.iter().map(|(id, node)| (id.as_str(), node))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut WorkflowNode)> {
        self.nodes.iter_mut().map(|(id, node)| (id.as_str(), node))
    }

    /// Serialize back into the JSON shape the engine expects.
    pub fn to_value(&self) -> Value {
        // A map of plain serde types cannot fail to serialize.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
