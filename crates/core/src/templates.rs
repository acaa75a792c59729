//! Workflow template registry.
//!
//! A template pairs a pre-authored graph file with a table that maps
//! simplified parameter names (`prompt`, `width`, `seed`, ...) to the
//! `(node address, input field)` they control. Callers pick a template by
//! name and never need to know node addressing.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::error::CoreError;
use crate::graph::WorkflowGraph;

// ---------------------------------------------------------------------------
// Built-in template names
// ---------------------------------------------------------------------------

/// Text to video.
pub const TEMPLATE_T2V: &str = "t2v";
/// Image to video.
pub const TEMPLATE_I2V: &str = "i2v";
/// Canny edge map to video.
pub const TEMPLATE_CANNY: &str = "canny";
/// Depth map to video.
pub const TEMPLATE_DEPTH: &str = "depth";

// ---------------------------------------------------------------------------
// Data structures
// ---------------------------------------------------------------------------

/// Where a simplified parameter lands in the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamTarget {
    pub node_id: String,
    pub field: String,
}

impl ParamTarget {
    pub fn new(node_id: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            field: field.into(),
        }
    }
}

/// A named graph file plus its simplified-parameter mapping table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateDefinition {
    pub name: String,
    /// Graph file name, relative to the workflow directory.
    pub file: String,
    /// Simplified parameter name to graph location, in application order.
    pub mapping: IndexMap<String, ParamTarget>,
}

impl TemplateDefinition {
    pub fn new(name: impl Into<String>, file: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            file: file.into(),
            mapping: IndexMap::new(),
        }
    }

    /// Add a `param -> node.field` row to the mapping table.
    pub fn map(mut self, param: &str, node_id: &str, field: &str) -> Self {
        self.mapping
            .insert(param.to_string(), ParamTarget::new(node_id, field));
        self
    }

    /// Absolute path of the graph file under `workflow_dir`.
    pub fn path(&self, workflow_dir: &Path) -> PathBuf {
        workflow_dir.join(&self.file)
    }

    /// Load the template graph from `workflow_dir`.
    ///
    /// A missing file is reported as [`CoreError::NotFound`] so callers can
    /// surface it as a validation problem rather than an I/O fault.
    pub async fn load_graph(&self, workflow_dir: &Path) -> Result<WorkflowGraph, CoreError> {
        let path = self.path(workflow_dir);
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(CoreError::NotFound {
                entity: "Workflow file",
                name: path.display().to_string(),
            });
        }
        WorkflowGraph::load(&path).await
    }
}

/// Read-only lookup table of templates by name.
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    templates: IndexMap<String, TemplateDefinition>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The LTX-2 video templates shipped with the worker image.
    pub fn builtin() -> Self {
        let mut registry = Self::new();

        registry.insert(
            TemplateDefinition::new(TEMPLATE_T2V, "LTX2_T2V.json")
                .map("width", "43", "width")
                .map("height", "43", "height")
                .map("frames", "27", "int")
                .map("prompt", "6", "text")
                .map("negative_prompt", "7", "text")
                .map("seed", "31", "seed")
                .map("steps", "31", "steps")
                .map("cfg", "31", "cfg"),
        );
        registry.insert(
            TemplateDefinition::new(TEMPLATE_I2V, "LTX2_I2V.json")
                .map("width", "43", "width")
                .map("height", "43", "height")
                .map("frames", "27", "int")
                .map("prompt", "6", "text")
                .map("seed", "31", "seed"),
        );
        registry.insert(
            TemplateDefinition::new(TEMPLATE_CANNY, "LTX2_canny_to_video.json")
                .map("width", "43", "width")
                .map("height", "43", "height")
                .map("prompt", "6", "text"),
        );
        registry.insert(
            TemplateDefinition::new(TEMPLATE_DEPTH, "LTX2_depth_to_video.json")
                .map("width", "43", "width")
                .map("height", "43", "height")
                .map("prompt", "6", "text"),
        );

        registry
    }

    pub fn insert(&mut self, template: TemplateDefinition) {
        self.templates.insert(template.name.clone(), template);
    }

    pub fn get(&self, name: &str) -> Option<&TemplateDefinition> {
        self.templates.get(name)
    }

    /// Template names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.templates.keys().map(String::as_str).collect()
    }
}
