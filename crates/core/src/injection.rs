//! Parameter injection into workflow graphs.
//!
//! Two entry points share one merge primitive ([`set_field`]):
//!
//! - [`inject_fields`] takes raw `node address -> field -> value` overrides.
//! - [`apply_template`] takes simplified parameters (`prompt`, `width`, ...)
//!   and routes them through a template's mapping table.
//!
//! Assignments that target a node address absent from the graph are skipped
//! and recorded in the returned [`InjectionReport`]; they never fail the call.

use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use crate::graph::WorkflowGraph;
use crate::resolution::{resolve_preset, HEIGHT_PARAM, RESOLUTION_PARAM, WIDTH_PARAM};
use crate::templates::TemplateDefinition;

/// Raw overrides: node address to a map of field name to value.
pub type FieldOverrides = IndexMap<String, IndexMap<String, Value>>;

/// Simplified, user-facing parameters keyed by name.
pub type SimplifiedParams = IndexMap<String, Value>;

/// An assignment that could not be applied because its node is missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedAssignment {
    pub node_id: String,
    pub field: String,
    /// Simplified parameter that produced the assignment, for template runs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
}

impl fmt::Display for SkippedAssignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.param {
            Some(param) => write!(
                f,
                "Node {} not found for param {} ({}.{})",
                self.node_id, param, self.node_id, self.field
            ),
            None => write!(
                f,
                "Node {} not found for override {}.{}",
                self.node_id, self.node_id, self.field
            ),
        }
    }
}

/// Outcome of an injection pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InjectionReport {
    /// Number of fields written.
    pub applied: usize,
    /// Assignments dropped because their node address does not exist.
    pub skipped: Vec<SkippedAssignment>,
    /// A `resolution` value that matched no preset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unknown_preset: Option<String>,
}

impl InjectionReport {
    /// Fold another report into this one.
    pub fn merge(&mut self, other: InjectionReport) {
        self.applied += other.applied;
        self.skipped.extend(other.skipped);
        if self.unknown_preset.is_none() {
            self.unknown_preset = other.unknown_preset;
        }
    }

    /// Distinct skipped node addresses, in first-seen order.
    pub fn skipped_nodes(&self) -> Vec<&str> {
        let mut nodes: Vec<&str> = Vec::new();
        for skip in &self.skipped {
            if !nodes.contains(&skip.node_id.as_str()) {
                nodes.push(&skip.node_id);
            }
        }
        nodes
    }

    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty() && self.unknown_preset.is_none()
    }

    /// Human-readable warnings suitable for a job response.
    pub fn warnings(&self) -> Vec<String> {
        let mut out: Vec<String> = self.skipped.iter().map(ToString::to_string).collect();
        if let Some(name) = &self.unknown_preset {
            out.push(format!("Unknown resolution preset '{name}' ignored"));
        }
        out
    }
}

/// Set one field on one node, creating the node's input map if needed.
///
/// Returns `false` (and leaves the graph untouched) when `node_id` does not
/// exist. This is the single definition of "set a field on a node".
pub fn set_field(graph: &mut WorkflowGraph, node_id: &str, field: &str, value: Value) -> bool {
    match graph.node_mut(node_id) {
        Some(node) => {
            node.inputs_mut().insert(field.to_string(), value);
            true
        }
        None => false,
    }
}

/// Merge raw per-node field overrides into the graph.
pub fn inject_fields(graph: &mut WorkflowGraph, overrides: &FieldOverrides) -> InjectionReport {
    let mut report = InjectionReport::default();

    for (node_id, fields) in overrides {
        if !graph.contains(node_id) {
            tracing::warn!(node_id = %node_id, "Node not found in workflow, skipping override");
            report
                .skipped
                .extend(fields.keys().map(|field| SkippedAssignment {
                    node_id: node_id.clone(),
                    field: field.clone(),
                    param: None,
                }));
            continue;
        }

        for (field, value) in fields {
            set_field(graph, node_id, field, value.clone());
            report.applied += 1;
        }
        tracing::debug!(node_id = %node_id, fields = fields.len(), "Injected overrides");
    }

    report
}

/// Route simplified parameters through a template's mapping table.
///
/// A `resolution` preset is expanded into `width`/`height` first. The
/// mapping loop then runs over the expanded set, and explicit `width` or
/// `height` keys in `params` are applied after the preset values, so an
/// explicit dimension overrides the preset one.
///
/// Parameters without a row in the mapping table are ignored.
pub fn apply_template(
    graph: &mut WorkflowGraph,
    template: &TemplateDefinition,
    params: &SimplifiedParams,
) -> InjectionReport {
    let mut report = InjectionReport::default();
    let mut effective = SimplifiedParams::new();

    if let Some(resolution) = params.get(RESOLUTION_PARAM) {
        let name = preset_name(resolution);
        match resolve_preset(&name) {
            Some((width, height)) => {
                effective.insert(WIDTH_PARAM.to_string(), Value::from(width));
                effective.insert(HEIGHT_PARAM.to_string(), Value::from(height));
                tracing::info!(
                    preset = %name,
                    width,
                    height,
                    "Applied resolution preset",
                );
            }
            None => {
                tracing::warn!(preset = %name, "Unknown resolution preset, ignoring");
                report.unknown_preset = Some(name);
            }
        }
    }

    for (name, value) in params {
        if name != RESOLUTION_PARAM {
            effective.insert(name.clone(), value.clone());
        }
    }

    for (param, target) in &template.mapping {
        let Some(value) = effective.get(param) else {
            continue;
        };

        if set_field(graph, &target.node_id, &target.field, value.clone()) {
            report.applied += 1;
            tracing::info!(
                template = %template.name,
                param = %param,
                node_id = %target.node_id,
                field = %target.field,
                "Set template parameter",
            );
        } else {
            tracing::warn!(
                template = %template.name,
                param = %param,
                node_id = %target.node_id,
                "Node not found for template parameter",
            );
            report.skipped.push(SkippedAssignment {
                node_id: target.node_id.clone(),
                field: target.field.clone(),
                param: Some(param.clone()),
            });
        }
    }

    report
}

/// Rewrite `field` on every node of `class_type` whose current value equals
/// `from`. Returns how many nodes were changed.
pub fn rewrite_matching(
    graph: &mut WorkflowGraph,
    class_type: &str,
    field: &str,
    from: &Value,
    to: &Value,
) -> usize {
    let mut changed = 0;
    for (node_id, node) in graph.iter_mut() {
        if node.class_type != class_type || node.input(field) != Some(from) {
            continue;
        }
        node.inputs_mut().insert(field.to_string(), to.clone());
        tracing::debug!(node_id = %node_id, field = %field, "Rewrote matching node input");
        changed += 1;
    }
    changed
}

fn preset_name(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        // Square presets are commonly sent as bare numbers (`"resolution": 768`).
        other => other.to_string(),
    }
}
