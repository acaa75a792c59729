//! Job request and result types.
//!
//! The platform sends a loosely shaped JSON object. [`JobInput`] mirrors
//! that object field for field, and [`JobRequest::parse`] turns it into a
//! validated, tagged request. Nothing past this module sees raw JSON.

use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use podbridge_core::codec;
use podbridge_core::graph::WorkflowGraph;
use podbridge_core::injection::{FieldOverrides, SimplifiedParams};

use crate::error::{ErrorKind, JobError};
use crate::outputs::ArtifactRecord;

/// Raw job input as received from the platform.
///
/// Keys other than the ones named here (`prompt`, `width`, `resolution`, ...)
/// are collected into `extra` and treated as simplified template parameters.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct JobInput {
    /// Full engine graph (direct mode).
    #[serde(default)]
    pub workflow: Option<Value>,

    /// Template name (template mode). Ignored when `workflow` is present.
    #[serde(default)]
    #[validate(length(min = 1, message = "template name must not be empty"))]
    pub template: Option<String>,

    /// Raw `node address -> field -> value` overrides, applied in both modes.
    #[serde(default)]
    pub params: FieldOverrides,

    /// Logical input name to base64 image payload.
    #[serde(default)]
    pub images: IndexMap<String, String>,

    /// Wait budget in seconds. Fractions round up to the next whole second.
    #[serde(default)]
    #[validate(range(
        exclusive_min = 0.0,
        max = 86400.0,
        message = "timeout must be positive and at most 86400 seconds"
    ))]
    pub timeout: Option<f64>,

    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

/// Where the job's graph comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowSource {
    /// A complete graph supplied by the caller.
    Direct(WorkflowGraph),
    /// A named template plus simplified parameters to route through it.
    Template {
        name: String,
        params: SimplifiedParams,
    },
}

/// A validated job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRequest {
    pub source: WorkflowSource,
    pub overrides: FieldOverrides,
    /// Decoded input images by logical name. Empty payloads are dropped.
    pub images: IndexMap<String, Vec<u8>>,
    /// Wait budget; `None` means the worker default.
    pub timeout: Option<Duration>,
}

impl JobRequest {
    /// Deserialize, validate and decode a raw job input.
    pub fn parse(input: Value) -> Result<Self, JobError> {
        let input: JobInput =
            serde_json::from_value(input).map_err(|e| JobError::InvalidInput(e.to_string()))?;
        Self::try_from(input)
    }
}

impl TryFrom<JobInput> for JobRequest {
    type Error = JobError;

    fn try_from(input: JobInput) -> Result<Self, Self::Error> {
        input
            .validate()
            .map_err(|e| JobError::InvalidInput(e.to_string()))?;

        let source = match (input.workflow, input.template) {
            (Some(workflow), _) => WorkflowSource::Direct(WorkflowGraph::from_value(workflow)?),
            (None, Some(name)) => WorkflowSource::Template {
                name,
                params: input.extra,
            },
            (None, None) => return Err(JobError::MissingWorkflow),
        };

        let mut images = IndexMap::with_capacity(input.images.len());
        for (name, payload) in input.images {
            if payload.trim().is_empty() {
                continue;
            }
            let bytes = codec::decode(&payload)
                .map_err(|e| JobError::InvalidInput(format!("image '{name}': {e}")))?;
            images.insert(name, bytes);
        }

        Ok(Self {
            source,
            overrides: input.params,
            images,
            timeout: input.timeout.map(|secs| Duration::from_secs(secs.ceil() as u64)),
        })
    }
}

/// The single response produced for every job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobResult {
    Success {
        prompt_id: String,
        outputs: Vec<ArtifactRecord>,
        /// Injection assignments that targeted missing nodes.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        warnings: Vec<String>,
    },
    Error {
        error_kind: ErrorKind,
        error: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        warnings: Vec<String>,
    },
}

impl JobResult {
    pub fn failure(err: &JobError, warnings: Vec<String>) -> Self {
        JobResult::Error {
            error_kind: err.kind(),
            error: err.to_string(),
            warnings,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, JobResult::Success { .. })
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            JobResult::Success { .. } => None,
            JobResult::Error { error_kind, .. } => Some(*error_kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;
    use crate::outputs::ArtifactKind;

    // -- parse --

    #[test]
    fn template_mode_collects_simplified_params() {
        let request = JobRequest::parse(json!({
            "template": "t2v",
            "prompt": "a cat",
            "resolution": "720p",
            "seed": 7,
            "timeout": 120
        }))
        .unwrap();

        assert_matches!(&request.source, WorkflowSource::Template { name, params } => {
            assert_eq!(name, "t2v");
            assert_eq!(params["prompt"], json!("a cat"));
            assert_eq!(params["resolution"], json!("720p"));
            assert_eq!(params["seed"], json!(7));
            assert!(!params.contains_key("timeout"));
        });
        assert_eq!(request.timeout, Some(Duration::from_secs(120)));
    }

    #[test]
    fn direct_mode_wins_over_template() {
        let request = JobRequest::parse(json!({
            "workflow": {"3": {"class_type": "KSampler", "inputs": {"seed": 1}}},
            "template": "t2v",
            "params": {"3": {"seed": 99}}
        }))
        .unwrap();

        assert_matches!(&request.source, WorkflowSource::Direct(graph) => {
            assert!(graph.contains("3"));
        });
        assert_eq!(request.overrides["3"]["seed"], json!(99));
        assert!(request.timeout.is_none());
    }

    #[test]
    fn neither_workflow_nor_template_is_rejected() {
        let err = JobRequest::parse(json!({"prompt": "a cat"})).unwrap_err();
        assert_matches!(err, JobError::MissingWorkflow);
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn null_workflow_counts_as_absent() {
        let err = JobRequest::parse(json!({"workflow": null})).unwrap_err();
        assert_matches!(err, JobError::MissingWorkflow);
    }

    #[test]
    fn non_object_workflow_is_rejected() {
        let err = JobRequest::parse(json!({"workflow": [1, 2, 3]})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn out_of_range_timeout_is_rejected() {
        let err = JobRequest::parse(json!({"template": "t2v", "timeout": 0})).unwrap_err();
        assert_matches!(err, JobError::InvalidInput(ref msg) if msg.contains("timeout"));
    }

    #[test]
    fn fractional_timeout_rounds_up() {
        let request = JobRequest::parse(json!({"template": "t2v", "timeout": 600.5})).unwrap();
        assert_eq!(request.timeout, Some(Duration::from_secs(601)));

        let err = JobRequest::parse(json!({"template": "t2v", "timeout": -0.5})).unwrap_err();
        assert_matches!(err, JobError::InvalidInput(_));
    }

    #[test]
    fn wrong_typed_field_is_rejected() {
        let err = JobRequest::parse(json!({"template": "t2v", "timeout": "soon"})).unwrap_err();
        assert_matches!(err, JobError::InvalidInput(_));
    }

    #[test]
    fn images_are_decoded_and_empty_ones_dropped() {
        let request = JobRequest::parse(json!({
            "template": "i2v",
            "images": {"ref": codec::encode(b"png-bytes"), "unused": ""}
        }))
        .unwrap();

        assert_eq!(request.images.len(), 1);
        assert_eq!(request.images["ref"], b"png-bytes".to_vec());
    }

    #[test]
    fn bad_image_payload_names_the_image() {
        let err = JobRequest::parse(json!({
            "template": "i2v",
            "images": {"ref": "***not base64***"}
        }))
        .unwrap_err();
        assert_matches!(err, JobError::InvalidInput(ref msg) if msg.contains("'ref'"));
    }

    // -- JobResult --

    #[test]
    fn success_serializes_flat_with_status_tag() {
        let result = JobResult::Success {
            prompt_id: "abc".to_string(),
            outputs: vec![ArtifactRecord {
                kind: ArtifactKind::Video,
                filename: "clip.mp4".to_string(),
                data: "AAAA".to_string(),
                size_bytes: 3,
            }],
            warnings: vec![],
        };

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json,
            json!({
                "status": "success",
                "prompt_id": "abc",
                "outputs": [{"type": "video", "filename": "clip.mp4", "data": "AAAA", "size_bytes": 3}]
            })
        );
    }

    #[test]
    fn failure_carries_kind_message_and_warnings() {
        let result = JobResult::failure(
            &JobError::NoOutputs,
            vec!["Node 99 not found for override 99.seed".to_string()],
        );

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["error_kind"], "output_resolution");
        assert_eq!(json["error"], "Workflow completed but no outputs found");
        assert_eq!(json["warnings"][0], "Node 99 not found for override 99.seed");
        assert_eq!(result.error_kind(), Some(ErrorKind::OutputResolution));
    }
}
