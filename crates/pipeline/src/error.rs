use serde::{Deserialize, Serialize};

use podbridge_comfyui::error::EngineError;
use podbridge_core::error::CoreError;

/// Coarse failure category reported to the job platform as `error_kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Transport,
    MalformedResponse,
    Execution,
    Timeout,
    Validation,
    OutputResolution,
    EngineUnavailable,
    Cancelled,
    Internal,
}

/// Everything that can end a job early.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// The job payload does not have the expected shape.
    #[error("Invalid job input: {0}")]
    InvalidInput(String),

    #[error("Must provide 'workflow' or 'template' in input")]
    MissingWorkflow,

    #[error("Unknown template: {name}. Available: {available}")]
    UnknownTemplate { name: String, available: String },

    #[error("ComfyUI server not available")]
    EngineUnavailable,

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Core(#[from] CoreError),

    /// The execution completed but reported no artifacts at all.
    #[error("Workflow completed but no outputs found")]
    NoOutputs,

    /// Artifacts were reported but none of them could be read back.
    #[error("Workflow completed but none of its {count} outputs could be read")]
    UnreadableOutputs { count: usize },

    /// Cancellation arrived before the graph was submitted.
    #[error("Job cancelled before submission")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl JobError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            JobError::InvalidInput(_)
            | JobError::MissingWorkflow
            | JobError::UnknownTemplate { .. } => ErrorKind::Validation,
            JobError::EngineUnavailable => ErrorKind::EngineUnavailable,
            JobError::Cancelled => ErrorKind::Cancelled,
            JobError::Engine(engine) => match engine {
                EngineError::Request(_) | EngineError::ApiError { .. } => ErrorKind::Transport,
                EngineError::MalformedResponse(_) => ErrorKind::MalformedResponse,
                EngineError::Execution { .. } => ErrorKind::Execution,
                EngineError::Timeout { .. } => ErrorKind::Timeout,
                EngineError::Cancelled { .. } => ErrorKind::Cancelled,
            },
            JobError::Core(core) => match core {
                CoreError::NotFound { .. }
                | CoreError::Validation(_)
                | CoreError::InvalidWorkflow(_) => ErrorKind::Validation,
                CoreError::Io { .. } | CoreError::Internal(_) => ErrorKind::Internal,
            },
            JobError::NoOutputs | JobError::UnreadableOutputs { .. } => {
                ErrorKind::OutputResolution
            }
            JobError::Internal(_) => ErrorKind::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_serialize_snake_case() {
        let json = serde_json::to_value(ErrorKind::OutputResolution).unwrap();
        assert_eq!(json, "output_resolution");
        let json = serde_json::to_value(ErrorKind::EngineUnavailable).unwrap();
        assert_eq!(json, "engine_unavailable");
    }

    #[test]
    fn engine_errors_map_to_kinds() {
        let timeout = JobError::from(EngineError::Timeout {
            prompt_id: "p".to_string(),
            timeout_secs: 5,
        });
        assert_eq!(timeout.kind(), ErrorKind::Timeout);

        let rejected = JobError::from(EngineError::ApiError {
            status: 400,
            body: "{}".to_string(),
        });
        assert_eq!(rejected.kind(), ErrorKind::Transport);

        let malformed = JobError::from(EngineError::MalformedResponse("x".to_string()));
        assert_eq!(malformed.kind(), ErrorKind::MalformedResponse);
    }

    #[test]
    fn cancellation_before_and_after_submission_share_a_kind() {
        assert_eq!(JobError::Cancelled.kind(), ErrorKind::Cancelled);
        let waiting = JobError::from(EngineError::Cancelled {
            prompt_id: "p".to_string(),
        });
        assert_eq!(waiting.kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn missing_template_file_is_validation() {
        let err = JobError::from(CoreError::NotFound {
            entity: "Workflow file",
            name: "/workflows/LTX2_T2V.json".to_string(),
        });
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(
            err.to_string(),
            "Workflow file not found: /workflows/LTX2_T2V.json"
        );
    }

    #[test]
    fn unknown_template_message() {
        let err = JobError::UnknownTemplate {
            name: "xyz".to_string(),
            available: "t2v, i2v".to_string(),
        };
        assert_eq!(err.to_string(), "Unknown template: xyz. Available: t2v, i2v");
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
