use serde_json::Value;

/// Errors from talking to a ComfyUI instance or waiting on an execution.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The HTTP request itself failed (connection refused, DNS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// ComfyUI returned a non-2xx status code.
    #[error("ComfyUI API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// A 2xx response whose body did not have the expected shape.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// The engine recorded the execution as failed.
    #[error("Execution failed: {}", summarize_messages(.messages))]
    Execution {
        /// The engine's own status messages, verbatim.
        messages: Vec<Value>,
    },

    /// No terminal result appeared within the wait budget. The execution
    /// may still be running on the engine.
    #[error("Timeout after {timeout_secs}s waiting for prompt {prompt_id}")]
    Timeout { prompt_id: String, timeout_secs: u64 },

    /// The wait was aborted through its cancellation token.
    #[error("Wait for prompt {prompt_id} was cancelled")]
    Cancelled { prompt_id: String },
}

/// Render engine status messages for humans.
///
/// ComfyUI reports messages as `[kind, payload]` pairs. Error payloads carry
/// an `exception_message`, which is far more useful than the raw JSON.
pub fn summarize_messages(messages: &[Value]) -> String {
    let rendered: Vec<String> = messages
        .iter()
        .filter_map(|msg| {
            let pair = msg.as_array();
            let kind = pair.and_then(|p| p.first()).and_then(Value::as_str);
            let payload = pair.and_then(|p| p.get(1));
            match (kind, payload) {
                // Progress bookkeeping, not interesting in an error summary.
                (Some("execution_start" | "execution_cached" | "execution_success"), _) => None,
                (Some(kind), Some(payload)) => {
                    let detail = payload
                        .get("exception_message")
                        .and_then(Value::as_str)
                        .map(str::trim);
                    let node_type = payload.get("node_type").and_then(Value::as_str);
                    Some(match (detail, node_type) {
                        (Some(detail), Some(node_type)) => format!("{kind}: {node_type}: {detail}"),
                        (Some(detail), None) => format!("{kind}: {detail}"),
                        _ => format!("{kind}: {payload}"),
                    })
                }
                _ => Some(msg.to_string()),
            }
        })
        .collect();

    if rendered.is_empty() {
        "no details reported".to_string()
    } else {
        rendered.join("; ")
    }
}
