//! Input image staging.
//!
//! Decoded images are either written into the engine's shared input
//! directory or pushed through its upload endpoint. Each one gets a
//! collision-resistant filename built from its logical name, the current
//! millisecond timestamp and a random token, so two jobs staging the same
//! logical name in the same millisecond still get distinct files.

use std::path::Path;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use podbridge_comfyui::engine::Engine;
use podbridge_core::error::CoreError;

use crate::error::JobError;

/// Length of the random uniqueness token in staged filenames.
const TOKEN_LEN: usize = 8;

/// How staged inputs reach the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputMode {
    /// Write into a directory shared with the engine.
    #[default]
    Filesystem,
    /// Send through the engine's upload endpoint.
    Upload,
}

impl FromStr for InputMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "filesystem" | "fs" => Ok(InputMode::Filesystem),
            "upload" => Ok(InputMode::Upload),
            other => Err(format!(
                "unknown input mode '{other}' (expected 'filesystem' or 'upload')"
            )),
        }
    }
}

/// An input image the engine can now load by filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedInput {
    /// Logical name used by the job (and by `LoadImage` nodes in its graph).
    pub name: String,
    /// Filename the engine knows the image under.
    pub filename: String,
}

/// Reject logical names that could escape the input directory.
pub fn validate_input_name(name: &str) -> Result<(), CoreError> {
    if name.is_empty() {
        return Err(CoreError::Validation(
            "Input image name must not be empty".to_string(),
        ));
    }
    if name.contains(['/', '\\']) || name.contains("..") {
        return Err(CoreError::Validation(format!(
            "Input image name '{name}' must not contain path separators or '..'"
        )));
    }
    Ok(())
}

/// `input_{name}_{millis}_{token}.png`.
pub fn staged_filename(name: &str, millis: i64, token: &str) -> Result<String, CoreError> {
    validate_input_name(name)?;
    Ok(format!("input_{name}_{millis}_{token}.png"))
}

fn unique_token() -> String {
    let mut token = uuid::Uuid::new_v4().simple().to_string();
    token.truncate(TOKEN_LEN);
    token
}

/// Stage every image and return the resulting name mapping, in input order.
///
/// Fails on the first image that cannot be staged; images staged before
/// the failure stay where they are.
pub async fn stage_inputs(
    images: &IndexMap<String, Vec<u8>>,
    mode: InputMode,
    input_dir: &Path,
    engine: &dyn Engine,
) -> Result<Vec<StagedInput>, JobError> {
    let mut staged = Vec::with_capacity(images.len());
    if images.is_empty() {
        return Ok(staged);
    }

    if mode == InputMode::Filesystem {
        tokio::fs::create_dir_all(input_dir)
            .await
            .map_err(|e| CoreError::io(input_dir, e))?;
    }

    for (name, data) in images {
        let millis = chrono::Utc::now().timestamp_millis();
        let filename = staged_filename(name, millis, &unique_token())?;

        let filename = match mode {
            InputMode::Filesystem => {
                let path = input_dir.join(&filename);
                tokio::fs::write(&path, data)
                    .await
                    .map_err(|e| CoreError::io(&path, e))?;
                tracing::info!(
                    name = %name,
                    filename = %filename,
                    size_bytes = data.len(),
                    "Saved input image",
                );
                filename
            }
            InputMode::Upload => {
                engine.upload_input(data.clone(), &filename, "").await?.name
            }
        };

        staged.push(StagedInput {
            name: name.clone(),
            filename,
        });
    }

    Ok(staged)
}
