//! Output resolution: result descriptor -> artifact refs -> records.

use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use podbridge_comfyui::history::{HistoryEntry, OutputFile};
use podbridge_core::codec;
use podbridge_core::error::CoreError;

/// Normalized artifact kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Image,
    Video,
}

/// A produced file, as reported by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRef {
    pub kind: ArtifactKind,
    pub filename: String,
    /// Empty when the file sits directly in the output root.
    pub subfolder: String,
    /// Address of the node that produced the file.
    pub node_id: String,
}

impl ArtifactRef {
    /// `output_root/subfolder/filename`, or `output_root/filename`.
    pub fn path(&self, output_root: &Path) -> PathBuf {
        if self.subfolder.is_empty() {
            output_root.join(&self.filename)
        } else {
            output_root.join(&self.subfolder).join(&self.filename)
        }
    }
}

/// A produced file packaged for transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    #[serde(rename = "type")]
    pub kind: ArtifactKind,
    pub filename: String,
    /// Base64 file contents.
    pub data: String,
    pub size_bytes: u64,
}

/// List every artifact in `entry`, node by node.
///
/// Video collections arrive under the engine's legacy `gifs` key and are
/// listed before the node's images. Entries without a filename are dropped.
pub fn enumerate_artifacts(entry: &HistoryEntry) -> Vec<ArtifactRef> {
    let mut refs = Vec::new();

    for (node_id, output) in &entry.outputs {
        let videos = output.gifs.iter().map(|f| (ArtifactKind::Video, f));
        let images = output.images.iter().map(|f| (ArtifactKind::Image, f));

        for (kind, file) in videos.chain(images) {
            match to_ref(kind, file, node_id) {
                Some(artifact) => refs.push(artifact),
                None => tracing::debug!(node_id = %node_id, "Skipping output entry without filename"),
            }
        }
    }

    refs
}

fn to_ref(kind: ArtifactKind, file: &OutputFile, node_id: &str) -> Option<ArtifactRef> {
    let filename = file.filename.as_deref().filter(|f| !f.is_empty())?;
    Some(ArtifactRef {
        kind,
        filename: filename.to_string(),
        subfolder: file.subfolder.clone(),
        node_id: node_id.to_string(),
    })
}

/// Read each referenced file under `output_root` and encode it.
///
/// Refs whose file does not exist are logged and skipped. Any other read
/// failure is returned as [`CoreError::Io`].
pub async fn materialize(
    refs: &[ArtifactRef],
    output_root: &Path,
) -> Result<Vec<ArtifactRecord>, CoreError> {
    let mut records = Vec::with_capacity(refs.len());

    for artifact in refs {
        let path = artifact.path(output_root);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == IoErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "Output file not found");
                continue;
            }
            Err(e) => return Err(CoreError::io(&path, e)),
        };

        let size_bytes = bytes.len() as u64;
        tracing::info!(
            filename = %artifact.filename,
            node_id = %artifact.node_id,
            size_bytes,
            "Encoding output",
        );

        records.push(ArtifactRecord {
            kind: artifact.kind,
            filename: artifact.filename.clone(),
            data: codec::encode(&bytes),
            size_bytes,
        });
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn entry(value: serde_json::Value) -> HistoryEntry {
        serde_json::from_value(value).unwrap()
    }

    fn image_ref(filename: &str, subfolder: &str) -> ArtifactRef {
        ArtifactRef {
            kind: ArtifactKind::Image,
            filename: filename.to_string(),
            subfolder: subfolder.to_string(),
            node_id: "9".to_string(),
        }
    }

    // -- enumerate_artifacts --

    #[test]
    fn image_and_video_under_different_nodes() {
        let refs = enumerate_artifacts(&entry(json!({
            "outputs": {
                "9": {"images": [{"filename": "still.png", "subfolder": "", "type": "output"}]},
                "12": {"gifs": [{"filename": "clip.mp4", "subfolder": "video", "format": "video/h264-mp4"}]}
            }
        })));

        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].kind, ArtifactKind::Image);
        assert_eq!(refs[0].node_id, "9");
        assert_eq!(refs[1].kind, ArtifactKind::Video);
        assert_eq!(refs[1].subfolder, "video");
    }

    #[test]
    fn videos_listed_before_images_within_a_node() {
        let refs = enumerate_artifacts(&entry(json!({
            "outputs": {
                "9": {
                    "images": [{"filename": "preview.png"}],
                    "gifs": [{"filename": "clip.mp4"}]
                }
            }
        })));

        let kinds: Vec<ArtifactKind> = refs.iter().map(|r| r.kind).collect();
        assert_eq!(kinds, vec![ArtifactKind::Video, ArtifactKind::Image]);
    }

    #[test]
    fn empty_outputs_yield_no_refs() {
        assert!(enumerate_artifacts(&entry(json!({"outputs": {}}))).is_empty());
    }

    #[test]
    fn entries_without_filename_are_dropped() {
        let refs = enumerate_artifacts(&entry(json!({
            "outputs": {"9": {"images": [{"subfolder": "x"}, {"filename": ""}, {"filename": "ok.png"}]}}
        })));
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].filename, "ok.png");
    }

    #[test]
    fn non_file_outputs_are_ignored() {
        let refs = enumerate_artifacts(&entry(json!({
            "outputs": {"5": {"text": ["caption"]}}
        })));
        assert!(refs.is_empty());
    }

    // -- materialize --

    #[test]
    fn path_with_and_without_subfolder() {
        let root = Path::new("/out");
        assert_eq!(image_ref("a.png", "").path(root), PathBuf::from("/out/a.png"));
        assert_eq!(
            image_ref("a.png", "runs").path(root),
            PathBuf::from("/out/runs/a.png")
        );
    }

    #[tokio::test]
    async fn reads_and_encodes_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("runs")).unwrap();
        std::fs::write(dir.path().join("runs/a.png"), b"hello").unwrap();

        let records = materialize(&[image_ref("a.png", "runs")], dir.path())
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].filename, "a.png");
        assert_eq!(records[0].size_bytes, 5);
        assert_eq!(codec::decode(&records[0].data).unwrap(), b"hello");
    }

    #[tokio::test]
    async fn missing_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("present.png"), b"x").unwrap();

        let records = materialize(
            &[image_ref("gone.png", ""), image_ref("present.png", "")],
            dir.path(),
        )
        .await
        .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].filename, "present.png");
    }
}
