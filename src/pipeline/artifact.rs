//! Artifact lifecycle: collision-free staging, output naming and cleanup.
//!
//! Every upload is stored as `<uuid>_<original name>` in the upload
//! directory. Because the engine names its output after the input stem, the
//! UUID prefix propagates to every artifact derived from the upload, so two
//! requests, even for the same file, never touch each other's files.
//!
//! Retention is explicit: intermediates of a bridge are discarded by the
//! orchestrator, everything else stays until [`ArtifactStore::sweep`] removes
//! it.

use crate::error::DocBridgeError;
use crate::pipeline::registry::Format;
use crate::pipeline::verify::expected_output_path;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};
use uuid::Uuid;

static UNSAFE_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9._\- ]").unwrap());

/// A staged input document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub id: Uuid,
    /// Client-supplied file name, kept for the download name.
    pub original_name: String,
    /// Location on disk: `<upload_dir>/<id>_<sanitised name>`.
    pub path: PathBuf,
}

/// Result of a retention sweep.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepReport {
    pub removed: Vec<PathBuf>,
    /// Files younger than the retention window.
    pub kept: usize,
    /// Files that could not be inspected or removed.
    pub failed: usize,
}

/// Owns the upload and output directories.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    upload_dir: PathBuf,
    output_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(upload_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            output_dir: output_dir.into(),
        }
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Create both directories if they are absent.
    pub async fn ensure_dirs(&self) -> Result<(), DocBridgeError> {
        for dir in [&self.upload_dir, &self.output_dir] {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| DocBridgeError::artifact_io(dir, e))?;
        }
        Ok(())
    }

    /// Store uploaded bytes under a fresh unique name.
    pub async fn stage_bytes(
        &self,
        original_name: &str,
        bytes: &[u8],
    ) -> Result<Artifact, DocBridgeError> {
        let artifact = self.allocate(original_name);
        tokio::fs::write(&artifact.path, bytes)
            .await
            .map_err(|e| DocBridgeError::artifact_io(&artifact.path, e))?;
        debug!(id = %artifact.id, path = %artifact.path.display(), "Staged upload");
        Ok(artifact)
    }

    /// Copy a local file into the upload directory under a fresh unique name.
    pub async fn stage_file(&self, source: &Path) -> Result<Artifact, DocBridgeError> {
        let original_name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let artifact = self.allocate(&original_name);
        tokio::fs::copy(source, &artifact.path)
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => DocBridgeError::InputNotFound {
                    path: source.to_path_buf(),
                },
                _ => DocBridgeError::artifact_io(&artifact.path, e),
            })?;
        debug!(id = %artifact.id, path = %artifact.path.display(), "Staged local file");
        Ok(artifact)
    }

    /// Where the engine will write the conversion of `input` to `target`.
    pub fn output_path(&self, input: &Path, target: Format) -> PathBuf {
        expected_output_path(input, target, &self.output_dir)
    }

    /// Remove an intermediate or rejected artifact. A missing file is not an error.
    pub async fn discard(&self, path: &Path) {
        match tokio::fs::remove_file(path).await {
            Ok(()) => debug!(path = %path.display(), "Discarded artifact"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), "Failed to discard artifact: {e}"),
        }
    }

    /// Delete files in both directories last modified more than
    /// `older_than` ago.
    pub async fn sweep(&self, older_than: Duration) -> Result<SweepReport, DocBridgeError> {
        let cutoff = SystemTime::now()
            .checked_sub(older_than)
            .unwrap_or(SystemTime::UNIX_EPOCH);
        let mut report = SweepReport::default();

        for dir in [&self.upload_dir, &self.output_dir] {
            let mut entries = match tokio::fs::read_dir(dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(DocBridgeError::artifact_io(dir, e)),
            };

            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| DocBridgeError::artifact_io(dir, e))?
            {
                let path = entry.path();
                let modified = match entry.metadata().await {
                    Ok(meta) if meta.is_file() => meta.modified(),
                    Ok(_) => continue,
                    Err(e) => Err(e),
                };
                match modified {
                    Ok(t) if t <= cutoff => match tokio::fs::remove_file(&path).await {
                        Ok(()) => report.removed.push(path),
                        Err(e) => {
                            warn!(path = %path.display(), "Sweep failed to remove: {e}");
                            report.failed += 1;
                        }
                    },
                    Ok(_) => report.kept += 1,
                    Err(e) => {
                        warn!(path = %path.display(), "Sweep failed to stat: {e}");
                        report.failed += 1;
                    }
                }
            }
        }

        info!(
            "Sweep removed {} artifacts ({} kept, {} failed)",
            report.removed.len(),
            report.kept,
            report.failed
        );
        Ok(report)
    }

    fn allocate(&self, original_name: &str) -> Artifact {
        let id = Uuid::new_v4();
        let stored = format!("{}_{}", id.simple(), sanitize_file_name(original_name));
        Artifact {
            id,
            original_name: original_name.to_string(),
            path: self.upload_dir.join(stored),
        }
    }
}

/// Reduce a client-supplied name to a safe single path component.
///
/// Directory parts are dropped (both `/` and `\` separators), anything
/// outside `[A-Za-z0-9._- ]` becomes `_`, and leading dots are stripped so
/// the result can never be `..` or a hidden file. A bare extension such as
/// `.docx` becomes `upload.docx` so the format survives.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned = UNSAFE_CHARS.replace_all(base, "_");
    let cleaned = cleaned.trim();
    let stripped = cleaned.trim_start_matches('.').trim();
    if stripped.is_empty() {
        "upload".to_string()
    } else if stripped.len() < cleaned.len() && !stripped.contains('.') {
        format!("upload.{stripped}")
    } else {
        stripped.to_string()
    }
}

/// Client-facing name for the converted file: the original stem with the
/// target extension.
pub fn download_name(original_name: &str, target: Format) -> String {
    let safe = sanitize_file_name(original_name);
    let stem = Path::new(&safe)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| safe.clone());
    format!("{stem}.{}", target.extension())
}
