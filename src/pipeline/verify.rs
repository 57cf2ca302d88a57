//! Outcome verification: the only place conversion success is decided.
//!
//! The engine writes `<outdir>/<input stem>.<target ext>` and nothing else
//! tells us whether it worked, so the verifier looks for exactly that file.

use crate::error::DocBridgeError;
use crate::pipeline::registry::Format;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Deterministic path the engine writes when converting `input` to `target`.
pub fn expected_output_path(input: &Path, target: Format, out_dir: &Path) -> PathBuf {
    let stem = input.file_stem().unwrap_or(input.as_os_str());
    let mut name = stem.to_os_string();
    name.push(".");
    name.push(target.extension());
    out_dir.join(name)
}

/// `Ok(true)` iff a regular file exists at `path` (and, when
/// `reject_empty` is set, is non-empty).
///
/// A missing file is a plain `false`; only unexpected I/O errors such as a
/// permission failure on the output directory are returned as `Err`.
pub async fn verify(path: &Path, reject_empty: bool) -> Result<bool, DocBridgeError> {
    let verified = match tokio::fs::metadata(path).await {
        Ok(meta) => meta.is_file() && (!reject_empty || meta.len() > 0),
        Err(e) if e.kind() == ErrorKind::NotFound => false,
        Err(e) => return Err(DocBridgeError::artifact_io(path, e)),
    };
    debug!(path = %path.display(), verified, "Verified artifact");
    Ok(verified)
}
