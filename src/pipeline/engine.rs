//! External engine invocation.
//!
//! ## Why ignore the exit status?
//!
//! LibreOffice routinely exits 0 after failing to convert a malformed or
//! unsupported document, and occasionally exits non-zero after writing a
//! perfectly good file. The status is therefore recorded for diagnostics
//! only; [`crate::pipeline::verify`] decides success by looking at the
//! filesystem.
//!
//! ## Why `tokio::process` rather than `spawn_blocking`?
//!
//! The child runs in its own process, so waiting on it asynchronously keeps
//! the Tokio workers free without tying up a blocking-pool thread per
//! conversion. The caller still awaits termination before verifying, which
//! gives the same "block this request until the engine exits" semantics.

use crate::error::DocBridgeError;
use crate::pipeline::registry::Format;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

/// Record of one engine run. Informational only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineInvocation {
    pub program: String,
    pub args: Vec<String>,
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub duration_ms: u64,
}

/// A document-conversion engine.
///
/// Implementations must wait for the conversion to finish before returning
/// and must not treat "no output produced" as an error; that judgement
/// belongs to the verifier.
#[async_trait]
pub trait ConversionEngine: Send + Sync {
    /// Convert `input` to `target`, writing whatever the engine produces
    /// into `out_dir`.
    async fn invoke(
        &self,
        input: &Path,
        target: Format,
        out_dir: &Path,
    ) -> Result<EngineInvocation, DocBridgeError>;

    /// Short name used in logs.
    fn name(&self) -> &str;
}

/// LibreOffice (`soffice`) running headless.
#[derive(Debug, Clone)]
pub struct SofficeEngine {
    program: PathBuf,
    extra_args: Vec<String>,
    timeout_secs: u64,
}

impl SofficeEngine {
    pub fn new(program: impl Into<PathBuf>, extra_args: Vec<String>, timeout_secs: u64) -> Self {
        Self {
            program: program.into(),
            extra_args,
            timeout_secs,
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Full argument list for one conversion:
    /// `[extra…] --headless --convert-to <fmt> <input> --outdir <dir>`.
    pub fn command_args(&self, input: &Path, target: Format, out_dir: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = self.extra_args.iter().map(OsString::from).collect();
        args.push("--headless".into());
        args.push("--convert-to".into());
        args.push(target.as_str().into());
        args.push(input.as_os_str().to_owned());
        args.push("--outdir".into());
        args.push(out_dir.as_os_str().to_owned());
        args
    }

    /// `true` if `<program> --version` runs and exits successfully.
    pub async fn health_check(&self) -> bool {
        let run = Command::new(&self.program)
            .args(&self.extra_args)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status();
        match tokio::time::timeout(Duration::from_secs(self.timeout_secs), run).await {
            Ok(Ok(status)) => status.success(),
            _ => false,
        }
    }
}

#[async_trait]
impl ConversionEngine for SofficeEngine {
    async fn invoke(
        &self,
        input: &Path,
        target: Format,
        out_dir: &Path,
    ) -> Result<EngineInvocation, DocBridgeError> {
        let args = self.command_args(input, target, out_dir);
        let start = Instant::now();

        debug!(
            program = %self.program.display(),
            input = %input.display(),
            %target,
            "Invoking conversion engine"
        );

        let mut command = Command::new(&self.program);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        // soffice is a launcher (soffice → oosplash → soffice.bin); its own
        // group lets a timeout take the whole tree down.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.as_std_mut().process_group(0);
        }

        let mut child = command
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => DocBridgeError::EngineNotFound {
                    path: self.program.clone(),
                },
                _ => DocBridgeError::EngineLaunchFailed {
                    path: self.program.clone(),
                    source: e,
                },
            })?;

        let waited = tokio::time::timeout(Duration::from_secs(self.timeout_secs), child.wait()).await;
        let status = match waited {
            Ok(result) => result.map_err(|e| {
                DocBridgeError::Internal(format!("Failed to wait for engine: {e}"))
            })?,
            Err(_) => {
                warn!(
                    input = %input.display(),
                    secs = self.timeout_secs,
                    "Engine timed out, killing it"
                );
                kill_engine(&mut child).await;
                return Err(DocBridgeError::EngineTimeout {
                    input: input.to_path_buf(),
                    secs: self.timeout_secs,
                });
            }
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        if !status.success() {
            // Not a failure signal on its own; the verifier has the final say.
            debug!("Engine exited with {status} after {duration_ms}ms");
        }

        Ok(EngineInvocation {
            program: self.program.display().to_string(),
            args: args
                .iter()
                .map(|a| a.to_string_lossy().into_owned())
                .collect(),
            exit_code: status.code(),
            duration_ms,
        })
    }

    fn name(&self) -> &str {
        "soffice"
    }
}

/// Kill a timed-out engine together with every process it started.
async fn kill_engine(child: &mut Child) {
    if let Some(pid) = child.id() {
        kill_process_group(pid);
    }
    if let Err(e) = child.kill().await {
        warn!("Failed to kill timed-out engine: {e}");
    }
}

#[cfg(unix)]
fn kill_process_group(pid: u32) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;
    // The group id equals the launcher's pid (`process_group(0)`).
    if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
        warn!(pid, "Failed to kill engine process group: {e}");
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: u32) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_line_shape() {
        let engine = SofficeEngine::new("soffice", vec![], 60);
        let args = engine.command_args(Path::new("uploads/x_a.docx"), Format::Pdf, Path::new("outputs"));
        let args: Vec<String> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(
            args,
            vec![
                "--headless",
                "--convert-to",
                "pdf",
                "uploads/x_a.docx",
                "--outdir",
                "outputs"
            ]
        );
    }

    #[test]
    fn extra_args_lead() {
        let engine = SofficeEngine::new(
            "/usr/bin/soffice",
            vec!["-env:UserInstallation=file:///tmp/lo".into()],
            60,
        );
        let args = engine.command_args(Path::new("in.pdf"), Format::Pptx, Path::new("out"));
        assert_eq!(args[0], OsString::from("-env:UserInstallation=file:///tmp/lo"));
        assert_eq!(args[1], OsString::from("--headless"));
        assert_eq!(args[3], OsString::from("pptx"));
        assert_eq!(engine.program(), Path::new("/usr/bin/soffice"));
    }

    #[tokio::test]
    async fn missing_binary_is_engine_not_found() {
        let engine = SofficeEngine::new("/definitely/not/a/real/soffice", vec![], 5);
        let err = engine
            .invoke(Path::new("a.docx"), Format::Pdf, Path::new("."))
            .await
            .unwrap_err();
        assert!(matches!(err, DocBridgeError::EngineNotFound { .. }), "got: {err:?}");
        assert!(!engine.health_check().await);
    }
}
