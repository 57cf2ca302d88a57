//! Conversion orchestration: validation, engine hops and the bridge fallback.
//!
//! ## State machine
//!
//! ```text
//! Start ──▶ DirectAttempted ──verified──▶ Success
//!                 │
//!                 ├─ no bridge ──────────▶ Failed (DirectConversionFailed)
//!                 ▼
//!           Bridge hop 1 (source → via) ──not verified──▶ Failed (BridgeFirstHopFailed)
//!                 ▼
//!           Bridge hop 2 (via → target) ──not verified──▶ Failed (BridgeSecondHopFailed)
//!                 ▼
//!              Success (final-hop artifact)
//! ```
//!
//! Bridges are never chained: at most one direct hop and two bridge hops run
//! per request. When the registry has a bridge but no direct edge the direct
//! hop is skipped.

use crate::config::ConverterConfig;
use crate::error::DocBridgeError;
use crate::output::{ConversionAttempt, ConversionOutcome, ConversionRequest, RouteTaken};
use crate::pipeline::artifact::{download_name, ArtifactStore};
use crate::pipeline::engine::{ConversionEngine, SofficeEngine};
use crate::pipeline::registry::{Format, FormatRegistry};
use crate::pipeline::validate::{self, plan_route, ConversionPlan, Route};
use crate::pipeline::verify;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Orchestrates conversions against one engine and one pair of directories.
///
/// Cheap to share behind an `Arc`; every request is independent and the
/// only shared state is the read-only registry and the engine permit pool.
pub struct Converter {
    config: ConverterConfig,
    registry: Arc<FormatRegistry>,
    engine: Arc<dyn ConversionEngine>,
    store: ArtifactStore,
    permits: Arc<Semaphore>,
}

impl Converter {
    /// A converter driving LibreOffice as configured.
    pub fn new(config: ConverterConfig) -> Self {
        let engine = SofficeEngine::new(
            config.engine_path.clone(),
            config.engine_args.clone(),
            config.engine_timeout_secs,
        );
        Self::with_engine(config, Arc::new(engine))
    }

    /// A converter driving a caller-supplied engine.
    pub fn with_engine(config: ConverterConfig, engine: Arc<dyn ConversionEngine>) -> Self {
        let store = ArtifactStore::new(config.upload_dir.clone(), config.output_dir.clone());
        let permits = Arc::new(Semaphore::new(config.max_concurrent_engines.max(1)));
        Self {
            config,
            registry: FormatRegistry::shared(),
            engine,
            store,
            permits,
        }
    }

    /// Replace the standard conversion table.
    pub fn with_registry(mut self, registry: Arc<FormatRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    pub fn registry(&self) -> &FormatRegistry {
        &self.registry
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Create the upload and output directories. Call once at startup.
    pub async fn prepare(&self) -> Result<(), DocBridgeError> {
        self.store.ensure_dirs().await
    }

    /// Validate a filename and target without touching the filesystem.
    pub fn validate(&self, filename: &str, target: &str) -> Result<ConversionPlan, DocBridgeError> {
        validate::validate(&self.registry, filename, target)
    }

    /// Convert uploaded bytes. `filename` is the client-supplied name and
    /// the sole source of the input format.
    pub async fn convert_bytes(
        &self,
        filename: &str,
        bytes: &[u8],
        target: &str,
    ) -> Result<ConversionOutcome, DocBridgeError> {
        let plan = self.validate(filename, target)?;
        let input = self.store.stage_bytes(filename, bytes).await?;
        self.execute(&ConversionRequest {
            input,
            source: plan.source,
            target: plan.target,
        })
        .await
    }

    /// Convert a local file. It is copied into the upload directory first so
    /// the caller's file is never touched.
    pub async fn convert_file(
        &self,
        path: impl AsRef<Path>,
        target: &str,
    ) -> Result<ConversionOutcome, DocBridgeError> {
        let path = path.as_ref();
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let plan = self.validate(&filename, target)?;
        let input = self.store.stage_file(path).await?;
        self.execute(&ConversionRequest {
            input,
            source: plan.source,
            target: plan.target,
        })
        .await
    }

    /// Run a staged request through the direct/bridge state machine.
    pub async fn execute(
        &self,
        request: &ConversionRequest,
    ) -> Result<ConversionOutcome, DocBridgeError> {
        let start = Instant::now();
        let route = plan_route(&self.registry, request.source, request.target)?;
        let name = request.input.original_name.as_str();
        info!(
            id = %request.input.id,
            "Converting {} ({} → {})",
            name, request.source, request.target
        );

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_conversion_start(name, request.source, request.target);
        }

        let mut attempts = Vec::new();
        let result = self.run_route(request, route, &mut attempts).await;

        if let Some(ref cb) = self.config.progress_callback {
            let err = result.as_ref().err().map(|e| e.to_string());
            cb.on_conversion_complete(name, err.as_deref());
        }

        let (artifact, route_taken) = match result {
            Ok(done) => done,
            Err(e) => {
                warn!(id = %request.input.id, hops = attempts.len(), "Conversion of {} failed: {}", name, e);
                return Err(e);
            }
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        info!(
            id = %request.input.id,
            hops = attempts.len(),
            "Converted {} → {} in {}ms",
            name,
            artifact.display(),
            duration_ms
        );

        Ok(ConversionOutcome {
            artifact,
            download_name: download_name(name, request.target),
            media_type: request.target.media_type().to_string(),
            source: request.source,
            target: request.target,
            route: route_taken,
            attempts,
            duration_ms,
        })
    }

    // ── State machine ────────────────────────────────────────────────────

    async fn run_route(
        &self,
        request: &ConversionRequest,
        route: Route,
        attempts: &mut Vec<ConversionAttempt>,
    ) -> Result<(PathBuf, RouteTaken), DocBridgeError> {
        let via = match route {
            Route::Direct { fallback } => {
                let direct = self
                    .run_hop(request, attempts.len() + 1, &request.input.path, request.target)
                    .await?;
                let verified = direct.verified;
                let output = direct.expected_output.clone();
                attempts.push(direct);

                if verified {
                    return Ok((output, RouteTaken::Direct));
                }
                match fallback {
                    Some(via) => {
                        warn!(
                            "Direct {} → {} left no artifact, bridging via {}",
                            request.source, request.target, via
                        );
                        via
                    }
                    None => {
                        return Err(DocBridgeError::DirectConversionFailed {
                            source_format: request.source,
                            target: request.target,
                        })
                    }
                }
            }
            Route::BridgeOnly { via } => via,
        };

        let intermediate = self.store.output_path(&request.input.path, via);
        let bridged = self.run_bridge(request, via, &intermediate, attempts).await;
        if !self.config.keep_intermediates {
            self.store.discard(&intermediate).await;
        }
        bridged.map(|output| (output, RouteTaken::Bridged { via }))
    }

    async fn run_bridge(
        &self,
        request: &ConversionRequest,
        via: Format,
        intermediate: &Path,
        attempts: &mut Vec<ConversionAttempt>,
    ) -> Result<PathBuf, DocBridgeError> {
        let first = self
            .run_hop(request, attempts.len() + 1, &request.input.path, via)
            .await?;
        let verified = first.verified;
        attempts.push(first);
        if !verified {
            return Err(DocBridgeError::BridgeFirstHopFailed {
                source_format: request.source,
                intermediate: via,
            });
        }

        let second = self
            .run_hop(request, attempts.len() + 1, intermediate, request.target)
            .await?;
        let verified = second.verified;
        let output = second.expected_output.clone();
        attempts.push(second);
        if !verified {
            return Err(DocBridgeError::BridgeSecondHopFailed {
                source_format: request.source,
                intermediate: via,
                target: request.target,
            });
        }
        Ok(output)
    }

    /// One hop: bounded engine invocation followed by verification.
    async fn run_hop(
        &self,
        request: &ConversionRequest,
        hop: usize,
        input: &Path,
        target: Format,
    ) -> Result<ConversionAttempt, DocBridgeError> {
        let name = request.input.original_name.as_str();
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_hop_start(name, hop, target);
        }

        let invocation = {
            let _permit = self
                .permits
                .acquire()
                .await
                .map_err(|_| DocBridgeError::Internal("Engine permit pool closed".into()))?;
            self.engine
                .invoke(input, target, self.store.output_dir())
                .await?
        };

        let expected_output = self.store.output_path(input, target);
        let verified = verify::verify(&expected_output, self.config.reject_empty_artifacts).await?;
        if !verified && self.config.reject_empty_artifacts {
            // A rejected zero-byte file must not linger next to real results.
            self.store.discard(&expected_output).await;
        }
        debug!(
            id = %request.input.id,
            hop,
            engine = self.engine.name(),
            exit_code = ?invocation.exit_code,
            verified,
            "Hop to {} finished in {}ms",
            target,
            invocation.duration_ms
        );

        if let Some(ref cb) = self.config.progress_callback {
            cb.on_hop_complete(name, hop, target, verified);
        }

        Ok(ConversionAttempt {
            hop,
            input: input.to_path_buf(),
            target,
            invocation,
            expected_output,
            verified,
        })
    }
}

// ── Convenience entry points ─────────────────────────────────────────────

/// Convert a local file with LibreOffice.
///
/// Creates the configured directories if needed, stages `input` into the
/// upload directory and returns the resolved output artifact.
///
/// # Example
/// ```rust,no_run
/// use docbridge::{convert, ConverterConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let outcome = convert("report.docx", "pdf", &ConverterConfig::default()).await?;
///     println!("{} ({:?})", outcome.artifact.display(), outcome.route);
///     Ok(())
/// }
/// ```
pub async fn convert(
    input: impl AsRef<Path>,
    target: &str,
    config: &ConverterConfig,
) -> Result<ConversionOutcome, DocBridgeError> {
    let converter = Converter::new(config.clone());
    converter.prepare().await?;
    converter.convert_file(input, target).await
}

/// Convert a file and copy the result to `dest`.
///
/// Uses atomic write (temp file in the destination directory + rename) to
/// prevent partial files.
pub async fn convert_to_file(
    input: impl AsRef<Path>,
    target: &str,
    dest: impl AsRef<Path>,
    config: &ConverterConfig,
) -> Result<ConversionOutcome, DocBridgeError> {
    let outcome = convert(input, target, config).await?;
    copy_atomic(&outcome.artifact, dest.as_ref()).await?;
    Ok(outcome)
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    input: impl AsRef<Path>,
    target: &str,
    config: &ConverterConfig,
) -> Result<ConversionOutcome, DocBridgeError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| DocBridgeError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(input, target, config))
}

/// Copy `src` to `dest` through a sibling temp file so readers never see a
/// half-written result.
pub async fn copy_atomic(src: &Path, dest: &Path) -> Result<(), DocBridgeError> {
    let src = src.to_path_buf();
    let dest = dest.to_path_buf();

    tokio::task::spawn_blocking(move || -> Result<(), DocBridgeError> {
        let parent = match dest.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent).map_err(|e| DocBridgeError::artifact_io(&parent, e))?;

        let mut tmp = tempfile::NamedTempFile::new_in(&parent)
            .map_err(|e| DocBridgeError::artifact_io(&parent, e))?;
        let mut reader =
            std::fs::File::open(&src).map_err(|e| DocBridgeError::artifact_io(&src, e))?;
        std::io::copy(&mut reader, tmp.as_file_mut())
            .map_err(|e| DocBridgeError::artifact_io(&dest, e))?;
        tmp.as_file_mut()
            .flush()
            .map_err(|e| DocBridgeError::artifact_io(&dest, e))?;
        tmp.persist(&dest)
            .map_err(|e| DocBridgeError::artifact_io(&dest, e.error))?;
        Ok(())
    })
    .await
    .map_err(|e| DocBridgeError::Internal(format!("Copy task panicked: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn copy_atomic_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("a.pdf");
        std::fs::write(&src, b"%PDF-1.7").unwrap();
        let dest = dir.path().join("nested/out/report.pdf");

        copy_atomic(&src, &dest).await.unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"%PDF-1.7");
        // No stray temp files left next to the result.
        assert_eq!(std::fs::read_dir(dest.parent().unwrap()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn copy_atomic_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        let err = copy_atomic(&dir.path().join("ghost.pdf"), &dir.path().join("x.pdf"))
            .await
            .unwrap_err();
        assert_eq!(err.reason_code(), "artifact_io");
    }

    #[test]
    fn converter_uses_standard_registry() {
        let converter = Converter::new(ConverterConfig::default());
        assert!(converter
            .registry()
            .direct_edge_exists(Format::Pdf, Format::Docx));
        assert!(converter.validate("deck.pptx", "docx").is_err());
        assert_eq!(converter.store().output_dir(), Path::new("outputs"));
    }
}
