//! Configuration types for document conversion.
//!
//! Everything the orchestrator needs to know about its host (where the
//! engine lives, which directories to use, how many engines may run at once)
//! lives in [`ConverterConfig`], built via [`ConverterConfigBuilder`]. One
//! explicit value replaces process-wide settings so a converter can be
//! constructed in isolation, e.g. against temp directories and a fake engine
//! in tests.

use crate::error::DocBridgeError;
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::PathBuf;

/// Configuration for a [`crate::Converter`].
///
/// # Example
/// ```rust
/// use docbridge::ConverterConfig;
///
/// let config = ConverterConfig::builder()
///     .engine_path("/usr/bin/soffice")
///     .upload_dir("/var/lib/docbridge/uploads")
///     .output_dir("/var/lib/docbridge/outputs")
///     .max_concurrent_engines(2)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConverterConfig {
    /// Engine executable. Default: `soffice` (resolved through `PATH`).
    pub engine_path: PathBuf,

    /// Arguments placed before `--headless` on every invocation. Default: empty.
    ///
    /// Useful for `-env:UserInstallation=file:///…` so that several engines
    /// can run without fighting over one LibreOffice profile.
    pub engine_args: Vec<String>,

    /// Directory receiving staged uploads. Default: `uploads`.
    pub upload_dir: PathBuf,

    /// Directory the engine writes into. Default: `outputs`.
    pub output_dir: PathBuf,

    /// Upper bound on simultaneously running engine processes. Default: 1.
    ///
    /// LibreOffice instances sharing a user profile serialise badly and can
    /// silently drop conversions when run in parallel, so the default is one.
    /// Raise it only together with per-instance `engine_args` profiles.
    pub max_concurrent_engines: usize,

    /// Per-invocation timeout in seconds; the engine is killed afterwards. Default: 120.
    pub engine_timeout_secs: u64,

    /// Treat a zero-byte output as "no artifact". Default: true.
    pub reject_empty_artifacts: bool,

    /// Keep the intermediate artifact of a bridge instead of deleting it. Default: false.
    pub keep_intermediates: bool,

    /// Optional hop-level progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            engine_path: PathBuf::from("soffice"),
            engine_args: Vec::new(),
            upload_dir: PathBuf::from("uploads"),
            output_dir: PathBuf::from("outputs"),
            max_concurrent_engines: 1,
            engine_timeout_secs: 120,
            reject_empty_artifacts: true,
            keep_intermediates: false,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConverterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterConfig")
            .field("engine_path", &self.engine_path)
            .field("engine_args", &self.engine_args)
            .field("upload_dir", &self.upload_dir)
            .field("output_dir", &self.output_dir)
            .field("max_concurrent_engines", &self.max_concurrent_engines)
            .field("engine_timeout_secs", &self.engine_timeout_secs)
            .field("reject_empty_artifacts", &self.reject_empty_artifacts)
            .field("keep_intermediates", &self.keep_intermediates)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConverterConfig {
    /// Create a new builder for `ConverterConfig`.
    pub fn builder() -> ConverterConfigBuilder {
        ConverterConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConverterConfig`].
#[derive(Debug)]
pub struct ConverterConfigBuilder {
    config: ConverterConfig,
}

impl ConverterConfigBuilder {
    pub fn engine_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.engine_path = path.into();
        self
    }

    pub fn engine_arg(mut self, arg: impl Into<String>) -> Self {
        self.config.engine_args.push(arg.into());
        self
    }

    pub fn upload_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.upload_dir = dir.into();
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn max_concurrent_engines(mut self, n: usize) -> Self {
        self.config.max_concurrent_engines = n;
        self
    }

    pub fn engine_timeout_secs(mut self, secs: u64) -> Self {
        self.config.engine_timeout_secs = secs;
        self
    }

    pub fn reject_empty_artifacts(mut self, v: bool) -> Self {
        self.config.reject_empty_artifacts = v;
        self
    }

    pub fn keep_intermediates(mut self, v: bool) -> Self {
        self.config.keep_intermediates = v;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConverterConfig, DocBridgeError> {
        let c = &self.config;
        if c.engine_path.as_os_str().is_empty() {
            return Err(DocBridgeError::InvalidConfig(
                "Engine path must not be empty".into(),
            ));
        }
        if c.max_concurrent_engines == 0 {
            return Err(DocBridgeError::InvalidConfig(
                "Concurrent engine limit must be ≥ 1".into(),
            ));
        }
        if c.engine_timeout_secs == 0 {
            return Err(DocBridgeError::InvalidConfig(
                "Engine timeout must be ≥ 1 second".into(),
            ));
        }
        if c.upload_dir == c.output_dir {
            return Err(DocBridgeError::InvalidConfig(format!(
                "Upload and output directories must differ (both are {:?})",
                c.upload_dir
            )));
        }
        Ok(self.config)
    }
}
