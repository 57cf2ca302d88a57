//! Error types for the docbridge library.
//!
//! A single enum, [`DocBridgeError`], covers two distinct categories:
//!
//! * **Client rejections**: the request itself cannot be honoured (unknown
//!   extension, same-format conversion, no route) or the engine produced
//!   no verifiable artifact. These map to a 4xx-style response carrying a
//!   human-readable reason and never crash the process.
//!
//! * **Internal failures**: the engine binary is missing, timed out, or the
//!   artifact directories could not be written. These are kept separate so
//!   operators can tell "the document is bad" apart from "the host is broken".
//!
//! [`DocBridgeError::is_client_error`] draws the line between the two.

use crate::pipeline::registry::Format;
use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the docbridge library.
#[derive(Debug, Error)]
pub enum DocBridgeError {
    // ── Validation rejections ─────────────────────────────────────────────
    /// The input file's extension is not a registered input format.
    #[error("Input format '{format}' is not supported")]
    UnsupportedInputFormat { format: String },

    /// The requested target is not one of docx, pdf or pptx.
    #[error("Target format '{format}' is not supported")]
    UnsupportedTargetFormat { format: String },

    /// Input and target formats are identical.
    #[error("Input and target formats are the same ({format})")]
    SameFormatConversion { format: Format },

    /// Neither a direct edge nor a bridge connects the two formats.
    #[error("Conversion from {source_format} to {target} is not supported")]
    UnsupportedConversionPath { source_format: Format, target: Format },

    // ── Execution rejections ──────────────────────────────────────────────
    /// The direct hop ran but left no artifact, and no bridge applies.
    #[error("Conversion failed. File content may be unsupported ({source_format} to {target})")]
    DirectConversionFailed { source_format: Format, target: Format },

    /// The bridge's first hop (input → intermediate) left no artifact.
    #[error("{source_format} to {intermediate} conversion failed")]
    BridgeFirstHopFailed {
        source_format: Format,
        intermediate: Format,
    },

    /// The bridge's second hop (intermediate → target) left no artifact.
    #[error("{source_format} to {target} conversion failed due to unsupported layout (via {intermediate})")]
    BridgeSecondHopFailed {
        source_format: Format,
        intermediate: Format,
        target: Format,
    },

    // ── Engine errors ─────────────────────────────────────────────────────
    /// The engine executable could not be found.
    #[error("Conversion engine not found at '{path}'\nInstall LibreOffice or set DOCBRIDGE_ENGINE=/path/to/soffice.")]
    EngineNotFound { path: PathBuf },

    /// The engine executable exists but could not be started.
    #[error("Failed to launch conversion engine '{path}': {source}")]
    EngineLaunchFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The engine did not terminate within the configured timeout and was killed.
    #[error("Conversion engine timed out after {secs}s converting '{input}'\nIncrease --timeout.")]
    EngineTimeout { input: PathBuf, secs: u64 },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// The caller-supplied input file does not exist.
    #[error("Input file not found: '{path}'")]
    InputNotFound { path: PathBuf },

    /// Reading, writing or removing an artifact failed.
    #[error("Artifact I/O failed for '{path}': {source}")]
    ArtifactIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DocBridgeError {
    /// `true` for rejections that belong to the conversion taxonomy and
    /// should be reported to the client as a bad request.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            DocBridgeError::UnsupportedInputFormat { .. }
                | DocBridgeError::UnsupportedTargetFormat { .. }
                | DocBridgeError::SameFormatConversion { .. }
                | DocBridgeError::UnsupportedConversionPath { .. }
                | DocBridgeError::DirectConversionFailed { .. }
                | DocBridgeError::BridgeFirstHopFailed { .. }
                | DocBridgeError::BridgeSecondHopFailed { .. }
        )
    }

    /// Stable machine-readable reason code.
    pub fn reason_code(&self) -> &'static str {
        match self {
            DocBridgeError::UnsupportedInputFormat { .. } => "unsupported_input_format",
            DocBridgeError::UnsupportedTargetFormat { .. } => "unsupported_target_format",
            DocBridgeError::SameFormatConversion { .. } => "same_format_conversion",
            DocBridgeError::UnsupportedConversionPath { .. } => "unsupported_conversion_path",
            DocBridgeError::DirectConversionFailed { .. } => "direct_conversion_failed",
            DocBridgeError::BridgeFirstHopFailed { .. } => "bridge_first_hop_failed",
            DocBridgeError::BridgeSecondHopFailed { .. } => "bridge_second_hop_failed",
            DocBridgeError::EngineNotFound { .. } => "engine_not_found",
            DocBridgeError::EngineLaunchFailed { .. } => "engine_launch_failed",
            DocBridgeError::EngineTimeout { .. } => "engine_timeout",
            DocBridgeError::InputNotFound { .. } => "input_not_found",
            DocBridgeError::ArtifactIo { .. } => "artifact_io",
            DocBridgeError::InvalidConfig(_) => "invalid_config",
            DocBridgeError::Internal(_) => "internal",
        }
    }

    pub(crate) fn artifact_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DocBridgeError::ArtifactIo {
            path: path.into(),
            source,
        }
    }
}
