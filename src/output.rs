//! Result types returned by the orchestrator.

use crate::pipeline::artifact::Artifact;
use crate::pipeline::engine::EngineInvocation;
use crate::pipeline::registry::Format;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Response metadata field carrying the detected input format.
pub const INPUT_FORMAT_HEADER: &str = "X-Input-Format";
/// Response metadata field carrying the requested target format.
pub const TARGET_FORMAT_HEADER: &str = "X-Target-Format";

/// A validated request bound to its staged input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionRequest {
    pub input: Artifact,
    pub source: Format,
    pub target: Format,
}

/// One hop: an engine invocation plus its verification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionAttempt {
    /// 1-based position within the request.
    pub hop: usize,
    pub input: PathBuf,
    pub target: Format,
    pub invocation: EngineInvocation,
    pub expected_output: PathBuf,
    pub verified: bool,
}

/// How the final artifact was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum RouteTaken {
    Direct,
    Bridged { via: Format },
}

/// A successful conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutcome {
    /// Final-hop artifact. Never the intermediate of a bridge.
    pub artifact: PathBuf,
    /// File name to present to the client.
    pub download_name: String,
    pub media_type: String,
    pub source: Format,
    pub target: Format,
    pub route: RouteTaken,
    /// Every hop that ran, in order, including a failed direct attempt.
    pub attempts: Vec<ConversionAttempt>,
    pub duration_ms: u64,
}

impl ConversionOutcome {
    /// The two metadata fields that accompany the downloaded file.
    pub fn headers(&self) -> [(&'static str, String); 2] {
        [
            (INPUT_FORMAT_HEADER, self.source.to_string()),
            (TARGET_FORMAT_HEADER, self.target.to_string()),
        ]
    }

    /// Number of engine invocations made for this request.
    pub fn engine_invocations(&self) -> usize {
        self.attempts.len()
    }
}
