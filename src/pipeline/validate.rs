//! Request validation against the [`FormatRegistry`].
//!
//! Checks run cheapest and most specific first, and the first failure wins:
//!
//! 1. input extension is a registered input      → `UnsupportedInputFormat`
//! 2. target names one of the enumerated formats → `UnsupportedTargetFormat`
//! 3. input and target differ                    → `SameFormatConversion`
//! 4. a direct edge or a bridge connects them    → `UnsupportedConversionPath`
//!
//! A pair with only a bridge passes; the bridge is attempted at execution time.

use crate::error::DocBridgeError;
use crate::pipeline::registry::{Format, FormatRegistry};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// How the orchestrator should reach the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Route {
    /// Try the direct edge; fall back to `fallback` if it leaves no artifact.
    Direct { fallback: Option<Format> },
    /// No direct edge; go straight to the two-hop bridge.
    BridgeOnly { via: Format },
}

/// Outcome of a successful validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversionPlan {
    pub source: Format,
    pub target: Format,
    pub route: Route,
}

/// Lowercased text after the last `.` of the final path component, or an
/// empty string if there is none. A bare `.docx` counts as `docx`.
pub fn extension_of(filename: &str) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    base.rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default()
}

/// Validate a raw filename and target string into a [`ConversionPlan`].
pub fn validate(
    registry: &FormatRegistry,
    filename: &str,
    target: &str,
) -> Result<ConversionPlan, DocBridgeError> {
    let ext = extension_of(filename);
    let source = Format::parse(&ext)
        .filter(|f| registry.is_supported_input(*f))
        .ok_or(DocBridgeError::UnsupportedInputFormat { format: ext })?;

    let target = Format::parse(target)
        .filter(|f| registry.is_supported_target(*f))
        .ok_or_else(|| DocBridgeError::UnsupportedTargetFormat {
            format: target.trim().to_ascii_lowercase(),
        })?;

    let route = plan_route(registry, source, target)?;

    debug!(filename, %source, %target, ?route, "Request validated");
    Ok(ConversionPlan {
        source,
        target,
        route,
    })
}

/// Resolve the route between two already-recognised formats (checks 3 and 4).
pub fn plan_route(
    registry: &FormatRegistry,
    source: Format,
    target: Format,
) -> Result<Route, DocBridgeError> {
    if source == target {
        return Err(DocBridgeError::SameFormatConversion { format: source });
    }

    let bridge = registry.bridge_for(source, target);
    if registry.direct_edge_exists(source, target) {
        Ok(Route::Direct { fallback: bridge })
    } else if let Some(via) = bridge {
        Ok(Route::BridgeOnly { via })
    } else {
        Err(DocBridgeError::UnsupportedConversionPath {
            source_format: source,
            target,
        })
    }
}
