//! # docbridge
//!
//! Convert office documents between docx, pdf and pptx by orchestrating a
//! headless LibreOffice engine.
//!
//! ## Why an orchestrator?
//!
//! `soffice --headless --convert-to` does the rendering, but it is an
//! unreliable narrator: it happily exits 0 without writing anything when a
//! document is malformed or a conversion is not really supported. This crate
//! wraps it with the parts that make it safe to put behind a service:
//!
//! * an explicit table of permitted conversions, with clear rejections,
//! * success decided by the presence of the output file, never the exit code,
//! * a bounded two-hop fallback (docx → pdf → pptx) when the direct route
//!   leaves nothing behind,
//! * per-request unique artifact names, a concurrency cap and a kill timeout
//!   for the engine.
//!
//! ## Pipeline Overview
//!
//! ```text
//! upload
//!  │
//!  ├─ 1. Validate  extension, target, same-format, route
//!  ├─ 2. Stage     uploads/<uuid>_<name>
//!  ├─ 3. Engine    soffice --headless --convert-to <fmt> … --outdir outputs
//!  ├─ 4. Verify    outputs/<uuid>_<stem>.<fmt> exists and is non-empty
//!  └─ 5. Bridge    on failure, via the registered intermediate (two hops max)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docbridge::{convert, ConverterConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConverterConfig::default();
//!     let outcome = convert("notes.docx", "pptx", &config).await?;
//!     println!("{} via {:?}", outcome.artifact.display(), outcome.route);
//!     for (name, value) in outcome.headers() {
//!         eprintln!("{name}: {value}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Supported Conversions
//!
//! | From | To          | Notes                                  |
//! |------|-------------|----------------------------------------|
//! | docx | pdf, pptx   | pptx falls back to docx → pdf → pptx   |
//! | pdf  | docx, pptx  |                                        |
//! | pptx | pdf         |                                        |
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docbridge` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConverterConfig, ConverterConfigBuilder};
pub use convert::{convert, convert_sync, convert_to_file, copy_atomic, Converter};
pub use error::DocBridgeError;
pub use output::{
    ConversionAttempt, ConversionOutcome, ConversionRequest, RouteTaken, INPUT_FORMAT_HEADER,
    TARGET_FORMAT_HEADER,
};
pub use pipeline::artifact::{Artifact, ArtifactStore, SweepReport};
pub use pipeline::engine::{ConversionEngine, EngineInvocation, SofficeEngine};
pub use pipeline::registry::{Format, FormatRegistry, FormatRegistryBuilder};
pub use pipeline::validate::{ConversionPlan, Route};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
