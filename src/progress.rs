//! Progress-callback trait for hop-level conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConverterConfigBuilder::progress_callback`] to observe
//! each engine hop as it starts and finishes. Callers can forward the events
//! to a terminal spinner, a log, or a metrics sink; the library does not care.
//!
//! # Example
//!
//! ```rust
//! use docbridge::{ConversionProgressCallback, ConverterConfig, Format};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct HopCounter {
//!     hops: AtomicUsize,
//! }
//!
//! impl ConversionProgressCallback for HopCounter {
//!     fn on_hop_complete(&self, _request: &str, _hop: usize, _target: Format, _verified: bool) {
//!         self.hops.fetch_add(1, Ordering::SeqCst);
//!     }
//! }
//!
//! let config = ConverterConfig::builder()
//!     .progress_callback(Arc::new(HopCounter { hops: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::pipeline::registry::Format;
use std::sync::Arc;

/// Called by the orchestrator as a request moves through its hops.
///
/// `request` is the original file name of the upload. `hop` counts engine
/// invocations within one request, starting at 1.
///
/// Implementations must be `Send + Sync`: several requests may run at once.
/// All methods have no-op defaults.
pub trait ConversionProgressCallback: Send + Sync {
    /// A validated request is about to run.
    fn on_conversion_start(&self, request: &str, source: Format, target: Format) {
        let _ = (request, source, target);
    }

    /// The engine is about to be invoked.
    fn on_hop_start(&self, request: &str, hop: usize, target: Format) {
        let _ = (request, hop, target);
    }

    /// The engine terminated and its artifact was checked.
    fn on_hop_complete(&self, request: &str, hop: usize, target: Format, verified: bool) {
        let _ = (request, hop, target, verified);
    }

    /// The request finished. `error` is `None` on success.
    fn on_conversion_complete(&self, request: &str, error: Option<&str>) {
        let _ = (request, error);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConverterConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;
