//! Pipeline stages for document conversion.
//!
//! Each submodule owns exactly one concern so it can be tested on its own
//! and so the orchestrator in [`crate::convert`] reads as a plain sequence
//! of steps.
//!
//! ## Data Flow
//!
//! ```text
//! validate ──▶ artifact ──▶ engine ──▶ verify ──▶ (bridge: engine ──▶ verify) ×2
//! (registry)   (staging)    (soffice)  (exists?)
//! ```
//!
//! 1. [`registry`] holds the formats, direct edges and bridges
//! 2. [`validate`] rejects bad requests before anything touches disk
//! 3. [`artifact`] gives each request collision-free paths and handles cleanup
//! 4. [`engine`] runs the external converter and waits for it to exit
//! 5. [`verify`] decides success by looking for the expected output file

pub mod artifact;
pub mod engine;
pub mod registry;
pub mod validate;
pub mod verify;
