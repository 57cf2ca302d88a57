//! Format registry: the enumerated formats and the conversion graph between them.
//!
//! The graph has two kinds of entries:
//!
//! * **Direct edges**: `(source, target)` pairs the engine converts in one
//!   invocation.
//! * **Bridges**: `(source, target) → intermediate` routes tried when the
//!   direct attempt leaves no artifact (or no direct edge exists at all).
//!
//! The standard table is built once on first use and never mutated, so
//! lookups need no locking. Custom tables are assembled with
//! [`FormatRegistry::builder`].

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// A supported document format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Docx,
    Pdf,
    Pptx,
}

impl Format {
    /// Every format, in display order.
    pub const ALL: [Format; 3] = [Format::Docx, Format::Pdf, Format::Pptx];

    /// Parse a user-supplied format name or extension, ignoring case and a
    /// leading dot.
    pub fn parse(s: &str) -> Option<Format> {
        let s = s.trim();
        let s = s.strip_prefix('.').unwrap_or(s);
        match s.to_ascii_lowercase().as_str() {
            "docx" => Some(Format::Docx),
            "pdf" => Some(Format::Pdf),
            "pptx" => Some(Format::Pptx),
            _ => None,
        }
    }

    /// Lowercase name, also the value passed to `--convert-to`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Docx => "docx",
            Format::Pdf => "pdf",
            Format::Pptx => "pptx",
        }
    }

    /// Conventional file extension of artifacts in this format.
    pub fn extension(&self) -> &'static str {
        self.as_str()
    }

    /// IANA media type used when the artifact is served for download.
    pub fn media_type(&self) -> &'static str {
        match self {
            Format::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            Format::Pdf => "application/pdf",
            Format::Pptx => {
                "application/vnd.openxmlformats-officedocument.presentationml.presentation"
            }
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Format::parse(s).ok_or_else(|| format!("unknown format '{s}' (expected docx, pdf or pptx)"))
    }
}

/// Read-only conversion graph.
#[derive(Debug, Clone, Default)]
pub struct FormatRegistry {
    inputs: HashSet<Format>,
    edges: HashMap<Format, HashSet<Format>>,
    bridges: HashMap<(Format, Format), Format>,
}

static STANDARD: Lazy<Arc<FormatRegistry>> = Lazy::new(|| {
    let registry = FormatRegistry::builder()
        .edge(Format::Docx, Format::Pdf)
        .edge(Format::Docx, Format::Pptx)
        .edge(Format::Pdf, Format::Docx)
        .edge(Format::Pdf, Format::Pptx)
        .edge(Format::Pptx, Format::Pdf)
        .bridge(Format::Docx, Format::Pptx, Format::Pdf)
        .build();
    Arc::new(registry)
});

impl FormatRegistry {
    /// The process-wide table of conversions LibreOffice handles.
    pub fn standard() -> &'static FormatRegistry {
        &STANDARD
    }

    /// Shared handle to [`FormatRegistry::standard`].
    pub fn shared() -> Arc<FormatRegistry> {
        Arc::clone(&STANDARD)
    }

    pub fn builder() -> FormatRegistryBuilder {
        FormatRegistryBuilder {
            registry: FormatRegistry::default(),
        }
    }

    /// `true` if `format` is the source of at least one edge or bridge.
    pub fn is_supported_input(&self, format: Format) -> bool {
        self.inputs.contains(&format)
    }

    /// `true` for every enumerated format. Target recognition is independent
    /// of the edge table so an unknown target gets its own rejection.
    pub fn is_supported_target(&self, format: Format) -> bool {
        Format::ALL.contains(&format)
    }

    pub fn direct_edge_exists(&self, source: Format, target: Format) -> bool {
        self.edges
            .get(&source)
            .is_some_and(|targets| targets.contains(&target))
    }

    /// Intermediate format registered for `(source, target)`, if any.
    pub fn bridge_for(&self, source: Format, target: Format) -> Option<Format> {
        self.bridges.get(&(source, target)).copied()
    }

    /// All direct edges, sorted for stable display.
    pub fn edges(&self) -> Vec<(Format, Format)> {
        let sorted: BTreeSet<(Format, Format)> = self
            .edges
            .iter()
            .flat_map(|(s, targets)| targets.iter().map(move |t| (*s, *t)))
            .collect();
        sorted.into_iter().collect()
    }

    /// All bridges as `(source, target, intermediate)`, sorted.
    pub fn bridges(&self) -> Vec<(Format, Format, Format)> {
        let mut out: Vec<_> = self
            .bridges
            .iter()
            .map(|((s, t), via)| (*s, *t, *via))
            .collect();
        out.sort_unstable();
        out
    }
}

/// Builder for [`FormatRegistry`].
#[derive(Debug)]
pub struct FormatRegistryBuilder {
    registry: FormatRegistry,
}

impl FormatRegistryBuilder {
    /// Register a direct edge. Self-loops are ignored.
    pub fn edge(mut self, source: Format, target: Format) -> Self {
        if source != target {
            self.registry.inputs.insert(source);
            self.registry.edges.entry(source).or_default().insert(target);
        }
        self
    }

    /// Register a two-hop route. Ignored unless the three formats are
    /// pairwise distinct.
    pub fn bridge(mut self, source: Format, target: Format, via: Format) -> Self {
        if source != target && via != source && via != target {
            self.registry.inputs.insert(source);
            self.registry.bridges.insert((source, target), via);
        }
        self
    }

    pub fn build(self) -> FormatRegistry {
        self.registry
    }
}
