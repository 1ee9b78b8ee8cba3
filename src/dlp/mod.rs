//! Detection-and-masking engine.
//!
//! The engine is a chain of pure, synchronous stages, each owned by one
//! pipeline invocation:
//!
//! - **[`catalog`]** — static registry of sensitive-data pattern rules
//! - **[`scanner`]** — applies every rule to an input text, producing findings
//! - **[`resolver`]** — drops overlapping findings so masking stays well-defined
//! - **[`masker`]** — rewrites the text, replacing each finding's span with its mask
//! - **[`decision`]** — decides whether the message is withheld from delivery
//! - **[`pipeline`]** — runs the stages in order for one inbound message
//!
//! Nothing in this module performs I/O. The only shared state is the
//! [`catalog::PatternCatalog`], which is immutable after load.

pub mod catalog;
pub mod decision;
pub mod masker;
pub mod pipeline;
pub mod resolver;
pub mod scanner;

pub use catalog::PatternCatalog;
pub use pipeline::{DetectionSettings, MessagePipeline, ProcessedMessage};
pub use scanner::Scanner;

use serde::Serialize;

/// How a finding was produced. Pattern matching is the only shipping source;
/// the enum is non-exhaustive so a statistical classifier can be added as a
/// second finding source later without touching the downstream stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum DetectionMethod {
    Pattern,
}

impl DetectionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionMethod::Pattern => "pattern",
        }
    }
}

/// One detected occurrence of sensitive data in a message.
///
/// Offsets are byte offsets into the scanned text, `end_offset` exclusive.
/// The `regex` crate only ever reports offsets on UTF-8 character boundaries,
/// so slicing the source text with them is safe.
#[derive(Debug, Clone, Serialize)]
pub struct Finding {
    /// Category name from the catalog (e.g. `email`, `credit_card`).
    pub finding_type: String,
    /// The matched substring, verbatim.
    pub original_value: String,
    /// Byte offset of the first matched byte.
    pub start_offset: usize,
    /// Byte offset one past the last matched byte.
    pub end_offset: usize,
    /// Detection confidence in `0.0..=1.0`. Pattern matches are always 1.0.
    pub confidence: f64,
    /// Which detector produced this finding.
    pub detection_method: DetectionMethod,
    /// Replacement text for this match, resolved from the rule's mask template.
    pub mask_value: String,
    /// Position of the originating rule in catalog order. Used as the final
    /// tie-break when two findings cover the identical span.
    #[serde(skip)]
    pub(crate) rule_rank: usize,
}

impl Finding {
    /// Length of the matched span in bytes.
    pub fn span_len(&self) -> usize {
        self.end_offset - self.start_offset
    }

    /// Whether this finding's span overlaps another's.
    pub fn overlaps(&self, other: &Finding) -> bool {
        self.start_offset < other.end_offset && other.start_offset < self.end_offset
    }
}

/// Output of one [`scanner::Scanner::scan`] call: the candidate findings plus
/// the text they were found in. Findings may overlap; feed them through
/// [`resolver::resolve`] before masking.
#[derive(Debug)]
pub struct ScanResult<'a> {
    /// The scanned text.
    pub text: &'a str,
    /// Candidate findings in catalog-rule order, then match order.
    pub findings: Vec<Finding>,
}

impl ScanResult<'_> {
    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }
}

/// The rewritten message plus the findings that were actually applied,
/// sorted ascending by `start_offset` and pairwise disjoint.
#[derive(Debug, Clone)]
pub struct MaskedText {
    pub masked: String,
    pub applied: Vec<Finding>,
}

/// Whether a message is withheld from delivery, and which finding tripped it.
#[derive(Debug, Clone)]
pub struct BlockDecision {
    pub blocked: bool,
    /// The first finding whose confidence exceeded the threshold, if any.
    pub trigger: Option<Finding>,
}
