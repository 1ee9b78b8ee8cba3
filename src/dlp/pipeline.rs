//! Per-message orchestration of the detection stages.
//!
//! One `process` call takes a raw message through Scan → Resolve → Mask →
//! Decide, strictly in that order, and packages the result for the gateway.
//! The stages are pure and synchronous; delivery, storage, and notification
//! happen outside, in the gateway, after the decision is made.
//!
//! Fail-safe policy: if the masker reports a contract violation (which the
//! resolver's output should make impossible), the message is treated as
//! fully sensitive. It comes back `blocked` with the text unmasked, and the
//! failure is logged. A blocked message is never delivered, so unmasked
//! content cannot leak through this path.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::error;

use super::catalog::PatternCatalog;
use super::scanner::Scanner;
use super::{decision, masker, resolver, Finding};

/// Per-call knobs for the block decision, sourced from configuration and
/// hot-reloadable at the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectionSettings {
    /// Master switch for withholding messages.
    #[serde(default = "default_block_enabled")]
    pub block_enabled: bool,
    /// Findings must exceed this confidence (strictly) to block.
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
}

fn default_block_enabled() -> bool {
    true
}

fn default_confidence_threshold() -> f64 {
    0.85
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            block_enabled: default_block_enabled(),
            confidence_threshold: default_confidence_threshold(),
        }
    }
}

/// Result of one pipeline run, ready for the gateway to act on.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedMessage {
    pub original_text: String,
    /// The deliverable rewrite. Equal to the original when nothing matched,
    /// or when the fail-safe path fired (in which case `blocked` is true).
    pub masked_text: String,
    /// Findings that were applied, sorted ascending by `start_offset`.
    pub findings: Vec<Finding>,
    pub blocked: bool,
    /// Category of the finding that tripped the block, if any.
    pub trigger_type: Option<String>,
}

impl ProcessedMessage {
    pub fn has_findings(&self) -> bool {
        !self.findings.is_empty()
    }
}

/// Stateless per-message processor around a shared [`PatternCatalog`].
#[derive(Debug, Clone)]
pub struct MessagePipeline {
    scanner: Scanner,
}

impl MessagePipeline {
    pub fn new(catalog: Arc<PatternCatalog>) -> Self {
        Self {
            scanner: Scanner::new(catalog),
        }
    }

    pub fn catalog(&self) -> &PatternCatalog {
        self.scanner.catalog()
    }

    /// Run the full detection chain for one message.
    ///
    /// Pure and infallible for well-formed input: internal failures fold
    /// into the blocked fail-safe rather than surfacing as errors.
    pub fn process(&self, text: &str, settings: &DetectionSettings) -> ProcessedMessage {
        let scan = self.scanner.scan(text);
        let kept = resolver::resolve(scan.findings);

        let masked = match masker::apply(text, &kept) {
            Ok(masked) => masked,
            Err(e) => {
                error!("masking failed, withholding message: {}", e);
                return ProcessedMessage {
                    original_text: text.to_string(),
                    masked_text: text.to_string(),
                    findings: kept,
                    blocked: true,
                    trigger_type: None,
                };
            }
        };

        let decision = decision::should_block(
            &masked.applied,
            settings.confidence_threshold,
            settings.block_enabled,
        );

        ProcessedMessage {
            original_text: text.to_string(),
            masked_text: masked.masked,
            findings: masked.applied,
            blocked: decision.blocked,
            trigger_type: decision.trigger.map(|f| f.finding_type),
        }
    }
}
