//! Block policy: decide whether a message is withheld from delivery.

use super::{BlockDecision, Finding};

/// A message is blocked iff blocking is enabled and at least one finding's
/// confidence strictly exceeds `threshold`. A finding at exactly the
/// threshold does not block. Pattern findings carry confidence 1.0, so any
/// pattern match blocks whenever `threshold < 1.0`.
pub fn should_block(findings: &[Finding], threshold: f64, block_enabled: bool) -> BlockDecision {
    if !block_enabled {
        return BlockDecision {
            blocked: false,
            trigger: None,
        };
    }

    let trigger = findings.iter().find(|f| f.confidence > threshold).cloned();
    BlockDecision {
        blocked: trigger.is_some(),
        trigger,
    }
}
