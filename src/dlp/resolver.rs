//! Span-conflict resolution for candidate findings.
//!
//! Rules are matched independently, so two rules can claim overlapping spans
//! (a raw hex key inside a longer token, an address inside a dump). Masking
//! overlapping spans is ill-defined, so exactly one finding survives per
//! contested region:
//!
//! 1. Sort by `start_offset` ascending; ties go to the longer span (the more
//!    specific match), then to catalog order for fully identical spans.
//! 2. Sweep left to right, keeping a finding only if it is disjoint from
//!    everything already kept.
//!
//! The longer-span tie-break exists so a short pattern sitting inside a
//! longer sensitive token can never cause only a fragment of that token to
//! be masked.

use super::Finding;

/// Reduce candidate findings to a non-overlapping set, sorted ascending by
/// `start_offset` as the masker requires. Deterministic for a given catalog.
pub fn resolve(mut findings: Vec<Finding>) -> Vec<Finding> {
    findings.sort_by(|a, b| {
        a.start_offset
            .cmp(&b.start_offset)
            .then_with(|| b.span_len().cmp(&a.span_len()))
            .then_with(|| a.rule_rank.cmp(&b.rule_rank))
    });

    let mut kept: Vec<Finding> = Vec::with_capacity(findings.len());
    for candidate in findings {
        // Sorted by start, so only the most recently kept span can overlap.
        let clear = kept
            .last()
            .map_or(true, |prev| prev.end_offset <= candidate.start_offset);
        if clear {
            kept.push(candidate);
        }
    }
    kept
}
