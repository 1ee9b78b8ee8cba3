//! Deterministic text rewriting.
//!
//! The masker is a single forward pass over the immutable source text: every
//! unmatched region is copied byte-for-byte and every finding's span is
//! replaced with its mask value. Offsets always refer to the original text,
//! never to partially-rewritten output, so replacements of differing length
//! cannot drift later spans.

use super::{Finding, MaskedText};
use crate::error::{MsgShieldError, Result};

/// Rewrite `text`, substituting each finding's `mask_value` for its span.
///
/// Callers must pass the output of [`resolve`](super::resolver::resolve):
/// findings sorted ascending by `start_offset`, pairwise disjoint, and in
/// bounds. A violation is a programming error in the caller; it is reported
/// as [`MsgShieldError::Precondition`] rather than risking corrupted output.
pub fn apply(text: &str, findings: &[Finding]) -> Result<MaskedText> {
    check_preconditions(text, findings)?;

    let mut masked = String::with_capacity(text.len());
    let mut cursor = 0;
    for finding in findings {
        masked.push_str(&text[cursor..finding.start_offset]);
        masked.push_str(&finding.mask_value);
        cursor = finding.end_offset;
    }
    masked.push_str(&text[cursor..]);

    Ok(MaskedText {
        masked,
        applied: findings.to_vec(),
    })
}

fn check_preconditions(text: &str, findings: &[Finding]) -> Result<()> {
    let mut cursor = 0;
    for finding in findings {
        let ok = finding.start_offset >= cursor
            && finding.start_offset < finding.end_offset
            && finding.end_offset <= text.len()
            && text.is_char_boundary(finding.start_offset)
            && text.is_char_boundary(finding.end_offset);
        debug_assert!(
            ok,
            "masker precondition violated: {:?} at cursor {}",
            finding, cursor
        );
        if !ok {
            return Err(MsgShieldError::Precondition(format!(
                "finding '{}' span {}..{} is out of order or out of bounds",
                finding.finding_type, finding.start_offset, finding.end_offset
            )));
        }
        cursor = finding.end_offset;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dlp::DetectionMethod;

    fn finding(name: &str, value: &str, start: usize, mask: &str) -> Finding {
        Finding {
            finding_type: name.to_string(),
            original_value: value.to_string(),
            start_offset: start,
            end_offset: start + value.len(),
            confidence: 1.0,
            detection_method: DetectionMethod::Pattern,
            mask_value: mask.to_string(),
            rule_rank: 0,
        }
    }

    #[test]
    fn no_findings_is_identity() {
        let out = apply("nothing to see here", &[]).unwrap();
        assert_eq!(out.masked, "nothing to see here");
        assert!(out.applied.is_empty());
    }

    #[test]
    fn empty_text_stays_empty() {
        let out = apply("", &[]).unwrap();
        assert_eq!(out.masked, "");
    }

    #[test]
    fn single_span_is_replaced() {
        let text = "My SSN is 123-45-6789.";
        let f = finding("ssn", "123-45-6789", 10, "XXX-XX-XXXX");
        let out = apply(text, &[f]).unwrap();
        assert_eq!(out.masked, "My SSN is XXX-XX-XXXX.");
    }

    #[test]
    fn multiple_spans_preserve_unmatched_text() {
        let text = "mail a@b.com, card 4111111111111111, done";
        let email = finding("email", "a@b.com", 5, "[email_redacted]");
        let card = finding("credit_card", "4111111111111111", 19, "XXXX-XXXX-XXXX-XXXX");
        let out = apply(text, &[email, card]).unwrap();
        assert_eq!(
            out.masked,
            "mail [email_redacted], card XXXX-XXXX-XXXX-XXXX, done"
        );
    }

    #[test]
    fn mask_shorter_and_longer_than_span() {
        let text = "aaa SECRET bbb KEY ccc";
        let long = finding("a", "SECRET", 4, "**");
        let short = finding("b", "KEY", 15, "[key_redacted]");
        let out = apply(text, &[long, short]).unwrap();
        assert_eq!(out.masked, "aaa ** bbb [key_redacted] ccc");
    }

    #[test]
    fn span_at_text_boundaries() {
        let text = "4111111111111111";
        let card = finding("credit_card", text, 0, "XXXX-XXXX-XXXX-XXXX");
        let out = apply(text, &[card]).unwrap();
        assert_eq!(out.masked, "XXXX-XXXX-XXXX-XXXX");
    }

    #[test]
    fn unmatched_regions_concatenate_to_original_minus_spans() {
        let text = "one a@b.com two 123-45-6789 three";
        let email = finding("email", "a@b.com", 4, "[email_redacted]");
        let ssn = finding("ssn", "123-45-6789", 16, "XXX-XX-XXXX");
        let findings = [email, ssn];
        let out = apply(text, &findings).unwrap();

        // Strip the masks back out of the output; what remains must equal the
        // original text with the matched spans removed, in original order.
        let mut expected = String::new();
        let mut cursor = 0;
        for f in &findings {
            expected.push_str(&text[cursor..f.start_offset]);
            cursor = f.end_offset;
        }
        expected.push_str(&text[cursor..]);

        let mut stripped = out.masked.clone();
        for f in &findings {
            stripped = stripped.replacen(&f.mask_value, "", 1);
        }
        assert_eq!(stripped, expected);
    }

    #[test]
    fn multibyte_text_around_spans() {
        let text = "héllo a@b.com wörld";
        let start = text.find("a@b.com").unwrap();
        let email = finding("email", "a@b.com", start, "[email_redacted]");
        let out = apply(text, &[email]).unwrap();
        assert_eq!(out.masked, "héllo [email_redacted] wörld");
    }

    #[test]
    fn overlapping_findings_are_rejected() {
        let text = "abcdefghij";
        let a = finding("a", "abcde", 0, "[a]");
        let b = finding("b", "defgh", 3, "[b]");
        let result = std::panic::catch_unwind(|| apply(text, &[a, b]));
        // Release builds return the error; debug builds assert.
        match result {
            Ok(Err(MsgShieldError::Precondition(_))) => {}
            Err(_) => {} // debug_assert fired
            other => panic!("expected precondition failure, got {:?}", other.is_ok()),
        }
    }

    #[test]
    fn out_of_bounds_findings_are_rejected() {
        let text = "short";
        let f = finding("a", "toolongvalue", 2, "[a]");
        let result = std::panic::catch_unwind(|| apply(text, &[f]));
        match result {
            Ok(Err(MsgShieldError::Precondition(_))) => {}
            Err(_) => {}
            other => panic!("expected precondition failure, got {:?}", other.is_ok()),
        }
    }

    #[test]
    fn unsorted_findings_are_rejected() {
        let text = "abcdefghijklmno";
        let late = finding("a", "jkl", 9, "[a]");
        let early = finding("b", "abc", 0, "[b]");
        let result = std::panic::catch_unwind(|| apply(text, &[late, early]));
        match result {
            Ok(Err(MsgShieldError::Precondition(_))) => {}
            Err(_) => {}
            other => panic!("expected precondition failure, got {:?}", other.is_ok()),
        }
    }
}
