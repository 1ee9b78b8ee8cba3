//! Pattern catalog: the single source of truth for sensitive-data categories.
//!
//! Ships with built-in rules for the categories the gateway protects:
//!
//! | Category | Example |
//! |----------|---------|
//! | `email` | `alice@example.com` |
//! | `credit_card` | `4111 1111 1111 1111` |
//! | `phone` | `555-867-5309` |
//! | `ssn` | `123-45-6789` |
//! | `private_key` | PEM private key header |
//! | `api_key` | `api_key=...` / `secret: ...` |
//! | `eth_address` | `0x` + 40 hex chars |
//! | `private_key_hex` | 64 hex chars (raw wallet key) |
//! | `mnemonic` | 12–24 word seed phrase |
//!
//! Every rule pairs a regex with a literal mask template. Rules are validated
//! once at load: the pattern must compile, must not match the empty string,
//! and must not match any rule's mask template (so masked output never
//! re-triggers a scan). A catalog is immutable after construction and shared
//! read-only across concurrent scans.

use regex::Regex;

use crate::error::{MsgShieldError, Result};

/// Confidence assigned to every pattern match. A syntactic match is
/// deterministic, so pattern findings always carry full confidence.
pub const PATTERN_CONFIDENCE: f64 = 1.0;

/// Built-in rule table: (name, pattern, mask template). Order is the
/// catalog's stable iteration order and the resolver's final tie-break.
const BUILTIN_RULES: &[(&str, &str, &str)] = &[
    (
        "email",
        r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}",
        "[email_redacted]",
    ),
    (
        "credit_card",
        r"\b\d{4}[- ]?\d{4}[- ]?\d{4}[- ]?\d{4}\b",
        "XXXX-XXXX-XXXX-XXXX",
    ),
    ("phone", r"\b\d{3}[-.]?\d{3}[-.]?\d{4}\b", "(XXX) XXX-XXXX"),
    ("ssn", r"\b\d{3}-\d{2}-\d{4}\b", "XXX-XX-XXXX"),
    (
        "private_key",
        r"-----BEGIN (?:RSA|DSA|EC|OPENSSH) PRIVATE KEY-----",
        "**********",
    ),
    (
        "api_key",
        r"(?i)(?:api[_-]?key|apikey|secret)[=:]\s*[\w\-]{20,}",
        "[API_KEY_REDACTED]",
    ),
    ("eth_address", r"0x[a-fA-F0-9]{40}", "0x********"),
    ("private_key_hex", r"[a-fA-F0-9]{64}", "[PRIVATE_KEY_REDACTED]"),
    (
        "mnemonic",
        r"\b(?:[a-z]{3,9}\s+){11,23}[a-z]{3,9}\b",
        "[MNEMONIC_REDACTED]",
    ),
];

/// An unvalidated rule definition, as it appears in configuration.
#[derive(Debug, Clone)]
pub struct RuleSpec {
    pub name: String,
    pub pattern: String,
    pub mask: String,
}

/// A compiled, validated detection rule.
#[derive(Debug)]
pub struct PatternRule {
    /// Category name (e.g. `ssn`). Unique within a catalog.
    pub name: String,
    /// Compiled matcher.
    pub regex: Regex,
    /// Literal replacement substituted for every match of this rule.
    pub mask_template: String,
    /// Fixed confidence for matches of this rule.
    pub confidence: f64,
}

/// Ordered, immutable set of [`PatternRule`]s.
#[derive(Debug)]
pub struct PatternCatalog {
    rules: Vec<PatternRule>,
}

impl PatternCatalog {
    /// Catalog with all built-in rules.
    pub fn builtin() -> Self {
        // The built-in table is covered by tests; compilation cannot fail.
        Self::compile(&builtin_specs()).expect("built-in pattern catalog is valid")
    }

    /// Catalog assembled from configuration: the built-in rules (optionally
    /// restricted to `enabled` names) followed by `custom` rules.
    ///
    /// Fails fast with [`MsgShieldError::PatternConfig`] on any malformed
    /// rule, so a bad config prevents the gateway from serving traffic.
    pub fn from_config(enabled: Option<&[String]>, custom: &[RuleSpec]) -> Result<Self> {
        let mut specs: Vec<RuleSpec> = builtin_specs()
            .into_iter()
            .filter(|s| match enabled {
                Some(names) => names.iter().any(|n| n == &s.name),
                None => true,
            })
            .collect();
        specs.extend(custom.iter().cloned());
        Self::compile(&specs)
    }

    /// Catalog containing exactly the given rules, in the given order.
    pub fn from_specs(specs: &[RuleSpec]) -> Result<Self> {
        Self::compile(specs)
    }

    /// Rules in stable catalog order. The slice index is the rank the
    /// resolver uses to break ties between identical spans.
    pub fn rules(&self) -> &[PatternRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    fn compile(specs: &[RuleSpec]) -> Result<Self> {
        let mut rules = Vec::with_capacity(specs.len());
        for spec in specs {
            if rules.iter().any(|r: &PatternRule| r.name == spec.name) {
                return Err(MsgShieldError::PatternConfig(format!(
                    "duplicate rule name '{}'",
                    spec.name
                )));
            }
            let regex = Regex::new(&spec.pattern).map_err(|e| {
                MsgShieldError::PatternConfig(format!("rule '{}': {}", spec.name, e))
            })?;
            if regex.find("").is_some() {
                return Err(MsgShieldError::PatternConfig(format!(
                    "rule '{}' matches the empty string",
                    spec.name
                )));
            }
            rules.push(PatternRule {
                name: spec.name.clone(),
                regex,
                mask_template: spec.mask.clone(),
                confidence: PATTERN_CONFIDENCE,
            });
        }

        // A mask that itself matched a rule would make masking non-idempotent:
        // re-scanning masked output would find "sensitive" data again.
        for rule in &rules {
            for other in &rules {
                if rule.regex.is_match(&other.mask_template) {
                    return Err(MsgShieldError::PatternConfig(format!(
                        "rule '{}' matches the mask template of rule '{}'",
                        rule.name, other.name
                    )));
                }
            }
        }

        Ok(Self { rules })
    }
}

impl Default for PatternCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

fn builtin_specs() -> Vec<RuleSpec> {
    BUILTIN_RULES
        .iter()
        .map(|(name, pattern, mask)| RuleSpec {
            name: (*name).to_string(),
            pattern: (*pattern).to_string(),
            mask: (*mask).to_string(),
        })
        .collect()
}
