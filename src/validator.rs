//! The `validator` module implements the stateless [`Validator`] component: given a source
//! address string and a candidate canonical address string, it decides whether the candidate is
//! a trustworthy match.
use crate::parser::Parser;
use crate::similarity::trigram_similarity;
use regex::Regex;
use std::sync::LazyLock;

static VAGUE_PHRASES: &[&str] = &[
    "LAND AT",
    "REAR OF",
    "ADJACENT TO",
    "ADJOINING",
    "OPPOSITE",
    "LAND ADJ",
    "SITE AT",
];

static REFERENCE_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{1,3}\d+(/\d+)?$").expect("valid reference-code regex"));

static PLACEHOLDER_VALUES: &[&str] = &["N/A", "NONE", "TBC"];

/// The verdict the Validator reaches for a single (source, candidate) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The candidate is trustworthy enough to write into the fact table automatically.
    Accept,
    /// The candidate is plausible but should be flagged for manual review.
    Review,
    /// The candidate conflicts with the source and must not be used.
    Reject,
}

/// The full decision the Validator returns for one candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    /// Accept / Review / Reject.
    pub outcome: Outcome,
    /// Confidence in `[0.0, 1.0]`.
    pub confidence: f64,
    /// Human-readable rationale, e.g. "house number mismatch".
    pub reason: String,
    /// A short label describing which rule produced the confidence score, for debug tracing.
    pub method_label: &'static str,
    /// Whether the house numbers matched, when both sides had one.
    pub house_match: Option<bool>,
    /// Street-name trigram similarity, `[0.0, 1.0]`.
    pub street_match: f64,
    /// Whether unit designators matched, when both sides had one.
    pub unit_match: Option<bool>,
}

/// Why an address is unsuitable for matching at all (too vague, too short, a bare reference
/// code, or a known placeholder value).
#[derive(Debug, Clone, PartialEq)]
pub enum Unsuitable {
    /// Matches a known vague-address phrase (e.g. "land at", "rear of").
    VaguePhrase,
    /// Shorter than the minimum usable length (10 characters).
    TooShort,
    /// Shaped like a bare planning/reference code (e.g. "AB123/4") rather than an address.
    ReferenceCodeShape,
    /// Equal to a known placeholder value (N/A, NONE, TBC).
    Placeholder,
}

/// The result of [`Validator::suitable_for_matching`].
#[derive(Debug, Clone, PartialEq)]
pub enum Suitability {
    /// The address is usable as matching input.
    Ok,
    /// The address should not be sent through the fuzzy matching layers.
    Unsuitable(Vec<Unsuitable>),
}

impl Suitability {
    /// True for [`Suitability::Ok`].
    pub fn is_ok(&self) -> bool {
        matches!(self, Suitability::Ok)
    }
}

/// Stateless address-match validator.
#[derive(Debug, Copy, Clone, Default)]
pub struct Validator;

impl Validator {
    /// Parses `address` into a [`crate::parser::ParsedAddress`] via the rule-based parser.
    pub fn parse(address: &str) -> crate::parser::ParsedAddress {
        Parser::parse(address)
    }

    /// Screens `address` for the vague-phrase, length, reference-code-shape and placeholder
    /// exclusions, independent of any candidate.
    pub fn suitable_for_matching(address: &str) -> Suitability {
        let trimmed = address.trim();
        let upper = trimmed.to_uppercase();
        let mut reasons = Vec::new();

        if PLACEHOLDER_VALUES.contains(&upper.as_str()) {
            reasons.push(Unsuitable::Placeholder);
        }
        if trimmed.len() < 10 {
            reasons.push(Unsuitable::TooShort);
        }
        if VAGUE_PHRASES.iter().any(|phrase| upper.contains(phrase)) {
            reasons.push(Unsuitable::VaguePhrase);
        }
        if REFERENCE_CODE.is_match(&upper) {
            reasons.push(Unsuitable::ReferenceCodeShape);
        }

        if reasons.is_empty() {
            Suitability::Ok
        } else {
            Suitability::Unsuitable(reasons)
        }
    }

    /// Decides whether `candidate_full` is a trustworthy match for `source_raw`.
    pub fn validate(source_raw: &str, candidate_full: &str) -> Decision {
        let source = Self::parse(source_raw);
        let candidate = Self::parse(candidate_full);

        let house_match = match (&source.house_number, &candidate.house_number) {
            (Some(a), Some(b)) => Some(a.to_uppercase() == b.to_uppercase()),
            _ => None,
        };
        if house_match == Some(false) {
            return Decision {
                outcome: Outcome::Reject,
                confidence: 0.0,
                reason: "house number mismatch".to_string(),
                method_label: "house_number_conflict",
                house_match,
                street_match: 0.0,
                unit_match: None,
            };
        }

        // Unit conflict: reuse the trailing-locality text as a coarse unit check since
        // ParsedAddress has no dedicated unit field; any explicit "FLAT"/"UNIT" token present on
        // both sides must agree.
        let unit_match = Self::unit_match(source_raw, candidate_full);
        if unit_match == Some(false) {
            return Decision {
                outcome: Outcome::Reject,
                confidence: 0.0,
                reason: "unit mismatch".to_string(),
                method_label: "unit_conflict",
                house_match,
                street_match: 0.0,
                unit_match,
            };
        }

        let street_match = match (&source.street, &candidate.street) {
            (Some(a), Some(b)) => trigram_similarity(a, b),
            _ => trigram_similarity(source_raw, candidate_full),
        };

        let postcode_match = matches!(
            (&source.postcode, &candidate.postcode),
            (Some(a), Some(b)) if a == b
        );
        let city_match = matches!(
            (&source.locality, &candidate.locality),
            (Some(a), Some(b)) if a.eq_ignore_ascii_case(b)
        );
        let house_ok = house_match.unwrap_or(true);

        let (confidence, method_label) = if house_ok
            && postcode_match
            && city_match
            && street_match >= 0.95
        {
            (0.98, "full_component_exact")
        } else if house_ok && postcode_match {
            (0.90, "postcode_and_house")
        } else if house_ok && street_match >= 0.90 {
            (0.80, "street_similarity_high")
        } else if house_ok && street_match >= 0.70 {
            (0.65, "street_similarity_moderate")
        } else {
            (street_match.min(0.60), "street_similarity_low")
        };

        let outcome = if confidence >= 0.75 {
            Outcome::Accept
        } else if confidence >= 0.50 {
            Outcome::Review
        } else {
            Outcome::Reject
        };

        let reason = match outcome {
            Outcome::Accept => format!("{method_label} (confidence {confidence:.2})"),
            Outcome::Review => format!("borderline match via {method_label} (confidence {confidence:.2})"),
            Outcome::Reject => format!("insufficient similarity via {method_label} (confidence {confidence:.2})"),
        };

        Decision {
            outcome,
            confidence,
            reason,
            method_label,
            house_match,
            street_match,
            unit_match,
        }
    }

    fn unit_match(source_raw: &str, candidate_full: &str) -> Option<bool> {
        let extract = |s: &str| -> Option<String> {
            let upper = s.to_uppercase();
            for marker in ["FLAT", "UNIT", "APARTMENT", "SUITE"] {
                if let Some(idx) = upper.find(marker) {
                    let rest = &upper[idx + marker.len()..];
                    let token: String = rest
                        .trim_start()
                        .chars()
                        .take_while(|c| c.is_alphanumeric())
                        .collect();
                    if !token.is_empty() {
                        return Some(token);
                    }
                }
            }
            None
        };
        match (extract(source_raw), extract(candidate_full)) {
            (Some(a), Some(b)) => Some(a == b),
            _ => None,
        }
    }
}
