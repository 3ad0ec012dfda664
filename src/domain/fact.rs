//! The `fact` module defines the matching outcome types: [`MatchMethod`], [`Decision`],
//! [`FactRow`] and [`CorrectionRow`].
use crate::domain::location::Location;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The closed set of match methods a layer may record. Source integer method ids overlapped
/// across files in the system this crate reconciles; these variants are the authoritative
/// labels and nothing downstream should infer semantics from an integer tag.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumIter,
)]
pub enum MatchMethod {
    /// L1 phase 1: raw UPRN resolves directly to a non-historic gazetteer row.
    ExactUprn,
    /// L1 phase 2: canonical-form equality against the base gazetteer.
    ExactCanonical,
    /// L1 phase 3: canonical-form equality against the expanded (range) overlay.
    ExpandedCanonical,
    /// L2 step 1: raw UPRN resolved during conservative search.
    SourceUprn,
    /// L2 steps 2-5: one of the four conservative strategies, Validator-accepted.
    ConservativeComponent,
    /// L3a: group consensus representative matched by trigram similarity.
    GroupFuzzy,
    /// L3b: an individual document matched by trigram similarity.
    IndividualFuzzy,
    /// L4: a correction written from a planning-group's golden record.
    GroupConsensus,
    /// Reserved: LLM-assisted correction. Dead code in this domain; never emitted.
    GroupLlm,
}

/// The per-document decision tag. `Pending` is the state L1's unmatched-fill phase leaves a
/// document in; every subsequent layer either leaves it `Pending` or transitions it toward
/// `Accept`/`Review`/`Reject`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum Decision {
    /// Validator (or a deterministic phase) accepted the match.
    Accept,
    /// Validator flagged the match for manual review.
    Review,
    /// Validator rejected the candidate; the document remains unmatched.
    Reject,
    /// No candidate has been evaluated, or none was accepted.
    Pending,
}

/// One row per source document: the current best-known match, its confidence, and the method
/// that produced it. Re-created at the start of every pipeline run (L1 truncates then inserts).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactRow {
    /// The document this row matches.
    pub document_id: Uuid,
    /// The `OriginalAddress` dimension row this document's raw address maps to.
    pub original_address_id: Uuid,
    /// The matched gazetteer row, if any. May reference either a `CanonicalAddress` or an
    /// `ExpandedAddress`'s `original_address_id`, depending on which phase matched.
    pub matched_address_id: Option<Uuid>,
    /// The location of the matched address, kept in lock-step with `matched_address_id` per the
    /// location/address consistency invariant.
    pub matched_location: Option<Location>,
    /// The method that produced the current match, if any.
    pub method: Option<MatchMethod>,
    /// The current decision.
    pub decision: Decision,
    /// Confidence in `[0.0, 1.0]`.
    pub confidence: f64,
    /// Planning reference, carried through for the L3a/L4 grouping layers.
    pub planning_reference: String,
    /// True once `matched_address_id` is set.
    pub is_matched: bool,
    /// True when `confidence >= 0.9`.
    pub is_high_confidence: bool,
    /// True when the method is one of the deterministic/automatic methods (everything except a
    /// review-decision or a pending row).
    pub is_auto_processed: bool,
    /// True when the Validator flagged a review-worthy conflict along the way, even if a later
    /// phase ultimately accepted a different candidate.
    pub has_validation_issues: bool,
}

impl FactRow {
    /// Constructs the unmatched (`Pending`) fact row L1's fill phase inserts for a document with
    /// no deterministic match.
    pub fn pending(document_id: Uuid, original_address_id: Uuid, planning_reference: impl Into<String>) -> Self {
        Self {
            document_id,
            original_address_id,
            matched_address_id: None,
            matched_location: None,
            method: None,
            decision: Decision::Pending,
            confidence: 0.0,
            planning_reference: planning_reference.into(),
            is_matched: false,
            is_high_confidence: false,
            is_auto_processed: false,
            has_validation_issues: false,
        }
    }

    /// Applies a matched result to this row, recomputing the derived flags. Callers are
    /// responsible for only calling this when the monotonic-confidence rule permits the
    /// update; see [`crate::layers`] for the guarded call sites.
    pub fn apply_match(
        &mut self,
        matched_address_id: Uuid,
        matched_location: Location,
        method: MatchMethod,
        decision: Decision,
        confidence: f64,
    ) {
        self.matched_address_id = Some(matched_address_id);
        self.matched_location = Some(matched_location);
        self.method = Some(method);
        self.decision = decision;
        self.confidence = confidence;
        self.is_matched = true;
        self.is_high_confidence = confidence >= 0.9;
        self.is_auto_processed = !matches!(decision, Decision::Review);
        if matches!(decision, Decision::Review) {
            self.has_validation_issues = true;
        }
    }
}

/// A correction written by L4 when a planning group's golden record should override a
/// document's current match. Upsert-keyed on `document_id`; later corrections for the same
/// document overwrite earlier ones, but never an original L1 UPRN win (L4 never touches a
/// document whose current method is `ExactUprn`, `SourceUprn`, `ExactCanonical` or
/// `ExpandedCanonical` at matching-or-better confidence than the group consensus would offer —
/// enforced by the L4 layer, not by this type).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionRow {
    /// The document this correction applies to.
    pub document_id: Uuid,
    /// The planning-application base this correction's group consensus was computed over.
    pub planning_app_base: String,
    /// The document's original matched address, if any, before the correction.
    pub original_address_id: Option<Uuid>,
    /// The document's original confidence before the correction.
    pub original_confidence: f64,
    /// The golden-record address this correction points to.
    pub corrected_address_id: Uuid,
    /// The golden record's location.
    pub corrected_location: Location,
    /// Confidence assigned to the correction, keyed to the consensus vote count (0.85/0.90/0.95
    /// for 2/3/5+ votes).
    pub corrected_confidence: f64,
    /// The method recorded for the correction (`GroupConsensus`).
    pub corrected_method: MatchMethod,
    /// Human-readable rationale, e.g. "3/5 planning-group siblings matched UPRN 12345".
    pub reason: String,
}

/// Reconstructs the effective fact table by overlaying corrections onto original fact rows:
/// `coalesce(correction, original)` to produce the final, per-document fact.
pub fn effective_fact(original: &FactRow, correction: Option<&CorrectionRow>) -> FactRow {
    match correction {
        None => original.clone(),
        Some(c) => {
            let mut row = original.clone();
            row.apply_match(
                c.corrected_address_id,
                c.corrected_location,
                c.corrected_method,
                Decision::Accept,
                c.corrected_confidence,
            );
            row
        }
    }
}
