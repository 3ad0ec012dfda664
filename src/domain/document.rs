//! The `document` module defines [`SourceDocument`] and [`OriginalAddress`], the source-pool (SP)
//! side of a match.
use crate::components::Components;
use crate::utils::canonicalize;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A planning/property document awaiting an address match. The `planning_app_base`/
/// `planning_app_sequence` split lets sibling documents on the same planning application (an
/// amendment, a discharge, an enforcement notice) be grouped for the L3a/L4 layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDocument {
    /// Stable identifier for this document.
    pub id: Uuid,
    /// Document type (e.g. "decision_notice", "land_charge", "enforcement_notice").
    pub doc_type: String,
    /// Ingestion job identifier, for provenance only.
    pub job_id: String,
    /// Raw address text as received.
    pub raw_address: String,
    /// Raw address text after L0 cleansing; `None` until L0 has run.
    pub standardized_address: Option<String>,
    /// Raw UPRN, when the source carries one.
    pub raw_uprn: Option<String>,
    /// External planning reference (as printed on the document).
    pub external_reference: String,
    /// Document date.
    pub date: String,
    /// Pre-parsed components, when the upstream gopostal pass succeeded.
    pub parsed_components: Option<Components>,
    /// Whether the upstream gopostal pass produced components for this document.
    pub gopostal_processed: bool,
    /// The planning-application base (the part before the first "/").
    pub planning_app_base: String,
    /// The planning-application sequence (the part after the first "/", if any).
    pub planning_app_sequence: Option<String>,
}

impl SourceDocument {
    /// Splits `external_reference` into `(base, sequence)` on the first `/`, the convention
    /// this domain uses to group sibling documents under one planning application.
    pub fn split_planning_reference(external_reference: &str) -> (String, Option<String>) {
        match external_reference.split_once('/') {
            Some((base, seq)) => (base.to_string(), Some(seq.to_string())),
            None => (external_reference.to_string(), None),
        }
    }

    /// The address text a layer should match against: the standardized address if L0 has run,
    /// else the raw address.
    pub fn match_address(&self) -> &str {
        self.standardized_address
            .as_deref()
            .unwrap_or(&self.raw_address)
    }

    /// The canonical form of [`Self::match_address`], used by L1's canonical-equality phases.
    pub fn canonical(&self) -> String {
        canonicalize(self.match_address())
    }

    /// The key used to group this document with its [`OriginalAddress`] dimension row: the
    /// canonical form of the raw address, independent of any later standardization.
    pub fn original_address_key(&self) -> String {
        canonicalize(&self.raw_address)
    }
}

/// The deduplication dimension: one row per distinct normalized raw address, shared by every
/// `SourceDocument` whose raw address normalizes to the same key. L2's address-level
/// propagation updates every document sharing an `OriginalAddress` in one pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OriginalAddress {
    /// Stable identifier, keyed by the hash of the normalized raw address.
    pub id: Uuid,
    /// The normalized (canonical) raw address text.
    pub normalized_raw: String,
    /// Parsed components, carried over from the first document observed with this address.
    pub components: Option<Components>,
    /// Number of `SourceDocument` rows sharing this normalized address.
    pub usage_count: u64,
}

impl OriginalAddress {
    /// Constructs a new `OriginalAddress` dimension row for `normalized_raw`.
    pub fn new(normalized_raw: impl Into<String>, components: Option<Components>) -> Self {
        Self {
            id: Uuid::new_v4(),
            normalized_raw: normalized_raw.into(),
            components,
            usage_count: 0,
        }
    }
}
