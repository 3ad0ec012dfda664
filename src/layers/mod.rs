//! The `layers` module implements the five matching layers (L0-L4) described by the pipeline:
//! cleansing, deterministic population, conservative validated search, fuzzy matching (group and
//! individual), and group-consensus correction. Each layer is a free function over the port
//! traits in [`crate::ports`] so it can run against the in-memory fakes in tests or a real store
//! in production.
mod l0_cleanse;
mod l1_deterministic;
mod l2_conservative;
mod l3a_group_fuzzy;
mod l3b_individual_fuzzy;
mod l4_group_consensus;

pub use l0_cleanse::cleanse;
pub use l1_deterministic::{populate_deterministic, L1Summary};
pub use l2_conservative::{conservative_search, L2Summary};
pub use l3a_group_fuzzy::{group_fuzzy_match, L3aSummary};
pub use l3b_individual_fuzzy::{individual_fuzzy_match, L3bSummary};
pub use l4_group_consensus::{group_consensus_correct, L4Summary};

use crate::domain::{Decision, FactRow, Location, MatchMethod, OriginalAddress};
use crate::domain::SourceDocument;
use crate::error::MatchError;
use crate::ports::{AddressCorpus, Candidate, FactStore};
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

/// Applies a candidate match to `row` only if `confidence` strictly improves on the row's
/// current confidence, enforcing the monotonic-confidence invariant shared by every layer:
/// a later layer may only raise a document's confidence, never lower it. Returns whether the
/// row was updated.
pub fn apply_if_better(
    row: &mut FactRow,
    matched_address_id: Uuid,
    matched_location: Location,
    method: MatchMethod,
    decision: Decision,
    confidence: f64,
) -> bool {
    if confidence > row.confidence {
        row.apply_match(matched_address_id, matched_location, method, decision, confidence);
        true
    } else {
        false
    }
}

/// The set of methods a document may only reach via L1, never overridden by a later layer's
/// ordinary write path (L4's correction overlay is the sole exception, and even then only when
/// the group consensus clears the bar described in [`l4_group_consensus`]).
pub fn is_deterministic_method(method: MatchMethod) -> bool {
    matches!(
        method,
        MatchMethod::ExactUprn
            | MatchMethod::ExactCanonical
            | MatchMethod::ExpandedCanonical
            | MatchMethod::SourceUprn
    )
}

/// Builds the `OriginalAddress` dedup dimension from a batch of source documents: one row per
/// distinct normalized raw address, with `usage_count` set to the number of documents sharing
/// it. This dimension is rebuilt fresh each pipeline run, in step with L1's fact-table truncate.
pub fn build_original_address_index(documents: &[SourceDocument]) -> HashMap<String, OriginalAddress> {
    let mut index: HashMap<String, OriginalAddress> = HashMap::new();
    for doc in documents {
        let key = doc.original_address_key();
        let entry = index
            .entry(key.clone())
            .or_insert_with(|| OriginalAddress::new(key, doc.parsed_components.clone()));
        entry.usage_count += 1;
    }
    index
}

/// Groups `documents` by their `original_address_key`, for layers that must propagate a match to
/// every document sharing the same normalized raw address (address-level dedup propagation).
pub fn group_by_original_address(documents: &[SourceDocument]) -> HashMap<String, Vec<SourceDocument>> {
    let mut groups: HashMap<String, Vec<SourceDocument>> = HashMap::new();
    for doc in documents {
        groups.entry(doc.original_address_key()).or_default().push(doc.clone());
    }
    groups
}

/// The confidence assigned to a group-consensus correction, keyed to the number of sibling
/// documents that agree on the same matched address (0.85/0.90/0.95 for 2/3/5+ votes).
pub fn consensus_confidence(vote_count: usize) -> f64 {
    match vote_count {
        0 | 1 => 0.0,
        2 => 0.85,
        3 | 4 => 0.90,
        _ => 0.95,
    }
}

/// Outcome of committing a layer's pending writes through [`commit_batches`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchCommitSummary {
    /// Rows successfully written.
    pub written: usize,
    /// Rows whose batch failed and was rolled back.
    pub failed: usize,
}

/// Commits `rows` to `store` in `batch_size`-sized chunks. Each batch is transactional: if any
/// row in it fails to upsert, every row already written earlier in that same batch is rolled
/// back to its prior value (a row with no prior value is simply left absent again), the failure
/// is logged and counted, and the driver moves on to the next batch rather than aborting the
/// layer. Mirrors L1's `if let Err(err) = store.upsert(...)` style, but at batch granularity and
/// with rollback, per the batch-transactional write requirement every automatic layer shares.
pub fn commit_batches(
    store: &dyn FactStore,
    rows: Vec<FactRow>,
    batch_size: usize,
    stage: &'static str,
) -> BatchCommitSummary {
    let mut summary = BatchCommitSummary::default();
    let batch_size = batch_size.max(1);

    for batch in rows.chunks(batch_size) {
        let mut applied: Vec<(Uuid, Option<FactRow>)> = Vec::with_capacity(batch.len());
        let mut failure: Option<(Uuid, crate::error::MatchError)> = None;

        for row in batch {
            let document_id = row.document_id;
            let previous = store.get(document_id);
            match store.upsert(row.clone()) {
                Ok(()) => applied.push((document_id, previous)),
                Err(err) => {
                    failure = Some((document_id, err));
                    break;
                }
            }
        }

        match failure {
            None => summary.written += applied.len(),
            Some((document_id, cause)) => {
                for (_, previous) in applied {
                    if let Some(row) = previous {
                        let _ = store.upsert(row);
                    }
                }
                let error = MatchError::BatchWriteFailed(format!(
                    "{stage}: write failed at document {document_id}: {cause}"
                ));
                tracing::warn!(stage, document_id = %document_id, error = %error, "batch write failed, rolled back and continuing with next batch");
                summary.failed += batch.len();
            }
        }
    }

    summary
}

/// True if `elapsed` exceeded `limit_ms`, in which case a [`MatchError::QueryTimeout`] is built
/// and logged (never returned: a single slow candidate query downgrades that document's search,
/// it does not abort the layer).
pub fn check_query_timeout(elapsed: Duration, limit_ms: u64, stage: &'static str) -> bool {
    if elapsed.as_millis() as u64 > limit_ms {
        let error = MatchError::QueryTimeout(elapsed);
        tracing::warn!(stage, error = %error, "candidate query exceeded configured timeout");
        true
    } else {
        false
    }
}

/// Runs a trigram candidate search against `corpus`, timing the call against
/// `config.query_timeout_ms`, and returns the bare candidates (the similarity score has already
/// done its job as the search floor by this point).
pub fn timed_search_trigram(
    corpus: &dyn AddressCorpus,
    query: &str,
    threshold: f64,
    limit: usize,
    timeout_ms: u64,
    stage: &'static str,
) -> Vec<Candidate> {
    let started = std::time::Instant::now();
    let ranked = corpus.search_trigram(query, threshold, limit);
    check_query_timeout(started.elapsed(), timeout_ms, stage);
    ranked.into_iter().map(|(candidate, _)| candidate).collect()
}

/// Runs a substring candidate search against `corpus`, timing the call against
/// `config.query_timeout_ms`.
pub fn timed_search_substring(
    corpus: &dyn AddressCorpus,
    needles: &[&str],
    limit: usize,
    timeout_ms: u64,
    stage: &'static str,
) -> Vec<Candidate> {
    let started = std::time::Instant::now();
    let candidates = corpus.search_substring(needles, limit);
    check_query_timeout(started.elapsed(), timeout_ms, stage);
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CanonicalAddress;

    #[test]
    fn apply_if_better_rejects_a_downgrade() {
        let mut row = FactRow::pending(Uuid::new_v4(), Uuid::new_v4(), "20003");
        row.apply_match(
            Uuid::new_v4(),
            Location::historic_sentinel(),
            MatchMethod::ExactCanonical,
            Decision::Accept,
            0.95,
        );
        let updated = apply_if_better(
            &mut row,
            Uuid::new_v4(),
            Location::historic_sentinel(),
            MatchMethod::IndividualFuzzy,
            Decision::Review,
            0.60,
        );
        assert!(!updated);
        assert_eq!(row.confidence, 0.95);
        assert_eq!(row.method, Some(MatchMethod::ExactCanonical));
    }

    #[test]
    fn apply_if_better_accepts_an_upgrade() {
        let mut row = FactRow::pending(Uuid::new_v4(), Uuid::new_v4(), "20003");
        let updated = apply_if_better(
            &mut row,
            Uuid::new_v4(),
            Location::historic_sentinel(),
            MatchMethod::IndividualFuzzy,
            Decision::Accept,
            0.80,
        );
        assert!(updated);
        assert_eq!(row.confidence, 0.80);
    }

    #[test]
    fn consensus_confidence_matches_vote_ladder() {
        assert_eq!(consensus_confidence(2), 0.85);
        assert_eq!(consensus_confidence(3), 0.90);
        assert_eq!(consensus_confidence(5), 0.95);
        assert_eq!(consensus_confidence(1), 0.0);
    }

    #[test]
    fn original_address_index_counts_shared_raw_addresses() {
        let shared = "14 High Street, Alton";
        let docs = vec![
            SourceDocument {
                id: Uuid::new_v4(),
                doc_type: "decision_notice".to_string(),
                job_id: "job-1".to_string(),
                raw_address: shared.to_string(),
                standardized_address: None,
                raw_uprn: None,
                external_reference: "20003/A1".to_string(),
                date: "2024-01-01".to_string(),
                parsed_components: None,
                gopostal_processed: false,
                planning_app_base: "20003".to_string(),
                planning_app_sequence: Some("A1".to_string()),
            },
            SourceDocument {
                id: Uuid::new_v4(),
                doc_type: "land_charge".to_string(),
                job_id: "job-1".to_string(),
                raw_address: shared.to_string(),
                standardized_address: None,
                raw_uprn: None,
                external_reference: "20003/A2".to_string(),
                date: "2024-01-02".to_string(),
                parsed_components: None,
                gopostal_processed: false,
                planning_app_base: "20003".to_string(),
                planning_app_sequence: Some("A2".to_string()),
            },
        ];
        let index = build_original_address_index(&docs);
        assert_eq!(index.len(), 1);
        let entry = index.values().next().unwrap();
        assert_eq!(entry.usage_count, 2);
        let _ = CanonicalAddress::new(None, shared, crate::components::Components::default(), Location::historic_sentinel(), "test");
    }
}
