//! L1: deterministic population. Truncates the fact table, then fills it in four ordered
//! phases — raw-UPRN equality, canonical equality against the base gazetteer, canonical equality
//! against the expanded-range overlay, and finally a pending row for everything still unmatched —
//! so that every source document has exactly one fact row once L1 completes.
use crate::domain::{Decision, FactRow, MatchMethod};
use crate::error::MatchResult;
use crate::layers::build_original_address_index;
use crate::ports::{AddressCorpus, FactStore, ProgressSink, SourcePool};
use rayon::prelude::*;

/// Per-phase counts from one L1 run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct L1Summary {
    /// Total documents considered.
    pub total: usize,
    /// Matched in phase 1 (raw UPRN equality).
    pub matched_uprn: usize,
    /// Matched in phase 2 (base canonical equality).
    pub matched_canonical: usize,
    /// Matched in phase 3 (expanded canonical equality).
    pub matched_expanded: usize,
    /// Left pending after phase 4's fill.
    pub unmatched: usize,
}

/// Runs L1 against `pool`/`corpus`, writing into `store`. Truncates `store` first, so this must
/// be the first layer to run in a fresh pipeline invocation.
pub fn populate_deterministic(
    pool: &dyn SourcePool,
    corpus: &dyn AddressCorpus,
    store: &dyn FactStore,
    progress: &dyn ProgressSink,
) -> MatchResult<L1Summary> {
    store.truncate()?;

    let documents = pool.all();
    let index = build_original_address_index(&documents);
    progress.start_stage("l1_deterministic", documents.len());

    let matched_uprn = documents
        .par_iter()
        .filter(|doc| {
            let Some(uprn) = doc.raw_uprn.as_deref() else {
                return false;
            };
            let Some(candidate) = corpus.find_by_uprn(uprn) else {
                return false;
            };
            let original_address_id = index
                .get(&doc.original_address_key())
                .map(|o| o.id)
                .unwrap_or(doc.id);
            let mut row = FactRow::pending(doc.id, original_address_id, doc.planning_app_base.clone());
            row.apply_match(
                candidate.id,
                candidate.location,
                MatchMethod::ExactUprn,
                Decision::Accept,
                1.0,
            );
            if let Err(err) = store.upsert(row) {
                tracing::warn!(document_id = %doc.id, error = %err, "l1 phase1 upsert failed");
            }
            true
        })
        .count();

    let matched_canonical = documents
        .par_iter()
        .filter(|doc| !store.contains(doc.id))
        .filter(|doc| {
            let canonical = doc.canonical();
            let Some(candidate) = corpus.find_by_canonical(&canonical) else {
                return false;
            };
            let original_address_id = index
                .get(&doc.original_address_key())
                .map(|o| o.id)
                .unwrap_or(doc.id);
            let mut row = FactRow::pending(doc.id, original_address_id, doc.planning_app_base.clone());
            row.apply_match(
                candidate.id,
                candidate.location,
                MatchMethod::ExactCanonical,
                Decision::Accept,
                1.0,
            );
            if let Err(err) = store.upsert(row) {
                tracing::warn!(document_id = %doc.id, error = %err, "l1 phase2 upsert failed");
            }
            true
        })
        .count();

    let matched_expanded = documents
        .par_iter()
        .filter(|doc| !store.contains(doc.id))
        .filter(|doc| {
            let canonical = doc.canonical();
            let Some(candidate) = corpus.find_expanded_by_canonical(&canonical) else {
                return false;
            };
            let original_address_id = index
                .get(&doc.original_address_key())
                .map(|o| o.id)
                .unwrap_or(doc.id);
            let mut row = FactRow::pending(doc.id, original_address_id, doc.planning_app_base.clone());
            row.apply_match(
                candidate.id,
                candidate.location,
                MatchMethod::ExpandedCanonical,
                Decision::Accept,
                1.0,
            );
            if let Err(err) = store.upsert(row) {
                tracing::warn!(document_id = %doc.id, error = %err, "l1 phase3 upsert failed");
            }
            true
        })
        .count();

    let unmatched = documents
        .iter()
        .filter(|doc| !store.contains(doc.id))
        .map(|doc| {
            let original_address_id = index
                .get(&doc.original_address_key())
                .map(|o| o.id)
                .unwrap_or(doc.id);
            let row = FactRow::pending(doc.id, original_address_id, doc.planning_app_base.clone());
            if let Err(err) = store.upsert(row) {
                tracing::warn!(document_id = %doc.id, error = %err, "l1 phase4 upsert failed");
            }
        })
        .count();

    progress.finish_stage("l1_deterministic");

    Ok(L1Summary {
        total: documents.len(),
        matched_uprn,
        matched_canonical,
        matched_expanded,
        unmatched,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Components;
    use crate::domain::{CanonicalAddress, Location, SourceDocument};
    use crate::ports::{InMemoryAddressCorpus, InMemoryFactStore, InMemorySourcePool, RecordingProgressSink};
    use uuid::Uuid;

    fn doc(raw: &str, uprn: Option<&str>, base: &str) -> SourceDocument {
        SourceDocument {
            id: Uuid::new_v4(),
            doc_type: "decision_notice".to_string(),
            job_id: "job-1".to_string(),
            raw_address: raw.to_string(),
            standardized_address: Some(raw.to_uppercase()),
            raw_uprn: uprn.map(str::to_string),
            external_reference: base.to_string(),
            date: "2024-01-01".to_string(),
            parsed_components: None,
            gopostal_processed: false,
            planning_app_base: base.to_string(),
            planning_app_sequence: None,
        }
    }

    #[test]
    fn every_document_gets_exactly_one_fact_row() {
        let gazetteer_row = CanonicalAddress::new(
            Some("100".to_string()),
            "14 HIGH STREET, ALTON",
            Components::default(),
            Location::new(1.0, 2.0, 3.0, 4.0),
            "test",
        );
        let corpus = InMemoryAddressCorpus::new(vec![gazetteer_row], vec![]);
        let documents = vec![
            doc("14 High Street, Alton", Some("100"), "20003"),
            doc("Some Unrelated Road, Nowhere", None, "20004"),
        ];
        let pool = InMemorySourcePool::new(documents.clone());
        let store = InMemoryFactStore::default();
        let progress = RecordingProgressSink::default();

        let summary = populate_deterministic(&pool, &corpus, &store, &progress).unwrap();

        assert_eq!(summary.total, 2);
        assert_eq!(summary.matched_uprn, 1);
        assert_eq!(summary.unmatched, 1);
        for document in &documents {
            assert!(store.contains(document.id));
        }
    }
}
