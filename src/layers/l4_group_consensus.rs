//! L4: group consensus correction. The final layer: for each planning-application group, takes
//! a plurality vote over the group's current matched addresses and, for any sibling that
//! disagrees (or is still unmatched) at lower confidence than the vote would justify, writes a
//! correction rather than overwriting the fact row in place — the fact table stays an audit
//! trail of what each layer actually decided, and [`crate::ports::effective_fact_table`]
//! reconstructs the final view by overlaying corrections on top.
use crate::domain::{CorrectionRow, MatchMethod};
use crate::error::MatchResult;
use crate::layers::{consensus_confidence, is_deterministic_method};
use crate::ports::{CorrectionOverlay, FactStore, ProgressSink, SourcePool};
use crate::validator::Validator;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// A golden record only forms once at least this many siblings agree.
const MINIMUM_VOTES: usize = 2;
/// A group larger than this no longer reads as one planning application's sibling set.
const MAX_GROUP_SIZE: usize = 30;
/// Confidence floor a group's best match must clear before L4 considers the group at all.
const MIN_SEED_CONFIDENCE: f64 = 0.5;
/// Minimum fraction of a group's raw addresses that must pass [`Validator::suitable_for_matching`].
const MIN_REAL_ADDRESS_FRACTION: f64 = 0.60;
/// A group with more bare reference-code rows than this is mostly paperwork, not addresses.
const MAX_REFERENCE_CODE_ROWS: usize = 3;
/// A group whose members disagree on more than this many distinct raw-address spellings is too
/// noisy for a plurality vote to mean anything.
const MAX_ADDRESS_VARIATIONS: usize = 5;
/// The plurality vote must carry at least this fraction of the group's matched documents.
const MIN_CONSENSUS_FRACTION: f64 = 0.40;

/// Per-run counts from one L4 pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct L4Summary {
    /// Planning groups examined.
    pub groups_examined: usize,
    /// Groups that produced a qualifying golden record (>= 2 votes).
    pub groups_with_consensus: usize,
    /// Corrections written.
    pub corrections_written: usize,
}

/// Runs L4 over every planning-application group in `pool`, writing qualifying corrections into
/// `overlay`. Reads `store` but never writes it: a correction is recorded as a [`CorrectionRow`],
/// never as an in-place rewrite of the original [`crate::domain::FactRow`].
pub fn group_consensus_correct(
    pool: &dyn SourcePool,
    store: &dyn FactStore,
    overlay: &dyn CorrectionOverlay,
    progress: &dyn ProgressSink,
) -> MatchResult<L4Summary> {
    let bases = pool.planning_bases();
    progress.start_stage("l4_group_consensus", bases.len());

    let mut summary = L4Summary {
        groups_examined: bases.len(),
        ..Default::default()
    };

    for base in &bases {
        let group_docs = pool.documents_in_group(base);
        if group_docs.len() < MINIMUM_VOTES || group_docs.len() > MAX_GROUP_SIZE {
            continue;
        }

        let real_address_count = group_docs
            .iter()
            .filter(|doc| Validator::suitable_for_matching(doc.match_address()).is_ok())
            .count();
        let real_address_fraction = real_address_count as f64 / group_docs.len() as f64;
        if real_address_fraction < MIN_REAL_ADDRESS_FRACTION {
            continue;
        }

        let reference_code_rows = group_docs.len() - real_address_count;
        if reference_code_rows > MAX_REFERENCE_CODE_ROWS {
            continue;
        }

        let address_variations: HashSet<String> = group_docs
            .iter()
            .map(|doc| doc.match_address().trim().to_uppercase())
            .collect();
        if address_variations.len() > MAX_ADDRESS_VARIATIONS {
            continue;
        }

        let rows: HashMap<Uuid, _> = group_docs
            .iter()
            .filter_map(|doc| store.get(doc.id).map(|row| (doc.id, row)))
            .collect();

        let matched_count = rows.values().filter(|row| row.matched_address_id.is_some()).count();
        if matched_count == 0 {
            continue;
        }
        let has_seed_match = rows
            .values()
            .any(|row| row.matched_address_id.is_some() && row.confidence > MIN_SEED_CONFIDENCE);
        if !has_seed_match {
            continue;
        }

        let mut votes: HashMap<Uuid, usize> = HashMap::new();
        let mut sample_location = HashMap::new();
        for row in rows.values() {
            if let Some(address_id) = row.matched_address_id {
                if row.confidence > MIN_SEED_CONFIDENCE {
                    *votes.entry(address_id).or_insert(0) += 1;
                    sample_location.entry(address_id).or_insert(row.matched_location);
                }
            }
        }

        let Some((&golden_address_id, &vote_count)) =
            votes.iter().max_by_key(|(_, count)| **count)
        else {
            continue;
        };
        if vote_count < MINIMUM_VOTES {
            continue;
        }
        if (vote_count as f64) / (matched_count as f64) < MIN_CONSENSUS_FRACTION {
            continue;
        }
        summary.groups_with_consensus += 1;

        let confidence = consensus_confidence(vote_count);
        let Some(golden_location) = sample_location.get(&golden_address_id).copied().flatten() else {
            continue;
        };

        for doc in &group_docs {
            let Some(row) = rows.get(&doc.id) else { continue };
            if row.matched_address_id == Some(golden_address_id) {
                continue;
            }
            if let Some(method) = row.method {
                if is_deterministic_method(method) && row.confidence >= confidence {
                    continue;
                }
            }
            if row.confidence >= confidence {
                continue;
            }

            let correction = CorrectionRow {
                document_id: doc.id,
                planning_app_base: base.clone(),
                original_address_id: row.matched_address_id,
                original_confidence: row.confidence,
                corrected_address_id: golden_address_id,
                corrected_location: golden_location,
                corrected_confidence: confidence,
                corrected_method: MatchMethod::GroupConsensus,
                reason: format!("{vote_count}/{} planning-group siblings matched this address", group_docs.len()),
            };
            overlay.upsert(correction)?;
            summary.corrections_written += 1;
        }
    }

    progress.finish_stage("l4_group_consensus");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Decision, FactRow, Location, SourceDocument};
    use crate::ports::{InMemoryCorrectionOverlay, InMemoryFactStore, InMemorySourcePool, RecordingProgressSink};

    fn doc(base: &str, seq: &str) -> SourceDocument {
        SourceDocument {
            id: Uuid::new_v4(),
            doc_type: "decision_notice".to_string(),
            job_id: "job-1".to_string(),
            raw_address: format!("address for {base}/{seq}"),
            standardized_address: None,
            raw_uprn: None,
            external_reference: format!("{base}/{seq}"),
            date: "2024-01-01".to_string(),
            parsed_components: None,
            gopostal_processed: false,
            planning_app_base: base.to_string(),
            planning_app_sequence: Some(seq.to_string()),
        }
    }

    #[test]
    fn plurality_vote_corrects_the_dissenting_sibling() {
        let golden = Uuid::new_v4();
        let golden_location = Location::new(1.0, 2.0, 3.0, 4.0);
        let a = doc("20030", "A1");
        let b = doc("20030", "A2");
        let c = doc("20030", "A3");
        let pool = InMemorySourcePool::new(vec![a.clone(), b.clone(), c.clone()]);
        let store = InMemoryFactStore::default();

        let mut row_a = FactRow::pending(a.id, Uuid::new_v4(), "20030");
        row_a.apply_match(golden, golden_location, MatchMethod::IndividualFuzzy, Decision::Accept, 0.80);
        store.upsert(row_a).unwrap();

        let mut row_b = FactRow::pending(b.id, Uuid::new_v4(), "20030");
        row_b.apply_match(golden, golden_location, MatchMethod::IndividualFuzzy, Decision::Accept, 0.80);
        store.upsert(row_b).unwrap();

        let dissenting = Uuid::new_v4();
        let mut row_c = FactRow::pending(c.id, Uuid::new_v4(), "20030");
        row_c.apply_match(
            dissenting,
            Location::historic_sentinel(),
            MatchMethod::IndividualFuzzy,
            Decision::Review,
            0.55,
        );
        store.upsert(row_c).unwrap();

        let overlay = InMemoryCorrectionOverlay::default();
        let progress = RecordingProgressSink::default();

        let summary = group_consensus_correct(&pool, &store, &overlay, &progress).unwrap();

        assert_eq!(summary.groups_with_consensus, 1);
        assert_eq!(summary.corrections_written, 1);
        let correction = overlay.get(c.id).unwrap();
        assert_eq!(correction.corrected_address_id, golden);
        assert_eq!(correction.corrected_confidence, 0.85);
    }

    #[test]
    fn never_corrects_a_deterministic_uprn_match() {
        let golden = Uuid::new_v4();
        let golden_location = Location::new(1.0, 2.0, 3.0, 4.0);
        let a = doc("20031", "A1");
        let b = doc("20031", "A2");
        let c = doc("20031", "A3");
        let pool = InMemorySourcePool::new(vec![a.clone(), b.clone(), c.clone()]);
        let store = InMemoryFactStore::default();

        for document in [&a, &b] {
            let mut row = FactRow::pending(document.id, Uuid::new_v4(), "20031");
            row.apply_match(golden, golden_location, MatchMethod::IndividualFuzzy, Decision::Accept, 0.80);
            store.upsert(row).unwrap();
        }

        let mut row_c = FactRow::pending(c.id, Uuid::new_v4(), "20031");
        row_c.apply_match(
            Uuid::new_v4(),
            Location::historic_sentinel(),
            MatchMethod::ExactUprn,
            Decision::Accept,
            1.0,
        );
        store.upsert(row_c).unwrap();

        let overlay = InMemoryCorrectionOverlay::default();
        let progress = RecordingProgressSink::default();

        group_consensus_correct(&pool, &store, &overlay, &progress).unwrap();

        assert!(overlay.get(c.id).is_none());
    }
}
