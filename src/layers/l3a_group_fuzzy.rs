//! L3a: group-based fuzzy matching. Planning-application groups whose documents are, on
//! average, still low-confidence after L1/L2 get one fuzzy search run against a representative
//! member's address — the longest plausible "real address" in the group, since a longer address
//! carries more disambiguating detail than a terse sibling. A passing result is written through
//! to every document in the group, since siblings on the same planning application overwhelmingly
//! describe the same site.
use crate::config::PipelineConfig;
use crate::domain::{Decision as FactDecision, FactRow, MatchMethod, SourceDocument};
use crate::error::MatchResult;
use crate::layers::{apply_if_better, commit_batches, timed_search_trigram};
use crate::ports::{AddressCorpus, FactStore, ProgressSink, SourcePool};
use crate::similarity::edit_distance;
use crate::validator::{Outcome, Validator};
use rayon::prelude::*;

const CANDIDATE_LIMIT: usize = 5;
/// Edit-distance ceiling a candidate must clear alongside the trigram floor.
const MAX_EDIT_DISTANCE: usize = 25;

/// Per-run counts from one L3a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct L3aSummary {
    /// Planning groups examined.
    pub groups_examined: usize,
    /// Planning groups that qualified (size >= 2, average confidence below the ceiling).
    pub groups_qualified: usize,
    /// Document rows upgraded by a qualifying group's fuzzy match.
    pub documents_upgraded: usize,
    /// Rows whose batch write failed and was rolled back.
    pub write_failures: usize,
}

/// One group's result: whether it qualified for L3a consideration at all, and the fact rows it
/// wants written (empty when it qualified but no candidate was accepted).
#[derive(Debug, Default)]
struct GroupOutcome {
    qualified: bool,
    writes: Vec<FactRow>,
}

/// Runs L3a over every planning-application group in `pool`.
pub fn group_fuzzy_match(
    pool: &dyn SourcePool,
    corpus: &dyn AddressCorpus,
    store: &dyn FactStore,
    progress: &dyn ProgressSink,
    config: &PipelineConfig,
) -> MatchResult<L3aSummary> {
    let bases = pool.planning_bases();
    progress.start_stage("l3a_group_fuzzy", bases.len());

    let worker_pool = crate::worker_pool::build_pool(config.worker_count)?;
    let outcomes: Vec<GroupOutcome> = worker_pool.install(|| {
        bases
            .par_iter()
            .map(|base| process_base(base, pool, corpus, store, config))
            .collect()
    });

    let groups_qualified = outcomes.iter().filter(|o| o.qualified).count();
    let mut writes = Vec::new();
    let mut documents_upgraded = 0;
    for outcome in outcomes {
        documents_upgraded += outcome.writes.len();
        writes.extend(outcome.writes);
    }

    let commit = commit_batches(store, writes, config.batch_size, "l3a_group_fuzzy");

    progress.finish_stage("l3a_group_fuzzy");
    Ok(L3aSummary {
        groups_examined: bases.len(),
        groups_qualified,
        documents_upgraded,
        write_failures: commit.failed,
    })
}

fn process_base(
    base: &str,
    pool: &dyn SourcePool,
    corpus: &dyn AddressCorpus,
    store: &dyn FactStore,
    config: &PipelineConfig,
) -> GroupOutcome {
    let group_docs = pool.documents_in_group(base);
    if group_docs.len() < 2 {
        return GroupOutcome::default();
    }
    let rows: Vec<_> = group_docs.iter().filter_map(|d| store.get(d.id)).collect();
    if rows.is_empty() {
        return GroupOutcome::default();
    }
    let average_confidence = rows.iter().map(|r| r.confidence).sum::<f64>() / rows.len() as f64;
    if average_confidence >= config.l3a_group_confidence_ceiling {
        return GroupOutcome::default();
    }

    // The longest plausible "real address" in the group carries the most disambiguating detail,
    // so it is the representative a fuzzy search is run against.
    let representative = group_docs
        .iter()
        .filter(|doc| Validator::suitable_for_matching(doc.match_address()).is_ok())
        .max_by_key(|doc| doc.match_address().len());
    let Some(representative) = representative else {
        return GroupOutcome {
            qualified: true,
            writes: Vec::new(),
        };
    };
    let address_text = representative.match_address();

    let candidates = timed_search_trigram(
        corpus,
        address_text,
        config.l3a_candidate_threshold,
        CANDIDATE_LIMIT,
        config.query_timeout_ms,
        "l3a_group_fuzzy",
    );
    let best = candidates
        .iter()
        .filter(|candidate| edit_distance(address_text, &candidate.full_address) <= MAX_EDIT_DISTANCE)
        .filter_map(|candidate| {
            let decision = Validator::validate(address_text, &candidate.full_address);
            (decision.outcome != Outcome::Reject).then_some((candidate, decision))
        })
        .max_by(|(_, a), (_, b)| a.confidence.partial_cmp(&b.confidence).unwrap_or(std::cmp::Ordering::Equal));

    let Some((candidate, decision)) = best else {
        return GroupOutcome {
            qualified: true,
            writes: Vec::new(),
        };
    };
    let fact_decision = match decision.outcome {
        Outcome::Accept => FactDecision::Accept,
        Outcome::Review => FactDecision::Review,
        Outcome::Reject => unreachable!("rejected candidates were filtered above"),
    };

    let writes: Vec<FactRow> = group_docs
        .iter()
        .filter_map(|doc| {
            let mut row = store.get(doc.id)?;
            if apply_if_better(
                &mut row,
                candidate.id,
                candidate.location,
                MatchMethod::GroupFuzzy,
                fact_decision,
                decision.confidence,
            ) {
                Some(row)
            } else {
                None
            }
        })
        .collect();

    GroupOutcome {
        qualified: true,
        writes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Components;
    use crate::domain::{CanonicalAddress, FactRow, Location};
    use crate::ports::{InMemoryAddressCorpus, InMemoryFactStore, InMemorySourcePool, RecordingProgressSink};
    use uuid::Uuid;

    fn doc(raw: &str, base: &str, seq: &str) -> SourceDocument {
        SourceDocument {
            id: Uuid::new_v4(),
            doc_type: "decision_notice".to_string(),
            job_id: "job-1".to_string(),
            raw_address: raw.to_string(),
            standardized_address: Some(raw.to_uppercase()),
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
    fn qualifying_group_writes_through_to_every_sibling() {
        let gazetteer_row = CanonicalAddress::new(
            Some("100".to_string()),
            "14 High Street, Alton, GU34 1AB",
            Components::default(),
            Location::new(1.0, 2.0, 3.0, 4.0),
            "test",
        );
        let corpus = InMemoryAddressCorpus::new(vec![gazetteer_row], vec![]);
        let a = doc("14 High St, Alton, GU34 1AB", "20010", "A1");
        let b = doc("Land adjoining 14 High St, Alton", "20010", "A2");
        let pool = InMemorySourcePool::new(vec![a.clone(), b.clone()]);
        let store = InMemoryFactStore::default();
        store.upsert(FactRow::pending(a.id, Uuid::new_v4(), "20010")).unwrap();
        store.upsert(FactRow::pending(b.id, Uuid::new_v4(), "20010")).unwrap();
        let progress = RecordingProgressSink::default();

        let config = PipelineConfig::default();
        let summary = group_fuzzy_match(&pool, &corpus, &store, &progress, &config).unwrap();

        assert_eq!(summary.groups_qualified, 1);
        assert!(summary.documents_upgraded >= 1);
        assert_eq!(store.get(a.id).unwrap().method, Some(MatchMethod::GroupFuzzy));
    }

    #[test]
    fn representative_is_the_longest_suitable_sibling_not_the_first() {
        let gazetteer_row = CanonicalAddress::new(
            Some("101".to_string()),
            "14 High Street, Alton, GU34 1AB",
            Components::default(),
            Location::new(1.0, 2.0, 3.0, 4.0),
            "test",
        );
        let corpus = InMemoryAddressCorpus::new(vec![gazetteer_row], vec![]);
        // "a" is shorter but listed first; "b" is the longer, more detailed suitable address and
        // should be picked as the representative, even though "a" would also pass suitability.
        let a = doc("14 High St", "20012", "A1");
        let b = doc("14 High Street, Alton, GU34 1AB", "20012", "A2");
        let pool = InMemorySourcePool::new(vec![a.clone(), b.clone()]);
        let store = InMemoryFactStore::default();
        store.upsert(FactRow::pending(a.id, Uuid::new_v4(), "20012")).unwrap();
        store.upsert(FactRow::pending(b.id, Uuid::new_v4(), "20012")).unwrap();
        let progress = RecordingProgressSink::default();

        let config = PipelineConfig::default();
        let summary = group_fuzzy_match(&pool, &corpus, &store, &progress, &config).unwrap();

        assert_eq!(summary.groups_qualified, 1);
        assert_eq!(store.get(a.id).unwrap().method, Some(MatchMethod::GroupFuzzy));
        assert_eq!(store.get(b.id).unwrap().method, Some(MatchMethod::GroupFuzzy));
    }

    #[test]
    fn group_of_one_never_qualifies() {
        let corpus = InMemoryAddressCorpus::default();
        let a = doc("14 High St, Alton", "20011", "A1");
        let pool = InMemorySourcePool::new(vec![a.clone()]);
        let store = InMemoryFactStore::default();
        store.upsert(FactRow::pending(a.id, Uuid::new_v4(), "20011")).unwrap();
        let progress = RecordingProgressSink::default();

        let config = PipelineConfig::default();
        let summary = group_fuzzy_match(&pool, &corpus, &store, &progress, &config).unwrap();
        assert_eq!(summary.groups_qualified, 0);
    }
}
