//! L2: conservative validated search. Runs only over documents L1 left pending, trying four
//! candidate-generation strategies in order of strictness — canonical similarity, exact
//! components, postcode+house, street similarity — and stopping at the first one whose best
//! candidate the [`Validator`] accepts or flags for review. First retries the source document's
//! own UPRN (in case the gazetteer grew expanded rows since L1 ran). A winning candidate is
//! applied to every document sharing the same normalized raw address in one pass (address-level
//! dedup propagation).
use crate::config::PipelineConfig;
use crate::domain::{Decision as FactDecision, FactRow, MatchMethod, SourceDocument};
use crate::error::MatchResult;
use crate::layers::{apply_if_better, commit_batches, group_by_original_address, timed_search_substring, timed_search_trigram};
use crate::parser::Parser;
use crate::ports::{AddressCorpus, Candidate, FactStore, ProgressSink, SourcePool};
use crate::validator::{Outcome, Validator};
use rayon::prelude::*;

/// Strategy 1 (canonical similarity): top-5 ranked candidates.
const STRATEGY1_LIMIT: usize = 5;
/// Strategy 2 (exact components: house number + street substring): limit 10.
const STRATEGY2_LIMIT: usize = 10;
/// Strategy 3 (postcode + house number substring): limit 20.
const STRATEGY3_LIMIT: usize = 20;
/// Strategy 4 (street similarity, looser floor): limit 50.
const STRATEGY4_LIMIT: usize = 50;
/// Strategy 4's trigram floor, looser than the other strategies' own thresholds.
const STRATEGY4_THRESHOLD: f64 = 0.3;

/// Per-run counts from one L2 pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct L2Summary {
    /// Pending documents considered.
    pub considered: usize,
    /// Documents (including dedup siblings) upgraded to Accept or Review.
    pub upgraded: usize,
    /// Documents rejected outright for being unsuitable for matching.
    pub rejected_unsuitable: usize,
    /// Rows whose batch write failed and was rolled back.
    pub write_failures: usize,
}

/// One dedup group's result: the fact rows to commit, how many were upgraded, and how many were
/// rejected as unsuitable. Kept separate from the actual `store.upsert` call so every group's
/// writes can be committed together in batches once every group has been processed.
#[derive(Debug, Default)]
struct GroupOutcome {
    writes: Vec<FactRow>,
    touched: usize,
    rejected_unsuitable: usize,
}

/// Runs L2 against every document the current fact table still shows as `Pending`.
pub fn conservative_search(
    pool: &dyn SourcePool,
    corpus: &dyn AddressCorpus,
    store: &dyn FactStore,
    progress: &dyn ProgressSink,
    config: &PipelineConfig,
) -> MatchResult<L2Summary> {
    let pending: Vec<SourceDocument> = pool
        .all()
        .into_iter()
        .filter(|doc| {
            store
                .get(doc.id)
                .map(|row| row.decision == FactDecision::Pending)
                .unwrap_or(false)
        })
        .collect();

    progress.start_stage("l2_conservative", pending.len());
    let groups = group_by_original_address(&pending);

    let worker_pool = crate::worker_pool::build_pool(config.worker_count)?;
    let outcomes: Vec<GroupOutcome> = worker_pool.install(|| {
        groups
            .values()
            .par_bridge()
            .map(|group| process_group(group, corpus, store, config))
            .collect()
    });

    let mut writes = Vec::new();
    let mut upgraded = 0;
    let mut rejected_unsuitable = 0;
    for outcome in outcomes {
        upgraded += outcome.touched;
        rejected_unsuitable += outcome.rejected_unsuitable;
        writes.extend(outcome.writes);
    }

    let commit = commit_batches(store, writes, config.batch_size, "l2_conservative");

    progress.finish_stage("l2_conservative");

    Ok(L2Summary {
        considered: pending.len(),
        upgraded,
        rejected_unsuitable,
        write_failures: commit.failed,
    })
}

/// Processes one dedup group, returning the fact rows it wants written plus its upgrade/rejection
/// counts.
fn process_group(
    group: &[SourceDocument],
    corpus: &dyn AddressCorpus,
    store: &dyn FactStore,
    config: &PipelineConfig,
) -> GroupOutcome {
    let Some(representative) = group.first() else {
        return GroupOutcome::default();
    };
    let address_text = representative.match_address();

    if !Validator::suitable_for_matching(address_text).is_ok() {
        let writes: Vec<FactRow> = group
            .iter()
            .filter_map(|doc| {
                let mut row = store.get(doc.id)?;
                row.decision = FactDecision::Reject;
                row.has_validation_issues = true;
                Some(row)
            })
            .collect();
        return GroupOutcome {
            writes,
            touched: 0,
            rejected_unsuitable: group.len(),
        };
    }

    if let Some(uprn) = representative.raw_uprn.as_deref() {
        if let Some(candidate) = corpus.find_by_uprn(uprn) {
            return apply_to_group(
                group,
                store,
                &candidate,
                MatchMethod::SourceUprn,
                FactDecision::Accept,
                1.0,
            );
        }
    }

    let parsed = Parser::parse(address_text);

    let strategy1 = timed_search_trigram(
        corpus,
        address_text,
        config.l2_candidate_threshold,
        STRATEGY1_LIMIT,
        config.query_timeout_ms,
        "l2_conservative_canonical_similarity",
    );
    let found = best_accepted(address_text, &strategy1);

    let found = found.or_else(|| match (parsed.house_number.as_deref(), parsed.street.as_deref()) {
        (Some(house_number), Some(street)) => {
            let candidates = timed_search_substring(
                corpus,
                &[house_number, street],
                STRATEGY2_LIMIT,
                config.query_timeout_ms,
                "l2_conservative_exact_components",
            );
            best_accepted(address_text, &candidates)
        }
        _ => None,
    });

    let found = found.or_else(|| match (parsed.postcode.as_deref(), parsed.house_number.as_deref()) {
        (Some(postcode), Some(house_number)) => {
            let candidates = timed_search_substring(
                corpus,
                &[postcode, house_number],
                STRATEGY3_LIMIT,
                config.query_timeout_ms,
                "l2_conservative_postcode_house",
            );
            best_accepted(address_text, &candidates)
        }
        _ => None,
    });

    let found = found.or_else(|| {
        let candidates = timed_search_trigram(
            corpus,
            address_text,
            STRATEGY4_THRESHOLD,
            STRATEGY4_LIMIT,
            config.query_timeout_ms,
            "l2_conservative_street_similarity",
        );
        best_accepted(address_text, &candidates)
    });

    let Some((candidate, decision)) = found else {
        return GroupOutcome::default();
    };

    let fact_decision = match decision.outcome {
        Outcome::Accept => FactDecision::Accept,
        Outcome::Review => FactDecision::Review,
        Outcome::Reject => unreachable!("rejected candidates were filtered above"),
    };

    apply_to_group(group, store, &candidate, MatchMethod::ConservativeComponent, fact_decision, decision.confidence)
}

/// Among `candidates`, returns the highest-confidence one the Validator does not reject, paired
/// with its decision. Ties among the four strategies resolve to "first strategy that finds any
/// accepted candidate wins", since this is called once per strategy and only consulted via
/// `Option::or_else` when the earlier strategy found nothing.
fn best_accepted(address_text: &str, candidates: &[Candidate]) -> Option<(Candidate, crate::validator::Decision)> {
    candidates
        .iter()
        .filter_map(|candidate| {
            let decision = Validator::validate(address_text, &candidate.full_address);
            (decision.outcome != Outcome::Reject).then(|| (candidate.clone(), decision))
        })
        .max_by(|(_, a), (_, b)| a.confidence.partial_cmp(&b.confidence).unwrap_or(std::cmp::Ordering::Equal))
}

fn apply_to_group(
    group: &[SourceDocument],
    store: &dyn FactStore,
    candidate: &Candidate,
    method: MatchMethod,
    decision: FactDecision,
    confidence: f64,
) -> GroupOutcome {
    let mut touched = 0;
    let writes: Vec<FactRow> = group
        .iter()
        .filter_map(|doc| {
            let mut row = store.get(doc.id)?;
            if apply_if_better(&mut row, candidate.id, candidate.location, method, decision, confidence) {
                touched += 1;
                Some(row)
            } else {
                None
            }
        })
        .collect();
    GroupOutcome {
        writes,
        touched,
        rejected_unsuitable: 0,
    }
}
