//! The `corpus` port defines [`AddressCorpus`], the read-only view over the gazetteer (AC) and
//! its expanded-range overlay, and [`InMemoryAddressCorpus`], a fake adapter suitable for tests
//! and the CLI's `--store memory` mode. Keeping candidate generation behind this trait is what
//! lets the matching layers be exercised without a real relational store.
use crate::domain::{CanonicalAddress, ExpandedAddress, Location};
use crate::similarity::trigram_similarity;
use crate::utils::canonicalize;
use uuid::Uuid;

/// A candidate address surfaced by a corpus search, uniform over the base gazetteer and the
/// expanded-range overlay.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Identifier of the underlying `CanonicalAddress` or `ExpandedAddress` row.
    pub id: Uuid,
    /// UPRN, when known.
    pub uprn: Option<String>,
    /// Full display form.
    pub full_address: String,
    /// Location of the candidate.
    pub location: Location,
    /// True when this candidate came from the expanded overlay rather than the base gazetteer.
    pub is_expanded: bool,
}

/// Read-only access to the address corpus: exact UPRN lookup, exact canonical-equality lookup
/// (base and expanded), substring search, and trigram-similarity search. The address corpus is
/// read-only during a pipeline run.
pub trait AddressCorpus: Send + Sync {
    /// Finds a non-historic canonical address by exact UPRN.
    fn find_by_uprn(&self, uprn: &str) -> Option<Candidate>;

    /// Finds a canonical address (base gazetteer only) by exact canonical-form equality.
    fn find_by_canonical(&self, canonical: &str) -> Option<Candidate>;

    /// Finds an expanded-overlay address by exact canonical-form equality.
    fn find_expanded_by_canonical(&self, canonical: &str) -> Option<Candidate>;

    /// Returns candidates whose uppercased full address contains every needle in `needles`,
    /// across base and expanded rows, capped at `limit`.
    fn search_substring(&self, needles: &[&str], limit: usize) -> Vec<Candidate>;

    /// Returns candidates (base + expanded) whose trigram similarity to `query` is at least
    /// `threshold`, ordered by similarity descending, then expanded-preferred, then by shorter
    /// full address, capped at `limit`.
    fn search_trigram(&self, query: &str, threshold: f64, limit: usize) -> Vec<(Candidate, f64)>;

    /// All non-historic base-gazetteer rows, for range expansion preparation and group-fuzzy
    /// search over the full corpus.
    fn all_canonical(&self) -> Vec<CanonicalAddress>;
}

/// An in-memory [`AddressCorpus`] fake, backed by plain `Vec`s, used by tests and the CLI's
/// in-memory mode.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAddressCorpus {
    canonical: Vec<CanonicalAddress>,
    expanded: Vec<ExpandedAddress>,
}

impl InMemoryAddressCorpus {
    /// Constructs a corpus from a base gazetteer and its expanded overlay.
    pub fn new(canonical: Vec<CanonicalAddress>, expanded: Vec<ExpandedAddress>) -> Self {
        Self { canonical, expanded }
    }

    /// Appends expanded-overlay rows, e.g. the output of [`crate::expansion::expand_ranges`].
    pub fn extend_expanded(&mut self, rows: Vec<ExpandedAddress>) {
        self.expanded.extend(rows);
    }

    fn candidate_from_canonical(addr: &CanonicalAddress) -> Candidate {
        Candidate {
            id: addr.id,
            uprn: addr.uprn.clone(),
            full_address: addr.full_address.clone(),
            location: addr.location,
            is_expanded: false,
        }
    }

    fn candidate_from_expanded(addr: &ExpandedAddress) -> Candidate {
        Candidate {
            id: addr.id,
            uprn: addr.uprn.clone(),
            full_address: addr.full_address.clone(),
            location: addr.location,
            is_expanded: true,
        }
    }
}

impl AddressCorpus for InMemoryAddressCorpus {
    fn find_by_uprn(&self, uprn: &str) -> Option<Candidate> {
        self.canonical
            .iter()
            .find(|a| !a.is_historic && a.uprn.as_deref() == Some(uprn))
            .map(Self::candidate_from_canonical)
    }

    fn find_by_canonical(&self, canonical: &str) -> Option<Candidate> {
        self.canonical
            .iter()
            .find(|a| a.canonical() == canonical)
            .map(Self::candidate_from_canonical)
    }

    fn find_expanded_by_canonical(&self, canonical: &str) -> Option<Candidate> {
        self.expanded
            .iter()
            .find(|a| a.canonical() == canonical)
            .map(Self::candidate_from_expanded)
    }

    fn search_substring(&self, needles: &[&str], limit: usize) -> Vec<Candidate> {
        let upper_needles: Vec<String> = needles.iter().map(|n| n.to_uppercase()).collect();
        let matches_all = |haystack: &str| {
            let upper = haystack.to_uppercase();
            upper_needles.iter().all(|n| upper.contains(n.as_str()))
        };
        let mut out: Vec<Candidate> = self
            .canonical
            .iter()
            .filter(|a| matches_all(&a.full_address))
            .map(Self::candidate_from_canonical)
            .chain(
                self.expanded
                    .iter()
                    .filter(|a| matches_all(&a.full_address))
                    .map(Self::candidate_from_expanded),
            )
            .collect();
        out.truncate(limit);
        out
    }

    fn search_trigram(&self, query: &str, threshold: f64, limit: usize) -> Vec<(Candidate, f64)> {
        let canon_query = canonicalize(query);
        let mut scored: Vec<(Candidate, f64)> = self
            .canonical
            .iter()
            .map(|a| (Self::candidate_from_canonical(a), trigram_similarity(&canon_query, &canonicalize(&a.full_address))))
            .chain(self.expanded.iter().map(|a| {
                (
                    Self::candidate_from_expanded(a),
                    trigram_similarity(&canon_query, &canonicalize(&a.full_address)),
                )
            }))
            .filter(|(_, sim)| *sim >= threshold)
            .collect();

        scored.sort_by(|(ca, sa), (cb, sb)| {
            sb.partial_cmp(sa)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| cb.is_expanded.cmp(&ca.is_expanded))
                .then_with(|| ca.full_address.len().cmp(&cb.full_address.len()))
        });
        scored.truncate(limit);
        scored
    }

    fn all_canonical(&self) -> Vec<CanonicalAddress> {
        self.canonical.clone()
    }
}
